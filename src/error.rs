// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

use thiserror::Error;

/// Errors returned by every fallible operation in the crate. The first four
/// variants have the same meaning on every backend; the rest carry failures
/// from the environment.
#[derive(Debug, Error)]
pub enum Error {
	#[error("table with that name does not exist")]
	NoTable,
	#[error("table with that name already exists")]
	TableExists,
	#[error("no record with that id found")]
	NoRecord,
	#[error("record with that id already exists")]
	IdExists,
	#[error("invalid table name: {0}")]
	InvalidTableName(String),
	#[error("database directory is locked by another process")]
	Locked,
	#[error("table file is corrupted: {0}")]
	Corruption(String),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
