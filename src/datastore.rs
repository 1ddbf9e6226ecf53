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

use crate::{
	error::{Error, Result},
	record::RecId,
};

// Table names are ASCII identifiers, `[A-Za-z_][A-Za-z0-9_]*`; they end up
// joined into filesystem paths.
pub(crate) fn validate_table_name(name: &str) -> Result<()> {
	let mut chars = name.chars();
	let valid = match chars.next() {
		Some(first) => {
			(first.is_ascii_alphabetic() || first == '_')
				&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
		}
		None => false,
	};
	if valid {
		Ok(())
	} else {
		Err(Error::InvalidTableName(name.to_string()))
	}
}

/// Uniform contract over the physical storage of raw record bytes, keyed by
/// (table, id). Implemented by [`DiskStore`](crate::DiskStore) and
/// [`MemoryStore`](crate::MemoryStore).
///
/// A datastore does no concurrency control of its own: it may assume the
/// caller has serialized write operations on each table. The
/// [`Database`](crate::Database) layer provides that arbitration.
///
/// Record payloads are opaque byte strings that must not contain `\n`.
/// `read_rec` returns the payload without a line terminator on every
/// implementation.
pub trait Datastore: Send + Sync {
	/// Create an empty table. Fails with `TableExists` if the name is taken.
	fn create_table(&self, name: &str) -> Result<()>;

	/// Delete a table and its backing storage. Fails with `NoTable` if absent.
	fn remove_table(&self, name: &str) -> Result<()>;

	fn table_exists(&self, name: &str) -> bool;

	fn table_names(&self) -> Vec<String>;

	/// Greatest id currently present in the table, or 0 if it is empty.
	fn get_last_id(&self, name: &str) -> Result<RecId>;

	/// All ids present in the table, in no particular order.
	fn ids(&self, name: &str) -> Result<Vec<RecId>>;

	/// Read the payload stored under `id`. Fails with `NoRecord` if absent.
	fn read_rec(&self, name: &str, id: RecId) -> Result<Vec<u8>>;

	/// Store `payload` under a caller-supplied id. Fails with `IdExists` if
	/// the id is already present.
	fn insert_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()>;

	/// Replace the payload stored under `id`. Fails with `NoRecord` if absent.
	fn update_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()>;

	/// Remove the payload stored under `id`. Fails with `NoRecord` if absent.
	fn delete_rec(&self, name: &str, id: RecId) -> Result<()>;

	/// Release all resources held by the store, surfacing any I/O failure.
	fn close(self) -> Result<()>;
}
