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

//! Embeddable document database storing each table as a newline-delimited
//! JSON file. Records are kept one per line; deleted and relocated lines
//! are padded out with `X` bytes and reused by later writes, so the file
//! stays parseable by any line-oriented tool while space is recycled in
//! place.
//!
//! ```no_run
//! use linedb::{Database, DiskStore, RecId, Record, Result};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Contact {
//! 	id: RecId,
//! 	name: String,
//! }
//!
//! impl Record for Contact {
//! 	fn id(&self) -> RecId {
//! 		self.id
//! 	}
//! 	fn set_id(&mut self, id: RecId) {
//! 		self.id = id;
//! 	}
//! }
//!
//! fn main() -> Result<()> {
//! 	let db = Database::open(DiskStore::open("./data".as_ref())?)?;
//! 	db.create_table("contacts")?;
//! 	let mut rec = Contact { id: 0, name: "Ada".into() };
//! 	let id = db.insert("contacts", &mut rec)?;
//! 	let found: Contact = db.find("contacts", id)?;
//! 	assert_eq!(found.name, "Ada");
//! 	db.close()
//! }
//! ```

mod datastore;
mod db;
mod disk;
mod error;
mod memory;
mod record;
mod table_file;

pub use datastore::Datastore;
pub use db::Database;
pub use disk::{DiskStore, DEFAULT_EXT};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use record::{RecId, Record};
