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

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
	datastore::{validate_table_name, Datastore},
	error::{Error, Result},
	record::RecId,
};

type Table = Arc<RwLock<HashMap<RecId, Vec<u8>>>>;

/// Map-per-table datastore with the same contract as
/// [`DiskStore`](crate::DiskStore), minus the files. Nothing survives the
/// store being dropped; useful for tests and ephemeral databases.
#[derive(Default)]
pub struct MemoryStore {
	tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
	pub fn new() -> MemoryStore {
		Default::default()
	}

	/// Build a store pre-populated with the given tables and records.
	pub fn with_tables(seed: HashMap<String, HashMap<RecId, Vec<u8>>>) -> Result<MemoryStore> {
		let mut tables = HashMap::new();
		for (name, records) in seed {
			validate_table_name(&name)?;
			tables.insert(name, Arc::new(RwLock::new(records)));
		}
		Ok(MemoryStore { tables: RwLock::new(tables) })
	}

	fn table(&self, name: &str) -> Result<Table> {
		self.tables.read().get(name).cloned().ok_or(Error::NoTable)
	}
}

impl Datastore for MemoryStore {
	fn create_table(&self, name: &str) -> Result<()> {
		validate_table_name(name)?;
		let mut tables = self.tables.write();
		if tables.contains_key(name) {
			return Err(Error::TableExists);
		}
		tables.insert(name.to_string(), Default::default());
		log::debug!(target: "linedb", "Created in-memory table {}", name);
		Ok(())
	}

	fn remove_table(&self, name: &str) -> Result<()> {
		if self.tables.write().remove(name).is_none() {
			return Err(Error::NoTable);
		}
		Ok(())
	}

	fn table_exists(&self, name: &str) -> bool {
		self.tables.read().contains_key(name)
	}

	fn table_names(&self) -> Vec<String> {
		self.tables.read().keys().cloned().collect()
	}

	fn get_last_id(&self, name: &str) -> Result<RecId> {
		Ok(self.table(name)?.read().keys().copied().max().unwrap_or(0))
	}

	fn ids(&self, name: &str) -> Result<Vec<RecId>> {
		Ok(self.table(name)?.read().keys().copied().collect())
	}

	fn read_rec(&self, name: &str, id: RecId) -> Result<Vec<u8>> {
		self.table(name)?.read().get(&id).cloned().ok_or(Error::NoRecord)
	}

	fn insert_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()> {
		let table = self.table(name)?;
		let mut records = table.write();
		if records.contains_key(&id) {
			return Err(Error::IdExists);
		}
		records.insert(id, payload.to_vec());
		Ok(())
	}

	fn update_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()> {
		let table = self.table(name)?;
		let mut records = table.write();
		if !records.contains_key(&id) {
			return Err(Error::NoRecord);
		}
		records.insert(id, payload.to_vec());
		Ok(())
	}

	fn delete_rec(&self, name: &str, id: RecId) -> Result<()> {
		let table = self.table(name)?;
		if table.write().remove(&id).is_none() {
			return Err(Error::NoRecord);
		}
		Ok(())
	}

	fn close(self) -> Result<()> {
		self.tables.write().clear();
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn crud_round_trip() {
		let store = MemoryStore::new();
		store.create_table("planes").unwrap();

		store.insert_rec("planes", 1, b"{\"id\":1,\"name\":\"Spitfire\"}").unwrap();
		assert!(matches!(store.insert_rec("planes", 1, b"{}"), Err(Error::IdExists)));
		assert_eq!(store.read_rec("planes", 1).unwrap(), b"{\"id\":1,\"name\":\"Spitfire\"}".to_vec());

		store.update_rec("planes", 1, b"{\"id\":1,\"name\":\"Hurricane\"}").unwrap();
		assert_eq!(store.read_rec("planes", 1).unwrap(), b"{\"id\":1,\"name\":\"Hurricane\"}".to_vec());

		store.delete_rec("planes", 1).unwrap();
		assert!(matches!(store.read_rec("planes", 1), Err(Error::NoRecord)));
		assert!(matches!(store.update_rec("planes", 1, b"{}"), Err(Error::NoRecord)));
		assert!(matches!(store.delete_rec("planes", 1), Err(Error::NoRecord)));
	}

	#[test]
	fn table_registry() {
		let store = MemoryStore::new();
		store.create_table("planes").unwrap();

		assert!(store.table_exists("planes"));
		assert!(matches!(store.create_table("planes"), Err(Error::TableExists)));
		assert!(matches!(store.create_table("no spaces"), Err(Error::InvalidTableName(_))));
		assert_eq!(store.table_names(), vec!["planes".to_string()]);

		store.remove_table("planes").unwrap();
		assert!(!store.table_exists("planes"));
		assert!(matches!(store.remove_table("planes"), Err(Error::NoTable)));
	}

	#[test]
	fn seeded_store() {
		let mut planes = HashMap::new();
		planes.insert(7u64, b"{\"id\":7}".to_vec());
		planes.insert(3u64, b"{\"id\":3}".to_vec());
		let mut seed = HashMap::new();
		seed.insert("planes".to_string(), planes);

		let store = MemoryStore::with_tables(seed).unwrap();
		assert_eq!(store.get_last_id("planes").unwrap(), 7);
		let mut ids = store.ids("planes").unwrap();
		ids.sort_unstable();
		assert_eq!(ids, vec![3, 7]);
	}

	#[test]
	fn last_id_of_empty_table_is_zero() {
		let store = MemoryStore::new();
		store.create_table("planes").unwrap();
		assert_eq!(store.get_last_id("planes").unwrap(), 0);
		assert!(matches!(store.get_last_id("ghosts"), Err(Error::NoTable)));
	}
}
