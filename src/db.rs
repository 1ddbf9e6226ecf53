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
	datastore::Datastore,
	error::{Error, Result},
	record::{RecId, Record},
};

// Per table state: the lock arbitrates readers and writers on the table and
// guards the last assigned id, which only ever grows.
type TableHandle = Arc<RwLock<RecId>>;

struct DbInner<DS: Datastore> {
	store: DS,
	tables: HashMap<String, TableHandle>,
}

impl<DS: Datastore> DbInner<DS> {
	fn table(&self, name: &str) -> Result<TableHandle> {
		self.tables.get(name).cloned().ok_or(Error::NoTable)
	}
}

/// Typed CRUD over a [`Datastore`]. The database owns one readers/writer
/// lock per open table: any number of concurrent `find`s, one writer at a
/// time, full parallelism across different tables.
///
/// `close` tears the registry down; afterwards every operation reports
/// `NoTable`.
pub struct Database<DS: Datastore> {
	inner: RwLock<Option<DbInner<DS>>>,
}

impl<DS: Datastore> Database<DS> {
	/// Take ownership of a datastore and register every table it reports,
	/// seeding each table's id counter with the greatest id on record.
	pub fn open(store: DS) -> Result<Database<DS>> {
		let mut tables = HashMap::new();
		for name in store.table_names() {
			let last_id = store.get_last_id(&name)?;
			tables.insert(name, Arc::new(RwLock::new(last_id)));
		}
		log::debug!(target: "linedb", "Database opened with {} tables", tables.len());
		Ok(Database { inner: RwLock::new(Some(DbInner { store, tables })) })
	}

	pub fn create_table(&self, name: &str) -> Result<()> {
		let mut guard = self.inner.write();
		let inner = guard.as_mut().ok_or(Error::NoTable)?;
		if inner.tables.contains_key(name) {
			return Err(Error::TableExists);
		}
		inner.store.create_table(name)?;
		inner.tables.insert(name.to_string(), Arc::new(RwLock::new(0)));
		Ok(())
	}

	pub fn drop_table(&self, name: &str) -> Result<()> {
		let mut guard = self.inner.write();
		let inner = guard.as_mut().ok_or(Error::NoTable)?;
		if !inner.tables.contains_key(name) {
			return Err(Error::NoTable);
		}
		inner.store.remove_table(name)?;
		inner.tables.remove(name);
		Ok(())
	}

	pub fn table_exists(&self, name: &str) -> bool {
		match self.inner.read().as_ref() {
			Some(inner) => inner.tables.contains_key(name),
			None => false,
		}
	}

	pub fn table_names(&self) -> Vec<String> {
		match self.inner.read().as_ref() {
			Some(inner) => inner.tables.keys().cloned().collect(),
			None => Vec::new(),
		}
	}

	/// Assign the next id for the table, stamp it on the record, and store
	/// the record's JSON serialization. The id is only consumed if the
	/// write succeeds.
	pub fn insert<R: Record>(&self, name: &str, rec: &mut R) -> Result<RecId> {
		let guard = self.inner.read();
		let inner = guard.as_ref().ok_or(Error::NoTable)?;
		let table = inner.table(name)?;
		let mut last_id = table.write();
		let id = *last_id + 1;
		rec.set_id(id);
		let raw = serde_json::to_vec(rec)?;
		inner.store.insert_rec(name, id, &raw)?;
		*last_id = id;
		Ok(id)
	}

	/// Read, deserialize and return the record stored under `id`, running
	/// its `after_find` hook once the table lock has been released.
	pub fn find<R: Record>(&self, name: &str, id: RecId) -> Result<R> {
		let raw = {
			let guard = self.inner.read();
			let inner = guard.as_ref().ok_or(Error::NoTable)?;
			let table = inner.table(name)?;
			let _lock = table.read();
			inner.store.read_rec(name, id)?
		};
		let mut rec: R = serde_json::from_slice(&raw)?;
		rec.after_find()?;
		Ok(rec)
	}

	/// Replace the record stored under `rec.id()` with the record's current
	/// serialization.
	pub fn update<R: Record>(&self, name: &str, rec: &R) -> Result<()> {
		let raw = serde_json::to_vec(rec)?;
		let guard = self.inner.read();
		let inner = guard.as_ref().ok_or(Error::NoTable)?;
		let table = inner.table(name)?;
		let _lock = table.write();
		inner.store.update_rec(name, rec.id(), &raw)
	}

	pub fn delete(&self, name: &str, id: RecId) -> Result<()> {
		let guard = self.inner.read();
		let inner = guard.as_ref().ok_or(Error::NoTable)?;
		let table = inner.table(name)?;
		let _lock = table.write();
		inner.store.delete_rec(name, id)
	}

	/// All ids in the table, unordered. Takes the table's write lock so the
	/// listing cannot interleave with a writer on backends that scan their
	/// structures lazily.
	pub fn ids(&self, name: &str) -> Result<Vec<RecId>> {
		let guard = self.inner.read();
		let inner = guard.as_ref().ok_or(Error::NoTable)?;
		let table = inner.table(name)?;
		let _lock = table.write();
		inner.store.ids(name)
	}

	/// Drain every in-flight operation, close the datastore and drop all
	/// table state. Idempotent; once closed, every other operation returns
	/// `NoTable`.
	pub fn close(&self) -> Result<()> {
		let mut guard = self.inner.write();
		match guard.take() {
			Some(inner) => inner.store.close(),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use serde::{Deserialize, Serialize};

	use super::Database;
	use crate::{
		datastore::Datastore,
		disk::DiskStore,
		error::{Error, Result},
		memory::MemoryStore,
		record::{RecId, Record},
	};

	#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
	struct Contact {
		id: RecId,
		first_name: String,
		last_name: String,
		age: u32,
	}

	impl Contact {
		fn new(first_name: &str, last_name: &str, age: u32) -> Contact {
			Contact {
				id: 0,
				first_name: first_name.to_string(),
				last_name: last_name.to_string(),
				age,
			}
		}
	}

	impl Record for Contact {
		fn id(&self) -> RecId {
			self.id
		}
		fn set_id(&mut self, id: RecId) {
			self.id = id;
		}
	}

	fn disk_db(dir: &tempfile::TempDir) -> Database<DiskStore> {
		env_logger::try_init().ok();
		Database::open(DiskStore::open(dir.path()).unwrap()).unwrap()
	}

	fn seed_contacts<DS: Datastore>(db: &Database<DS>) {
		db.create_table("contacts").unwrap();
		assert_eq!(db.insert("contacts", &mut Contact::new("John", "Doe", 37)).unwrap(), 1);
		assert_eq!(db.insert("contacts", &mut Contact::new("Abe", "Lincoln", 52)).unwrap(), 2);
		assert_eq!(
			db.insert("contacts", &mut Contact::new("Bill", "Shakespeare", 18)).unwrap(),
			3
		);
	}

	fn table_string(dir: &tempfile::TempDir) -> String {
		std::fs::read_to_string(dir.path().join("contacts.json")).unwrap()
	}

	#[test]
	fn insert_assigns_sequential_ids() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);

		assert_eq!(
			table_string(&dir),
			concat!(
				"{\"id\":1,\"first_name\":\"John\",\"last_name\":\"Doe\",\"age\":37}\n",
				"{\"id\":2,\"first_name\":\"Abe\",\"last_name\":\"Lincoln\",\"age\":52}\n",
				"{\"id\":3,\"first_name\":\"Bill\",\"last_name\":\"Shakespeare\",\"age\":18}\n",
			)
		);
	}

	#[test]
	fn find_deserializes_record() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);

		let abe: Contact = db.find("contacts", 2).unwrap();
		assert_eq!(abe, Contact { id: 2, ..Contact::new("Abe", "Lincoln", 52) });

		assert!(matches!(db.find::<Contact>("contacts", 5), Err(Error::NoRecord)));
		assert!(matches!(db.find::<Contact>("nonexistent", 1), Err(Error::NoTable)));
	}

	#[test]
	fn delete_leaves_other_records() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);

		db.delete("contacts", 2).unwrap();

		assert!(matches!(db.find::<Contact>("contacts", 2), Err(Error::NoRecord)));
		assert!(matches!(db.delete("contacts", 2), Err(Error::NoRecord)));

		// The freed line is a dummy of the original length.
		let contents = table_string(&dir);
		let second_line = contents.lines().nth(1).unwrap();
		assert_eq!(second_line, "X".repeat(58));

		let john: Contact = db.find("contacts", 1).unwrap();
		assert_eq!(john.first_name, "John");
		let bill: Contact = db.find("contacts", 3).unwrap();
		assert_eq!(bill.first_name, "Bill");
	}

	#[test]
	fn update_same_length_stays_in_place() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);
		let before = table_string(&dir);

		let mut bill: Contact = db.find("contacts", 3).unwrap();
		bill.age = 92;
		db.update("contacts", &bill).unwrap();

		let after = table_string(&dir);
		assert_eq!(before.len(), after.len());
		assert_eq!(db.find::<Contact>("contacts", 3).unwrap().age, 92);
	}

	#[test]
	fn update_grow_relocates_record() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);
		let before_len = table_string(&dir).len();

		let mut bill: Contact = db.find("contacts", 3).unwrap();
		bill.first_name = "William".to_string();
		db.update("contacts", &bill).unwrap();

		let contents = table_string(&dir);
		// Old slot dummied out, new line appended at the former end of file.
		assert!(contents.lines().nth(2).unwrap().chars().all(|c| c == 'X'));
		assert_eq!(
			contents.lines().nth(3).unwrap(),
			"{\"id\":3,\"first_name\":\"William\",\"last_name\":\"Shakespeare\",\"age\":18}"
		);
		assert!(contents.len() > before_len);
		assert_eq!(db.find::<Contact>("contacts", 3).unwrap(), bill);
	}

	#[test]
	fn ids_lists_live_records() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);
		db.delete("contacts", 2).unwrap();

		let mut ids = db.ids("contacts").unwrap();
		ids.sort_unstable();
		assert_eq!(ids, vec![1, 3]);
		assert!(matches!(db.ids("nonexistent"), Err(Error::NoTable)));
	}

	#[test]
	fn last_id_survives_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);
		db.close().unwrap();

		let db = disk_db(&dir);
		let id = db.insert("contacts", &mut Contact::new("Helen", "Keller", 25)).unwrap();
		assert_eq!(id, 4);
	}

	#[test]
	fn create_and_drop_table() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);

		db.create_table("contacts").unwrap();
		assert!(db.table_exists("contacts"));
		assert!(matches!(db.create_table("contacts"), Err(Error::TableExists)));

		db.drop_table("contacts").unwrap();
		assert!(!db.table_exists("contacts"));
		assert!(!dir.path().join("contacts.json").exists());
		assert!(matches!(db.drop_table("contacts"), Err(Error::NoTable)));
	}

	#[test]
	fn close_blocks_everything() {
		let dir = tempfile::tempdir().unwrap();
		let db = disk_db(&dir);
		seed_contacts(&db);

		db.close().unwrap();

		assert!(matches!(db.find::<Contact>("contacts", 1), Err(Error::NoTable)));
		assert!(matches!(
			db.insert("contacts", &mut Contact::new("Jane", "Doe", 41)),
			Err(Error::NoTable)
		));
		assert!(matches!(db.ids("contacts"), Err(Error::NoTable)));
		assert!(matches!(db.create_table("other"), Err(Error::NoTable)));
		assert!(!db.table_exists("contacts"));
		assert!(db.table_names().is_empty());
		// Closing twice is fine.
		db.close().unwrap();
	}

	#[test]
	fn memory_backend_round_trip() {
		let db = Database::open(MemoryStore::new()).unwrap();
		db.create_table("contacts").unwrap();

		let mut rec = Contact::new("John", "Doe", 37);
		let id = db.insert("contacts", &mut rec).unwrap();
		assert_eq!(rec.id, id);

		let found: Contact = db.find("contacts", id).unwrap();
		assert_eq!(found, rec);

		db.delete("contacts", id).unwrap();
		assert!(matches!(db.find::<Contact>("contacts", id), Err(Error::NoRecord)));
	}

	#[test]
	fn after_find_hook_populates_derived_field() {
		#[derive(Serialize, Deserialize)]
		struct Episode {
			id: RecId,
			season: u32,
			episode: u32,
			#[serde(skip)]
			code: String,
		}

		impl Record for Episode {
			fn id(&self) -> RecId {
				self.id
			}
			fn set_id(&mut self, id: RecId) {
				self.id = id;
			}
			fn after_find(&mut self) -> Result<()> {
				self.code = format!("S{:02}E{:02}", self.season, self.episode);
				Ok(())
			}
		}

		let db = Database::open(MemoryStore::new()).unwrap();
		db.create_table("episodes").unwrap();
		db.insert("episodes", &mut Episode { id: 0, season: 6, episode: 9, code: String::new() })
			.unwrap();

		let found: Episode = db.find("episodes", 1).unwrap();
		assert_eq!(found.code, "S06E09");
	}

	#[test]
	fn concurrent_inserts_assign_distinct_ids() {
		let dir = tempfile::tempdir().unwrap();
		let db = Arc::new(disk_db(&dir));
		seed_contacts(&db);

		let mut handles = Vec::new();
		for n in 0..100u32 {
			let db = db.clone();
			handles.push(std::thread::spawn(move || {
				db.insert("contacts", &mut Contact::new("Worker", "Bee", n)).unwrap()
			}));
		}
		let mut ids: Vec<RecId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
		ids.sort_unstable();

		// 100 distinct ids covering a contiguous range above the seeded 3.
		assert_eq!(ids, (4..=103).collect::<Vec<RecId>>());
		assert_eq!(db.ids("contacts").unwrap().len(), 103);
		assert_eq!(table_string(&dir).lines().count(), 103);

		db.close().unwrap();
		let store = DiskStore::open(dir.path()).unwrap();
		assert_eq!(store.get_last_id("contacts").unwrap(), 103);
	}

	#[test]
	fn concurrent_readers_see_consistent_records() {
		let dir = tempfile::tempdir().unwrap();
		let db = Arc::new(disk_db(&dir));
		seed_contacts(&db);

		let writer = {
			let db = db.clone();
			std::thread::spawn(move || {
				for i in 0..50u32 {
					let mut bill: Contact = db.find("contacts", 3).unwrap();
					bill.first_name =
						if i % 2 == 0 { "William".to_string() } else { "Bill".to_string() };
					bill.age = 18 + i;
					db.update("contacts", &bill).unwrap();
				}
			})
		};
		let readers: Vec<_> = (0..4)
			.map(|_| {
				let db = db.clone();
				std::thread::spawn(move || {
					for _ in 0..50 {
						let bill: Contact = db.find("contacts", 3).unwrap();
						assert_eq!(bill.id, 3);
						assert_eq!(bill.last_name, "Shakespeare");
						assert!(bill.first_name == "Bill" || bill.first_name == "William");
					}
				})
			})
			.collect();

		writer.join().unwrap();
		for reader in readers {
			reader.join().unwrap();
		}
	}
}
