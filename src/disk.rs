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
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::RwLock;

use crate::{
	datastore::{validate_table_name, Datastore},
	error::{Error, Result},
	record::RecId,
	table_file::TableFile,
};

pub const DEFAULT_EXT: &str = ".json";
const LOCK_FILE_NAME: &str = "lock";

/// File-per-table datastore. Each table lives at `<dir>/<name><ext>` as a
/// newline-delimited JSON file; the whole directory is exclusively locked
/// for the lifetime of the store, so a second process (or the offline
/// compactor) cannot touch the files while they are open.
pub struct DiskStore {
	path: PathBuf,
	ext: String,
	lock_file: File,
	tables: RwLock<HashMap<String, Arc<TableFile>>>,
}

#[cfg(unix)]
fn open_table_file(path: &Path, create: bool) -> Result<File> {
	use std::os::unix::fs::OpenOptionsExt;
	let file = OpenOptions::new()
		.create(create)
		.read(true)
		.write(true)
		.mode(0o660)
		.open(path)?;
	Ok(file)
}

#[cfg(not(unix))]
fn open_table_file(path: &Path, create: bool) -> Result<File> {
	let file = OpenOptions::new().create(create).read(true).write(true).open(path)?;
	Ok(file)
}

impl DiskStore {
	/// Open a database directory with the default `.json` table extension,
	/// creating the directory if it does not exist. Every table file found
	/// in the directory is scanned and indexed.
	pub fn open(path: &Path) -> Result<DiskStore> {
		Self::open_with_ext(path, DEFAULT_EXT)
	}

	pub fn open_with_ext(path: &Path, ext: &str) -> Result<DiskStore> {
		fs::create_dir_all(path)?;
		let lock_file = OpenOptions::new()
			.create(true)
			.read(true)
			.write(true)
			.open(path.join(LOCK_FILE_NAME))?;
		lock_file.try_lock_exclusive().map_err(|_| Error::Locked)?;

		let mut tables = HashMap::new();
		for entry in fs::read_dir(path)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let file_name = entry.file_name();
			let file_name = match file_name.to_str() {
				Some(file_name) => file_name,
				None => continue,
			};
			let name = match file_name.strip_suffix(ext) {
				Some(name) if !name.is_empty() => name,
				_ => continue,
			};
			let file = open_table_file(&entry.path(), false)?;
			let table = TableFile::open(name, file)?;
			tables.insert(name.to_string(), Arc::new(table));
		}
		log::debug!(
			target: "linedb",
			"Opened database at {} with {} tables",
			path.display(),
			tables.len(),
		);
		Ok(DiskStore {
			path: path.into(),
			ext: ext.to_string(),
			lock_file,
			tables: RwLock::new(tables),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn table(&self, name: &str) -> Result<Arc<TableFile>> {
		self.tables.read().get(name).cloned().ok_or(Error::NoTable)
	}

	fn table_path(&self, name: &str) -> PathBuf {
		self.path.join(format!("{}{}", name, self.ext))
	}
}

impl Datastore for DiskStore {
	fn create_table(&self, name: &str) -> Result<()> {
		validate_table_name(name)?;
		let mut tables = self.tables.write();
		if tables.contains_key(name) {
			return Err(Error::TableExists);
		}
		let file = open_table_file(&self.table_path(name), true)?;
		let table = TableFile::open(name, file)?;
		tables.insert(name.to_string(), Arc::new(table));
		log::debug!(target: "linedb", "Created table {}", name);
		Ok(())
	}

	fn remove_table(&self, name: &str) -> Result<()> {
		let mut tables = self.tables.write();
		if tables.remove(name).is_none() {
			return Err(Error::NoTable);
		}
		fs::remove_file(self.table_path(name))?;
		log::debug!(target: "linedb", "Removed table {}", name);
		Ok(())
	}

	fn table_exists(&self, name: &str) -> bool {
		self.tables.read().contains_key(name)
	}

	fn table_names(&self) -> Vec<String> {
		self.tables.read().keys().cloned().collect()
	}

	fn get_last_id(&self, name: &str) -> Result<RecId> {
		Ok(self.table(name)?.last_id())
	}

	fn ids(&self, name: &str) -> Result<Vec<RecId>> {
		Ok(self.table(name)?.ids())
	}

	fn read_rec(&self, name: &str, id: RecId) -> Result<Vec<u8>> {
		self.table(name)?.read_rec(id)
	}

	fn insert_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()> {
		self.table(name)?.insert_rec(id, payload)
	}

	fn update_rec(&self, name: &str, id: RecId, payload: &[u8]) -> Result<()> {
		self.table(name)?.update_rec(id, payload)
	}

	fn delete_rec(&self, name: &str, id: RecId) -> Result<()> {
		self.table(name)?.delete_rec(id)
	}

	fn close(self) -> Result<()> {
		self.tables.write().clear();
		self.lock_file.unlock()?;
		Ok(())
	}
}
