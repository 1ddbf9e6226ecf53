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

// Offline maintenance for linedb database directories. Both commands take
// the same directory lock as a running database, so they can never touch a
// table file that is open elsewhere.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use structopt::StructOpt;

use linedb::{Error, Result};

const LOCK_FILE_NAME: &str = "lock";

#[derive(Debug, StructOpt)]
#[structopt(name = "linedb-admin", about = "Offline maintenance for linedb databases")]
enum Cli {
	/// Rewrite table files keeping only live records, dropping dummy lines
	/// and `X` padding. Ids are not renumbered.
	Compact(Target),
	/// Verify the line grammar of table files: terminated lines, valid JSON
	/// records, positive unique ids.
	Check(Target),
}

#[derive(Debug, StructOpt)]
struct Target {
	/// Database directory.
	#[structopt(parse(from_os_str))]
	dir: PathBuf,
	/// Table file extension.
	#[structopt(long, default_value = ".json")]
	ext: String,
	/// Tables to process; all tables in the directory when empty.
	tables: Vec<String>,
}

fn main() {
	env_logger::init();
	let cli = Cli::from_args();
	let result = match cli {
		Cli::Compact(target) => run(&target, compact_file),
		Cli::Check(target) => run(&target, check_file),
	};
	if let Err(e) = result {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
}

fn run(target: &Target, op: fn(&Path) -> Result<()>) -> Result<()> {
	let _lock = lock_dir(&target.dir)?;
	for path in table_paths(target)? {
		op(&path)?;
	}
	Ok(())
}

// Held for the duration of the command; unlocked when dropped.
fn lock_dir(dir: &Path) -> Result<File> {
	let lock_file = OpenOptions::new()
		.create(true)
		.read(true)
		.write(true)
		.open(dir.join(LOCK_FILE_NAME))?;
	lock_file.try_lock_exclusive().map_err(|_| Error::Locked)?;
	log::debug!(target: "linedb", "Locked database directory {}", dir.display());
	Ok(lock_file)
}

fn table_paths(target: &Target) -> Result<Vec<PathBuf>> {
	if !target.tables.is_empty() {
		let mut paths = Vec::new();
		for name in &target.tables {
			let path = target.dir.join(format!("{}{}", name, target.ext));
			if !path.is_file() {
				return Err(Error::NoTable);
			}
			paths.push(path);
		}
		return Ok(paths);
	}

	let mut paths = Vec::new();
	for entry in fs::read_dir(&target.dir)? {
		let entry = entry?;
		if !entry.file_type()?.is_file() {
			continue;
		}
		match entry.file_name().to_str() {
			Some(name) if name.ends_with(&target.ext) && name.len() > target.ext.len() => {
				paths.push(entry.path())
			}
			_ => continue,
		}
	}
	paths.sort();
	Ok(paths)
}

/// Copy live lines into `<table>.tmp`, right-trimmed of `X` runs, then
/// atomically rename the result over the original file. Dummy lines trim
/// to nothing and vanish.
fn compact_file(path: &Path) -> Result<()> {
	let source = File::open(path)?;
	let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	tmp_name.push(".tmp");
	let tmp_path = path.with_file_name(tmp_name);
	let mut tmp = File::create(&tmp_path)?;

	let mut reader = BufReader::new(&source);
	let mut line = Vec::new();
	let (mut live, mut dropped) = (0u64, 0u64);
	loop {
		line.clear();
		let len = reader.read_until(b'\n', &mut line)?;
		if len == 0 {
			break;
		}
		let mut payload = &line[..];
		if payload.last() == Some(&b'\n') {
			payload = &payload[..payload.len() - 1];
		}
		while payload.last() == Some(&b'X') {
			payload = &payload[..payload.len() - 1];
		}
		if payload.is_empty() {
			dropped += 1;
			continue;
		}
		tmp.write_all(payload)?;
		tmp.write_all(b"\n")?;
		live += 1;
	}

	tmp.sync_all()?;
	log::debug!(
		target: "linedb",
		"Compacted {} into {}",
		path.display(),
		tmp_path.display(),
	);
	fs::rename(&tmp_path, path)?;
	println!("{}: kept {} records, dropped {} dummy lines", path.display(), live, dropped);
	Ok(())
}

fn check_file(path: &Path) -> Result<()> {
	let file = File::open(path)?;
	let mut reader = BufReader::new(&file);
	let mut line = Vec::new();
	let mut ids = HashSet::new();
	let (mut offset, mut dummies) = (0u64, 0u64);
	loop {
		line.clear();
		let len = reader.read_until(b'\n', &mut line)?;
		if len == 0 {
			break;
		}
		if line[len - 1] != b'\n' {
			return Err(Error::Corruption(format!(
				"{}: unterminated line at offset {}",
				path.display(),
				offset
			)));
		}
		if line[0] == b'\n' || line[0] == b'X' {
			dummies += 1;
		} else {
			let value: serde_json::Value =
				serde_json::from_slice(&line[..len - 1]).map_err(|e| {
					Error::Corruption(format!(
						"{}: invalid record line at offset {}: {}",
						path.display(),
						offset,
						e
					))
				})?;
			let id = match value.get("id").and_then(serde_json::Value::as_u64) {
				Some(id) if id > 0 => id,
				_ => {
					return Err(Error::Corruption(format!(
						"{}: record line at offset {} has no positive \"id\" field",
						path.display(),
						offset
					)))
				}
			};
			if !ids.insert(id) {
				return Err(Error::Corruption(format!(
					"{}: duplicate record id {} at offset {}",
					path.display(),
					id,
					offset
				)));
			}
		}
		offset += len as u64;
	}
	println!(
		"{}: ok, {} records, {} dummy lines, {} bytes",
		path.display(),
		ids.len(),
		dummies,
		offset
	);
	Ok(())
}
