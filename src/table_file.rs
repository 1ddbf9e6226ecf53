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

// On disk data layout for table files.
//
// A table file is a sequence of variable length lines, each terminated by
// `\n` (0x0a). Every byte of the file belongs to exactly one line. A line
// is one of:
//
// Live record:
// [JSON object][`\n`]
// The object's "id" field holds the record id. The first byte of a live
// line is never `\n` or `X`.
//
// Full dummy:
// [`X` * (len - 1)][`\n`]
// Left behind by a delete or by the relocation half of a growing update.
// Free for reuse by any record whose line fits.
//
// Empty dummy:
// [`\n`]
// A single-byte line, produced when an update shrinks a record by exactly
// one byte or when a reused slot leaves a one byte tail.
//
// Writes never split a line: a record placed over a longer dummy leaves
// the dummy's tail bytes in place, and because dummies are filled with
// `X` the tail is itself a well formed dummy line.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use parking_lot::RwLock;

use crate::{
	error::{Error, Result},
	record::RecId,
};

const DUMMY_BYTE: u8 = b'X';

/// One open table file plus its in-memory id -> offset index. The index is
/// rebuilt by scanning the file at open and maintained incrementally after
/// that; it is mutated only by the write operations, which the caller is
/// expected to serialize.
pub struct TableFile {
	name: String,
	file: File,
	index: RwLock<HashMap<RecId, u64>>,
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
	use std::os::unix::fs::FileExt;
	file.read_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
	use std::os::unix::fs::FileExt;
	file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
	use std::os::windows::fs::FileExt;
	file.seek_read(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
	use std::os::windows::fs::FileExt;
	while !buf.is_empty() {
		let n = file.seek_write(buf, offset)?;
		if n == 0 {
			return Err(std::io::Error::new(
				std::io::ErrorKind::WriteZero,
				"failed to write whole line",
			));
		}
		buf = &buf[n..];
		offset += n as u64;
	}
	Ok(())
}

fn parse_rec_id(name: &str, offset: u64, payload: &[u8]) -> Result<RecId> {
	let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
		Error::Corruption(format!("{}: invalid record line at offset {}: {}", name, offset, e))
	})?;
	match value.get("id").and_then(serde_json::Value::as_u64) {
		Some(id) if id > 0 => Ok(id),
		_ => Err(Error::Corruption(format!(
			"{}: record line at offset {} has no positive \"id\" field",
			name, offset
		))),
	}
}

impl TableFile {
	/// Scan `file` line by line and build the id -> offset index. Dummy
	/// lines are skipped; live lines must parse as JSON objects with a
	/// positive, unique id. A trailing fragment with no terminator is
	/// ignored, matching the offline compactor's repair scope.
	pub fn open(name: &str, file: File) -> Result<TableFile> {
		let mut index = HashMap::new();
		let mut reader = BufReader::new(&file);
		reader.seek(SeekFrom::Start(0))?;
		let mut offset = 0u64;
		let mut line = Vec::new();
		loop {
			line.clear();
			let len = reader.read_until(b'\n', &mut line)?;
			if len == 0 || line[len - 1] != b'\n' {
				break;
			}
			if line[0] != b'\n' && line[0] != DUMMY_BYTE {
				let id = parse_rec_id(name, offset, &line[..len - 1])?;
				if index.insert(id, offset).is_some() {
					return Err(Error::Corruption(format!(
						"{}: duplicate record id {} at offset {}",
						name, id, offset
					)));
				}
			}
			offset += len as u64;
		}
		log::debug!(target: "linedb", "Opened table {} with {} records", name, index.len());
		Ok(TableFile { name: name.to_string(), file, index: RwLock::new(index) })
	}

	pub fn last_id(&self) -> RecId {
		self.index.read().keys().copied().max().unwrap_or(0)
	}

	pub fn ids(&self) -> Vec<RecId> {
		self.index.read().keys().copied().collect()
	}

	/// Record payload without its line terminator.
	pub fn read_rec(&self, id: RecId) -> Result<Vec<u8>> {
		let offset = self.offset_of(id)?;
		let mut line = self.read_line_at(offset)?;
		line.pop();
		Ok(line)
	}

	pub fn insert_rec(&self, id: RecId, payload: &[u8]) -> Result<()> {
		debug_assert!(!payload.contains(&b'\n'));
		if self.index.read().contains_key(&id) {
			return Err(Error::IdExists);
		}
		let offset = self.offset_for_writing(payload.len())?;
		self.write_line(offset, payload)?;
		self.index.write().insert(id, offset);
		Ok(())
	}

	pub fn update_rec(&self, id: RecId, payload: &[u8]) -> Result<()> {
		debug_assert!(!payload.contains(&b'\n'));
		let old_offset = self.offset_of(id)?;
		let old_len = self.read_line_at(old_offset)?.len();
		let new_len = payload.len() + 1;
		if new_len < old_len {
			// Shrink: rewrite in place and pad the freed space out to a
			// dummy line, keeping the original terminator.
			let mut buf = Vec::with_capacity(old_len - 1);
			buf.extend_from_slice(payload);
			buf.push(b'\n');
			buf.resize(old_len - 1, DUMMY_BYTE);
			write_all_at(&self.file, &buf, old_offset)?;
		} else if new_len == old_len {
			self.write_line(old_offset, payload)?;
		} else {
			// Grow: relocate, point the index at the new line, then dummy
			// out the old one. The index must move first so a reopened
			// index never resolves the id to a dummy.
			let new_offset = self.offset_for_writing(payload.len())?;
			self.write_line(new_offset, payload)?;
			self.index.write().insert(id, new_offset);
			self.write_dummy(old_offset, old_len)?;
		}
		Ok(())
	}

	pub fn delete_rec(&self, id: RecId) -> Result<()> {
		let offset = self.offset_of(id)?;
		let len = self.read_line_at(offset)?.len();
		self.write_dummy(offset, len)?;
		self.index.write().remove(&id);
		log::trace!(target: "linedb", "{}: freed slot at offset {} ({} bytes)", self.name, offset, len);
		Ok(())
	}

	fn offset_of(&self, id: RecId) -> Result<u64> {
		self.index.read().get(&id).copied().ok_or(Error::NoRecord)
	}

	/// First-fit placement: the offset of the first dummy line whose length
	/// can hold `payload_len` bytes plus a terminator, else the end of file
	/// offset.
	fn offset_for_writing(&self, payload_len: usize) -> Result<u64> {
		match self.offset_to_fit(payload_len)? {
			Some(offset) => {
				log::trace!(
					target: "linedb",
					"{}: reusing dummy slot at offset {}",
					self.name,
					offset,
				);
				Ok(offset)
			}
			None => {
				let offset = self.file.metadata()?.len();
				log::trace!(target: "linedb", "{}: appending at offset {}", self.name, offset);
				Ok(offset)
			}
		}
	}

	fn offset_to_fit(&self, payload_len: usize) -> Result<Option<u64>> {
		let mut reader = BufReader::new(&self.file);
		reader.seek(SeekFrom::Start(0))?;
		let mut offset = 0u64;
		let mut line = Vec::new();
		loop {
			line.clear();
			let len = reader.read_until(b'\n', &mut line)?;
			if len == 0 || line[len - 1] != b'\n' {
				return Ok(None);
			}
			// A dummy of `len` bytes holds payloads up to `len - 1`, the
			// terminator stays.
			if (line[0] == b'\n' || line[0] == DUMMY_BYTE) && len - 1 >= payload_len {
				return Ok(Some(offset));
			}
			offset += len as u64;
		}
	}

	fn read_line_at(&self, offset: u64) -> Result<Vec<u8>> {
		let mut line = Vec::new();
		let mut chunk = [0u8; 256];
		let mut pos = offset;
		loop {
			let n = read_at(&self.file, &mut chunk, pos)?;
			if n == 0 {
				return Err(Error::Corruption(format!(
					"{}: unterminated line at offset {}",
					self.name, offset
				)));
			}
			if let Some(i) = chunk[..n].iter().position(|&b| b == b'\n') {
				line.extend_from_slice(&chunk[..=i]);
				return Ok(line);
			}
			line.extend_from_slice(&chunk[..n]);
			pos += n as u64;
		}
	}

	fn write_line(&self, offset: u64, payload: &[u8]) -> Result<()> {
		let mut buf = Vec::with_capacity(payload.len() + 1);
		buf.extend_from_slice(payload);
		buf.push(b'\n');
		write_all_at(&self.file, &buf, offset)?;
		Ok(())
	}

	// Overwrites a line of `line_len` bytes with `X`s, preserving its
	// terminator.
	fn write_dummy(&self, offset: u64, line_len: usize) -> Result<()> {
		let dummy = vec![DUMMY_BYTE; line_len - 1];
		write_all_at(&self.file, &dummy, offset)?;
		Ok(())
	}
}
