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

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Record id. Ids are positive, assigned per table in increasing order and
/// never reused within the lifetime of a table file.
pub type RecId = u64;

/// Contract between user types and the database. Implementors must serialize
/// to a JSON object whose `"id"` field holds the value reported by `id()`;
/// deriving `Serialize`/`Deserialize` on a struct with an `id: RecId` field
/// is the expected shape.
///
/// [`Database::insert`](crate::Database::insert) calls `set_id` with the
/// assigned id before serializing, so the stored `"id"` field always equals
/// the key the record is filed under.
pub trait Record: Serialize + DeserializeOwned {
	fn id(&self) -> RecId;
	fn set_id(&mut self, id: RecId);

	/// Post-load fixup hook, run once after a successful
	/// [`Database::find`](crate::Database::find) deserializes the record.
	/// Called with no table lock held. Calling back into the database from
	/// here blocks if a `close` or table create/drop is pending.
	fn after_find(&mut self) -> Result<()> {
		Ok(())
	}
}
