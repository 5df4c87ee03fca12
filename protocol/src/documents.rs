/*
 * Description: Document identity and metadata.
 *
 * Copyright (C) 2022 Danny McClanahan <dmcC2@hypnicjerk.ai>
 * SPDX-License-Identifier: AGPL-3.0-or-later
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Document identity and metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::str::FromStr;

/// A serializable identifier for a document sharable across time and space.
///
/// On the wire this is the bare hyphenated uuid string.
///
///```
/// use cotext_protocol::documents::DocumentId;
///
/// let id: DocumentId = "6c02f21b-8887-44cf-b5cf-15e429e97db5".parse().unwrap();
/// assert_eq!(
///   serde_json::to_string(&id).unwrap(),
///   "\"6c02f21b-8887-44cf-b5cf-15e429e97db5\"",
/// );
///```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId {
  pub uuid: Uuid,
}

impl Default for DocumentId {
  fn default() -> Self {
    Self {
      uuid: Uuid::new_v4(),
    }
  }
}

impl std::fmt::Display for DocumentId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.uuid.hyphenated())
  }
}

impl FromStr for DocumentId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self {
      uuid: Uuid::parse_str(s)?,
    })
  }
}

/// Document metadata plus its content as this client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id: DocumentId,
  pub content: String,
}
