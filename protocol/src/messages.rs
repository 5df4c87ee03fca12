/*
 * Description: Messages exchanged with the server and the editor.
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

//! Messages exchanged with the server and the editor.
//!
//! Everything on the wire is line-delimited JSON. The host reads
//! [InboundMessage] values off its input stream, and writes [Command]
//! values toward the server and [EditorEvent] values toward whoever is
//! rendering the document.
//!
//!```
//! use cotext_protocol::messages::InboundMessage;
//!
//! let line = r#"{"correction": {"document_id": "6c02f21b-8887-44cf-b5cf-15e429e97db5", "version": 3}}"#;
//! let message: InboundMessage = serde_json::from_str(line).unwrap();
//! assert!(matches!(message, InboundMessage::correction(c) if c.version == 3));
//!```

use crate::{
  documents::{Document, DocumentId},
  transforms::Edit,
};

use serde::{Deserialize, Serialize};

/// Payload of the session-opening message: the document plus the server
/// version its content reflects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
  pub document: Document,
  pub version: u64,
}

/// A batch of versioned edits for one document, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformsBatch {
  pub document_id: DocumentId,
  pub transforms: Vec<Edit>,
}

/// Acknowledgment that the in-flight edit was linearized at `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
  pub document_id: DocumentId,
  pub version: u64,
}

/// A failure report, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
  pub message: String,
}

/// An editor-originated edit, not yet versioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEdit {
  pub document_id: DocumentId,
  pub transform: Edit,
}

/// Everything the host loop can read off its input stream: the server's
/// messages plus editor-originated local edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum InboundMessage {
  document(DocumentSnapshot),
  transforms(TransformsBatch),
  correction(Correction),
  error(ErrorReport),
  edit(LocalEdit),
}

/// A message transmitted to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
#[allow(non_camel_case_types)]
pub enum Command {
  submit {
    document_id: DocumentId,
    transform: Edit,
  },
}

/// Editor-facing notifications emitted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum EditorEvent {
  applied(TransformsBatch),
  error(ErrorReport),
}

#[cfg(test)]
mod test {
  use super::*;

  use serde_json::json;

  fn document_id() -> DocumentId {
    "ddaf835e-c2ac-4a5e-a294-7b1afa70db3d".parse().unwrap()
  }

  #[test]
  fn submit_command_wire_shape() {
    let command = Command::submit {
      document_id: document_id(),
      transform: Edit {
        position: 6,
        num_delete: 5,
        insert: "universe".to_string(),
        version: Some(2),
      },
    };
    assert_eq!(
      serde_json::to_value(&command).unwrap(),
      json!({
        "command": "submit",
        "document_id": "ddaf835e-c2ac-4a5e-a294-7b1afa70db3d",
        "transform": {
          "position": 6,
          "num_delete": 5,
          "insert": "universe",
          "version": 2,
        },
      })
    );
  }

  #[test]
  fn unversioned_edits_omit_the_version_field() {
    let edit = Edit {
      position: 0,
      num_delete: 0,
      insert: "A".to_string(),
      version: None,
    };
    assert_eq!(
      serde_json::to_value(&edit).unwrap(),
      json!({ "position": 0, "num_delete": 0, "insert": "A" })
    );
  }

  #[test]
  fn sparse_inbound_edits_fill_in_defaults() {
    let line = r#"{"edit": {"document_id": "ddaf835e-c2ac-4a5e-a294-7b1afa70db3d", "transform": {"position": 4}}}"#;
    let message: InboundMessage = serde_json::from_str(line).unwrap();
    match message {
      InboundMessage::edit(LocalEdit { transform, .. }) => {
        assert_eq!(transform.num_delete, 0);
        assert_eq!(transform.insert, "");
        assert_eq!(transform.version, None);
      },
      message => panic!("unexpected message {:?}", message),
    }
  }

  #[test]
  fn document_message_parses() {
    let line = r#"{"document": {"document": {"id": "ddaf835e-c2ac-4a5e-a294-7b1afa70db3d", "content": "hello world"}, "version": 1}}"#;
    let message: InboundMessage = serde_json::from_str(line).unwrap();
    match message {
      InboundMessage::document(snapshot) => {
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.document.content, "hello world");
      },
      message => panic!("unexpected message {:?}", message),
    }
  }
}
