/*
 * Description: Host-side document sessions around the coordination core.
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

//! Host-side document sessions around the coordination core.
//!
//! A [Session] pairs one document's content with the
//! [Model](cotext_protocol::model::Model) coordinating it; a [SessionSet]
//! routes decoded wire messages to the right session and turns the model's
//! action records into the lines to write back out.

use cotext_protocol::{
  documents::{Document, DocumentId},
  messages::{
    Command, Correction, DocumentSnapshot, EditorEvent, ErrorReport, InboundMessage, LocalEdit,
    TransformsBatch,
  },
  model::{Action, Model, ModelError},
  transforms::Edit,
};

use displaydoc::Display;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use std::sync::Arc;

/// A fault routing a message to a session.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
  /// no open session for document {0}
  UnknownDocument(DocumentId),
  /// model rejected the operation: {0}
  Model(#[from] ModelError),
}

impl SessionError {
  fn is_protocol_violation(&self) -> bool {
    match self {
      Self::UnknownDocument(_) => true,
      Self::Model(e) => e.is_protocol_violation(),
    }
  }
}

/// A line to write to the output stream, already routed: commands go to the
/// server, events to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
  Command(Command),
  Event(EditorEvent),
}

/// One open document: its content as the editor sees it plus the model
/// coordinating it with the server.
#[derive(Debug)]
pub struct Session {
  document: Document,
  model: Model,
}

impl Session {
  pub fn open(snapshot: DocumentSnapshot) -> Self {
    let DocumentSnapshot { document, version } = snapshot;
    Self {
      document,
      model: Model::new(version),
    }
  }

  pub fn content(&self) -> &str {
    &self.document.content
  }

  /// Splice the action record's edits into the session content and turn the
  /// record into output lines.
  fn execute(&mut self, action: Action) -> Vec<Outbound> {
    let (applied, send) = action.into_parts();
    let mut out = Vec::new();
    if !applied.is_empty() {
      for edit in applied.iter() {
        self.document.content = edit.apply_to(&self.document.content);
      }
      tracing::debug!(id = %self.document.id, count = applied.len(), "applied remote transforms");
      out.push(Outbound::Event(EditorEvent::applied(TransformsBatch {
        document_id: self.document.id,
        transforms: applied,
      })));
    }
    if let Some(transform) = send {
      tracing::debug!(id = %self.document.id, version = ?transform.version, "submitting transform");
      out.push(Outbound::Command(Command::submit {
        document_id: self.document.id,
        transform,
      }));
    }
    out
  }

  fn local_edit(&mut self, transform: Edit) -> Result<Vec<Outbound>, SessionError> {
    /* Check the edit up front so a rejected one leaves the session copy
     * untouched along with the model. */
    transform.validate_local().map_err(ModelError::from)?;
    /* The editor already applied this edit to its own copy; mirror it into
     * ours before the model versions it. */
    self.document.content = transform.apply_to(&self.document.content);
    let action = self.model.submit(transform)?;
    Ok(self.execute(action))
  }

  fn remote_transforms(&mut self, transforms: Vec<Edit>) -> Result<Vec<Outbound>, SessionError> {
    let action = self.model.receive(transforms)?;
    Ok(self.execute(action))
  }

  fn correction(&mut self, version: u64) -> Result<Vec<Outbound>, SessionError> {
    let action = self.model.correct(version)?;
    Ok(self.execute(action))
  }
}

/// All sessions this host currently coordinates, keyed by document.
#[derive(Debug, Clone)]
pub struct SessionSet {
  sessions: Arc<RwLock<IndexMap<DocumentId, Session>>>,
}

impl Default for SessionSet {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionSet {
  pub fn new() -> Self {
    Self {
      sessions: Arc::new(RwLock::new(IndexMap::new())),
    }
  }

  /// Route one decoded input message, returning the lines to write out.
  ///
  /// Validation faults leave the session alone; protocol violations mean
  /// this client and its peer disagree about session state, so the session
  /// is discarded and must be re-opened with a fresh document message.
  pub fn dispatch(&self, message: InboundMessage) -> Result<Vec<Outbound>, SessionError> {
    match message {
      InboundMessage::document(snapshot) => {
        let id = snapshot.document.id;
        tracing::info!(%id, version = snapshot.version, "opening session");
        self.sessions.write().insert(id, Session::open(snapshot));
        Ok(Vec::new())
      },
      InboundMessage::edit(LocalEdit {
        document_id,
        transform,
      }) => self.with_session(document_id, |session| session.local_edit(transform)),
      InboundMessage::transforms(TransformsBatch {
        document_id,
        transforms,
      }) => self.with_session(document_id, |session| session.remote_transforms(transforms)),
      InboundMessage::correction(Correction {
        document_id,
        version,
      }) => self.with_session(document_id, |session| session.correction(version)),
      InboundMessage::error(ErrorReport { message }) => {
        tracing::error!(%message, "server reported an error, dropping all sessions");
        self.sessions.write().clear();
        Ok(Vec::new())
      },
    }
  }

  /// Snapshot of one session's content, mainly for tests and debugging.
  pub fn content(&self, id: DocumentId) -> Option<String> {
    self.sessions.read().get(&id).map(|s| s.content().to_string())
  }

  fn with_session<F>(&self, id: DocumentId, f: F) -> Result<Vec<Outbound>, SessionError>
  where F: FnOnce(&mut Session) -> Result<Vec<Outbound>, SessionError> {
    let mut sessions = self.sessions.write();
    let session = sessions
      .get_mut(&id)
      .ok_or_else(|| SessionError::UnknownDocument(id))?;
    match f(session) {
      Ok(out) => Ok(out),
      Err(e) => {
        if e.is_protocol_violation() {
          tracing::error!(%id, error = %e, "protocol violation, dropping session");
          sessions.swap_remove(&id);
        }
        Err(e)
      },
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn edit(position: usize, num_delete: usize, insert: &str) -> Edit {
    Edit {
      position,
      num_delete,
      insert: insert.to_string(),
      version: None,
    }
  }

  fn open(set: &SessionSet, content: &str) -> DocumentId {
    let document = Document {
      id: DocumentId::default(),
      content: content.to_string(),
    };
    let id = document.id;
    set
      .dispatch(InboundMessage::document(DocumentSnapshot {
        document,
        version: 1,
      }))
      .unwrap();
    id
  }

  #[test]
  fn local_edit_goes_out_as_a_submit_command() {
    let set = SessionSet::new();
    let id = open(&set, "hello world");
    let out = set
      .dispatch(InboundMessage::edit(LocalEdit {
        document_id: id,
        transform: edit(6, 5, "universe"),
      }))
      .unwrap();
    assert_eq!(set.content(id).unwrap(), "hello universe");
    match out.as_slice() {
      [Outbound::Command(Command::submit { transform, .. })] => {
        assert_eq!(transform.version, Some(2));
        assert_eq!(transform.insert, "universe");
      },
      out => panic!("unexpected output {:?}", out),
    }
  }

  #[test]
  fn remote_transforms_splice_and_notify() {
    let set = SessionSet::new();
    let id = open(&set, "hello world");
    let mut remote = edit(0, 0, "X");
    remote.version = Some(2);
    let out = set
      .dispatch(InboundMessage::transforms(TransformsBatch {
        document_id: id,
        transforms: vec![remote],
      }))
      .unwrap();
    assert_eq!(set.content(id).unwrap(), "Xhello world");
    assert!(matches!(
      out.as_slice(),
      [Outbound::Event(EditorEvent::applied(batch))] if batch.transforms.len() == 1
    ));
  }

  #[test]
  fn concurrent_remote_edit_lands_at_the_shifted_position() {
    let set = SessionSet::new();
    let id = open(&set, "hello");
    set
      .dispatch(InboundMessage::edit(LocalEdit {
        document_id: id,
        transform: edit(0, 0, "A"),
      }))
      .unwrap();
    let mut remote = edit(5, 0, "B");
    remote.version = Some(2);
    set
      .dispatch(InboundMessage::transforms(TransformsBatch {
        document_id: id,
        transforms: vec![remote],
      }))
      .unwrap();
    set
      .dispatch(InboundMessage::correction(Correction {
        document_id: id,
        version: 3,
      }))
      .unwrap();
    assert_eq!(set.content(id).unwrap(), "AhelloB");
  }

  #[test]
  fn unknown_document_is_reported() {
    let set = SessionSet::new();
    let id = DocumentId::default();
    let err = set
      .dispatch(InboundMessage::correction(Correction {
        document_id: id,
        version: 2,
      }))
      .unwrap_err();
    assert_eq!(err, SessionError::UnknownDocument(id));
  }

  #[test]
  fn protocol_violation_drops_the_session() {
    let set = SessionSet::new();
    let id = open(&set, "hello");
    let err = set
      .dispatch(InboundMessage::correction(Correction {
        document_id: id,
        version: 2,
      }))
      .unwrap_err();
    assert_eq!(err, SessionError::Model(ModelError::UnexpectedCorrect));
    assert!(set.content(id).is_none());
  }

  #[test]
  fn validation_fault_keeps_the_session() {
    let set = SessionSet::new();
    let id = open(&set, "hello");
    let mut preset = edit(0, 0, "A");
    preset.version = Some(9);
    let err = set
      .dispatch(InboundMessage::edit(LocalEdit {
        document_id: id,
        transform: preset,
      }))
      .unwrap_err();
    assert!(!err.is_protocol_violation());
    assert!(set.content(id).is_some());
  }
}
