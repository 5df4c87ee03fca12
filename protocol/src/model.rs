/*
 * Description: The state machine reconciling local and remote edit history.
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

//! The state machine reconciling local and remote edit history.
//!
//! A [Model] coordinates one document session against an authoritative
//! server. Local edits are applied to the document immediately by the host
//! and handed to [Model::submit]; the model keeps at most one edit in
//! flight and queues the rest. Remote edits stream in through
//! [Model::receive] in server order, and the server acknowledges the
//! in-flight edit through [Model::correct] with the version it was
//! linearized at.
//!
//! The model moves between three states:
//!
//! - `Ready`: nothing outstanding; remote edits apply directly.
//! - `Sending`: one local edit is in flight. Remote edits are deferred,
//!   because their relation to the in-flight edit is unknown until the
//!   server places it.
//! - `Buffering`: the acknowledgment arrived, and the model is waiting for
//!   any remote edits the server linearized before ours that have not
//!   streamed in yet.
//!
//! Once everything up to the corrected version is present, the deferred
//! remote edits and the entire local queue are collided pairwise so that
//! each side can be applied in its own frame, the queue is coalesced into
//! the next outbound edit, and the cycle repeats.

use crate::transforms::{collide, merge, Edit, TransformError};

use displaydoc::Display;
use thiserror::Error;

use std::collections::VecDeque;

/// A fault reported by the model instead of acting.
///
/// Validation faults leave the model untouched and are benign: the caller
/// may fix the edit and retry. Protocol faults mean the peer and this
/// client disagree about session state, and the session should be torn
/// down; [ModelError::is_protocol_violation] distinguishes the two.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
  /// received unexpected correct action
  UnexpectedCorrect,
  /// correction version {0} does not advance the applied version {1}
  StaleCorrection(u64, u64),
  /// invalid transform: {0}
  Transform(#[from] TransformError),
}

impl ModelError {
  /// True for faults that indicate a desynchronized peer rather than a bad
  /// argument.
  pub fn is_protocol_violation(&self) -> bool {
    match self {
      Self::UnexpectedCorrect | Self::StaleCorrection(..) => true,
      Self::Transform(_) => false,
    }
  }
}

/// Where the model stands in the submit/acknowledge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
  Ready,
  Sending,
  Buffering,
}

/// What the host must do after an operation: apply remote edits to the
/// local document, transmit an edit, or both. These are the only shapes
/// the state machine produces.
///
/// The edits in an `Apply` slot are already transformed into the local
/// document's frame and must be spliced in the given order. A `Send` edit
/// is versioned and ready for the wire; the host must not mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Nothing,
  Apply(Vec<Edit>),
  Send(Edit),
  ApplyAndSend(Vec<Edit>, Edit),
}

impl Action {
  /// Split into the edits to apply and the edit to transmit.
  pub fn into_parts(self) -> (Vec<Edit>, Option<Edit>) {
    match self {
      Self::Nothing => (Vec::new(), None),
      Self::Apply(edits) => (edits, None),
      Self::Send(edit) => (Vec::new(), Some(edit)),
      Self::ApplyAndSend(edits, edit) => (edits, Some(edit)),
    }
  }
}

/// The coordination core for one document session.
///
///```
/// use cotext_protocol::{model::{Action, Model}, transforms::Edit};
///
/// let mut model = Model::new(1);
/// let edit = Edit {
///   position: 6,
///   num_delete: 5,
///   insert: "universe".to_string(),
///   version: None,
/// };
/// match model.submit(edit).unwrap() {
///   Action::Send(sent) => assert_eq!(sent.version, Some(2)),
///   action => panic!("expected a send, got {:?}", action),
/// }
/// assert!(matches!(model.correct(2).unwrap(), Action::Apply(edits) if edits.is_empty()));
/// assert_eq!(model.version(), 2);
///```
#[derive(Debug, Clone)]
pub struct Model {
  state: SyncState,
  /// The server version last fully reflected in the local document.
  version: u64,
  /// The server-assigned version of the in-flight edit; meaningful only in
  /// `Buffering`.
  corrected_version: u64,
  /// The in-flight edit awaiting acknowledgment.
  sending: Option<Edit>,
  /// Local edits queued behind the in-flight one, oldest first.
  unsent: VecDeque<Edit>,
  /// Remote edits deferred while a local edit is in flight, in server
  /// order.
  unapplied: Vec<Edit>,
}

impl Model {
  /// Start coordinating from the server version the document was handed
  /// over at.
  pub fn new(base_version: u64) -> Self {
    Self {
      state: SyncState::Ready,
      version: base_version,
      corrected_version: 0,
      sending: None,
      unsent: VecDeque::new(),
      unapplied: Vec::new(),
    }
  }

  pub fn state(&self) -> SyncState {
    self.state
  }

  /// The applied server version. Never decreases.
  pub fn version(&self) -> u64 {
    self.version
  }

  /// Register a local edit the host has already spliced into its document.
  ///
  /// From `Ready` this versions the edit and asks the host to transmit it;
  /// while an edit is in flight the new one queues behind it and goes out,
  /// possibly coalesced with its neighbors, once the round-trip resolves.
  pub fn submit(&mut self, edit: Edit) -> Result<Action, ModelError> {
    edit.validate_local()?;
    match self.state {
      SyncState::Ready => {
        let mut edit = edit;
        edit.version = Some(self.version + 1);
        self.sending = Some(edit.clone());
        self.state = SyncState::Sending;
        Ok(Action::Send(edit))
      },
      SyncState::Sending | SyncState::Buffering => {
        self.unsent.push_back(edit);
        Ok(Action::Nothing)
      },
    }
  }

  /// Take in a batch of remote edits, in server order. The whole batch is
  /// validated before any state changes.
  pub fn receive(&mut self, edits: Vec<Edit>) -> Result<Action, ModelError> {
    for edit in edits.iter() {
      edit.validate_remote()?;
    }
    match self.state {
      SyncState::Ready => {
        self.version += edits.len() as u64;
        Ok(Action::Apply(edits))
      },
      SyncState::Sending => {
        self.unapplied.extend(edits);
        Ok(Action::Nothing)
      },
      SyncState::Buffering => {
        self.unapplied.extend(edits);
        Ok(self.resolve())
      },
    }
  }

  /// Take in the server's acknowledgment of the in-flight edit, carrying
  /// the version it was accepted at. Only legal in `Sending`.
  pub fn correct(&mut self, version: u64) -> Result<Action, ModelError> {
    if version == 0 {
      return Err(TransformError::ZeroVersion.into());
    }
    match self.state {
      SyncState::Sending => {
        if version <= self.version {
          return Err(ModelError::StaleCorrection(version, self.version));
        }
        self.corrected_version = version;
        self.state = SyncState::Buffering;
        Ok(self.resolve())
      },
      SyncState::Ready | SyncState::Buffering => Err(ModelError::UnexpectedCorrect),
    }
  }

  /// Attempt to finish the in-flight round-trip. Progress needs every
  /// server edit below the corrected version to have been received; until
  /// then the model keeps buffering.
  fn resolve(&mut self) -> Action {
    if self.version + (self.unapplied.len() as u64) < self.corrected_version - 1 {
      return Action::Nothing;
    }

    /* Credit everything at once: the deferred remote edits plus our own
     * edit, which the server has now placed at the corrected version. */
    self.version += self.unapplied.len() as u64 + 1;

    /* Collide every deferred remote edit, in server order, through the
     * whole local queue in queue order. Afterwards the remote edits are in
     * the local document's frame and the queued locals are in the frame
     * the server sees. */
    let mut remote = std::mem::take(&mut self.unapplied);
    for r in remote.iter_mut() {
      if let Some(c) = self.sending.as_mut() {
        collide(r, c);
      }
      for c in self.unsent.iter_mut() {
        collide(r, c);
      }
    }
    self.sending = None;

    match self.unsent.pop_front() {
      None => {
        self.state = SyncState::Ready;
        Action::Apply(remote)
      },
      Some(mut next) => {
        /* Coalesce the queue head as far as it will go: a burst of
         * keystrokes that piled up behind the previous round-trip goes out
         * as one message. */
        while let Some(follower) = self.unsent.front() {
          if !merge(&mut next, follower) {
            break;
          }
          self.unsent.pop_front();
        }
        next.version = Some(self.version + 1);
        self.sending = Some(next.clone());
        self.state = SyncState::Sending;
        Action::ApplyAndSend(remote, next)
      },
    }
  }

  #[cfg(test)]
  fn assert_invariants(&self) {
    match self.state {
      SyncState::Ready => {
        assert!(self.sending.is_none());
        assert!(self.unsent.is_empty());
        assert!(self.unapplied.is_empty());
      },
      SyncState::Sending => {
        let sending = self.sending.as_ref().expect("an edit must be in flight");
        assert_eq!(sending.version, Some(self.version + 1));
      },
      SyncState::Buffering => {
        assert!(self.sending.is_some());
        assert!(self.corrected_version >= self.version + 1);
      },
    }
    if !self.unsent.is_empty() {
      assert!(self.sending.is_some());
    }
  }
}
