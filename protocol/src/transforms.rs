/*
 * Description: Edit transforms and the primitives that combine them.
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

//! Edit transforms and the primitives that combine them.
//!
//! An [Edit] is a single splice on a linear character buffer. Two edits made
//! on the same side, one right after the other, can sometimes be coalesced
//! with [merge]; two edits made concurrently on opposite sides of the
//! client/server boundary are reconciled with [collide]. The two primitives
//! are deliberately separate APIs: merging across the boundary or colliding
//! within one side's queue is always a bug.

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic constraints on edits that the serde layer cannot express.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
  /// transform carries version 0, but server versions start at 1
  ZeroVersion,
  /// remote transform is missing its server version
  MissingVersion,
  /// local transform already carries server version {0}
  PresetVersion(u64),
}

/// A single splice: delete `num_delete` characters at `position`, then
/// insert `insert` there.
///
/// Offsets and lengths count unicode scalar values, never bytes. `version`
/// is absent on a freshly made local edit and assigned exactly once, when
/// the edit enters the outbound slot; remote edits arrive carrying the
/// version the server linearized them at.
///
///```
/// use cotext_protocol::transforms::Edit;
///
/// let edit = Edit {
///   position: 6,
///   num_delete: 5,
///   insert: "universe".to_string(),
///   version: None,
/// };
/// assert_eq!(edit.apply_to("hello world"), "hello universe");
///```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
  pub position: usize,
  #[serde(default)]
  pub num_delete: usize,
  #[serde(default)]
  pub insert: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<u64>,
}

impl Edit {
  /// Validate the constraints common to both directions.
  pub fn validate(&self) -> Result<(), TransformError> {
    if self.version == Some(0) {
      return Err(TransformError::ZeroVersion);
    }
    Ok(())
  }

  /// Validate an edit arriving from the server, which must be versioned.
  pub fn validate_remote(&self) -> Result<(), TransformError> {
    self.validate()?;
    if self.version.is_none() {
      return Err(TransformError::MissingVersion);
    }
    Ok(())
  }

  /// Validate a freshly submitted local edit, which must not be versioned:
  /// the model assigns the version when the edit enters the outbound slot.
  pub fn validate_local(&self) -> Result<(), TransformError> {
    self.validate()?;
    if let Some(version) = self.version {
      return Err(TransformError::PresetVersion(version));
    }
    Ok(())
  }

  /// Splice this edit into `content`. Ranges past the end of the string
  /// clamp rather than error.
  pub fn apply_to(&self, content: &str) -> String {
    let start = char_boundary(content, self.position);
    let end = char_boundary(content, self.position + self.num_delete);
    [&content[..start], self.insert.as_str(), &content[end..]].concat()
  }
}

/// Byte offset of the `at`th unicode scalar value of `s`, clamped to the
/// end of the string.
fn char_boundary(s: &str, at: usize) -> usize {
  s.char_indices()
    .nth(at)
    .map(|(i, _)| i)
    .unwrap_or_else(|| s.len())
}

fn char_len(s: &str) -> usize {
  s.chars().count()
}

/// Coalesce `b` into `a`, where `b` was made immediately after `a` on the
/// same side and both are still queued for transmission. Returns true iff
/// the two were adjacent enough to combine; on false neither edit is
/// touched. The three mergeable geometries are all computed on `a`'s
/// post-insertion frame.
///
///```
/// use cotext_protocol::transforms::{merge, Edit};
///
/// let mut a = Edit { position: 1, num_delete: 0, insert: "B".to_string(), version: None };
/// let b = Edit { position: 2, num_delete: 0, insert: "C".to_string(), version: None };
/// assert!(merge(&mut a, &b));
/// assert_eq!(a.insert, "BC");
///```
pub fn merge(a: &mut Edit, b: &Edit) -> bool {
  let a_insert_len = char_len(&a.insert);
  if b.position == a.position + a_insert_len {
    /* b writes exactly at the end of a's insertion: append. */
    a.insert.push_str(&b.insert);
    a.num_delete += b.num_delete;
    true
  } else if b.position == a.position {
    /* b rewrites the head of a's insertion; deletion beyond the insertion
     * spills over onto original content behind a. */
    let spill = b.num_delete.saturating_sub(a_insert_len);
    a.num_delete += spill;
    let kept = char_boundary(&a.insert, b.num_delete);
    a.insert = [b.insert.as_str(), &a.insert[kept..]].concat();
    true
  } else if b.position > a.position && b.position < a.position + a_insert_len {
    /* b lands strictly inside a's insertion. */
    let offset = b.position - a.position;
    let spill = b.num_delete.saturating_sub(a_insert_len - offset);
    a.num_delete += spill;
    let head = char_boundary(&a.insert, offset);
    let tail = char_boundary(&a.insert, offset + b.num_delete);
    a.insert = [&a.insert[..head], b.insert.as_str(), &a.insert[tail..]].concat();
    true
  } else {
    false
  }
}

/// Transform a concurrent remote/local pair so that each can be applied in
/// its own history without disturbing the other. Both edits are rewritten
/// in place. Deletion already performed by the other side is credited
/// rather than repeated; ties on position treat the remote edit as the
/// earlier one.
///
///```
/// use cotext_protocol::transforms::{collide, Edit};
///
/// let mut remote = Edit { position: 5, num_delete: 0, insert: "B".to_string(), version: Some(2) };
/// let mut local = Edit { position: 0, num_delete: 0, insert: "A".to_string(), version: Some(2) };
/// collide(&mut remote, &mut local);
/// assert_eq!(remote.position, 6);
/// assert_eq!(local.position, 0);
///```
pub fn collide(remote: &mut Edit, local: &mut Edit) {
  if remote.position <= local.position {
    collide_ordered(remote, local);
  } else {
    collide_ordered(local, remote);
  }
}

fn collide_ordered(earlier: &mut Edit, later: &mut Edit) {
  let earlier_insert_len = char_len(&earlier.insert);
  if earlier.num_delete == 0 {
    /* A pure insertion shifts everything behind it. */
    later.position += earlier_insert_len;
  } else if earlier.position + earlier.num_delete <= later.position {
    /* Disjoint regions: the later edit moves by the earlier's net growth. */
    later.position = later.position - earlier.num_delete + earlier_insert_len;
  } else {
    /* The deletion regions overlap. */
    let gap = later.position - earlier.position;
    let excess = earlier.num_delete - gap;
    if excess > later.num_delete {
      /* The later edit's whole deletion sat inside the earlier's, and its
       * insertion would be swallowed with it: the earlier edit absorbs the
       * later insert by extending its own deletion and insert. */
      earlier.num_delete = earlier.num_delete - later.num_delete + char_len(&later.insert);
      earlier.insert.push_str(&later.insert);
    } else {
      /* The earlier edit stops deleting at the later one's boundary. */
      earlier.num_delete = gap;
    }
    /* The overlapped deletion is credited to the earlier edit and never
     * re-executed by the later one. The later edit re-anchors to the end of
     * the earlier's original insertion. */
    later.num_delete = 0;
    later.position = earlier.position + earlier_insert_len;
  }
}


#[cfg(test)]
mod test {
  use super::{proptest_strategies::*, *};

  use proptest::prelude::*;

  fn edit(position: usize, num_delete: usize, insert: &str) -> Edit {
    Edit {
      position,
      num_delete,
      insert: insert.to_string(),
      version: None,
    }
  }

  #[test]
  fn apply_clamps_past_the_end() {
    assert_eq!(edit(4, 10, "!").apply_to("abcdef"), "abcd!");
    assert_eq!(edit(20, 0, "!").apply_to("abcdef"), "abcdef!");
  }

  #[test]
  fn apply_counts_scalar_values() {
    /* 'é' is two bytes; offsets must not land inside it. */
    assert_eq!(edit(1, 1, "o").apply_to("héllo"), "hollo");
  }

  #[test]
  fn validate_rejects_version_zero() {
    let mut e = edit(0, 0, "x");
    e.version = Some(0);
    assert_eq!(e.validate(), Err(TransformError::ZeroVersion));
  }

  #[test]
  fn merge_appends() {
    let mut a = edit(6, 5, "universe");
    let b = edit(14, 2, "!");
    assert!(merge(&mut a, &b));
    assert_eq!(a, edit(6, 7, "universe!"));
  }

  #[test]
  fn merge_coincident_consumes_the_insert_first() {
    let mut a = edit(0, 1, "Z");
    let b = edit(0, 0, "Q");
    assert!(merge(&mut a, &b));
    assert_eq!(a, edit(0, 1, "QZ"));
  }

  #[test]
  fn merge_coincident_spills_onto_original_content() {
    let mut a = edit(1, 1, "MM");
    let b = edit(1, 3, "R");
    assert!(merge(&mut a, &b));
    assert_eq!(a, edit(1, 2, "R"));
  }

  #[test]
  fn merge_interior_rewrites_the_insert() {
    let mut a = edit(4, 0, "hello ");
    let b = edit(6, 2, "ipp");
    assert!(merge(&mut a, &b));
    assert_eq!(a, edit(4, 0, "heippo "));
  }

  #[test]
  fn merge_rejects_detached_edits() {
    let mut a = edit(3, 1, "B");
    let b = edit(7, 1, "C");
    let before = a.clone();
    assert!(!merge(&mut a, &b));
    assert_eq!(a, before);
  }

  #[test]
  fn collide_disjoint_shifts_by_net_growth() {
    let mut remote = edit(1, 1, "X");
    let mut local = edit(4, 1, "Y");
    collide(&mut remote, &mut local);
    assert_eq!(remote, edit(1, 1, "X"));
    assert_eq!(local, edit(4, 1, "Y"));

    let mut remote = edit(1, 2, "X");
    let mut local = edit(4, 1, "Y");
    collide(&mut remote, &mut local);
    assert_eq!(local, edit(3, 1, "Y"));
  }

  #[test]
  fn collide_overlap_truncates_the_earlier_deletion() {
    /* The earlier (local) edit deletes across the remote's start; the
     * remote's own deletion is credited away entirely. */
    let mut remote = edit(4, 3, "Z");
    let mut local = edit(3, 2, "XY");
    collide(&mut remote, &mut local);
    assert_eq!(local, edit(3, 1, "XY"));
    assert_eq!(remote, edit(5, 0, "Z"));
  }

  #[test]
  fn collide_overlap_absorbs_a_swallowed_insert() {
    let mut remote = edit(2, 5, "E");
    let mut local = edit(3, 1, "L");
    collide(&mut remote, &mut local);
    assert_eq!(remote, edit(2, 5, "EL"));
    /* The later edit re-anchors after the earlier's original insert, so
     * that the other side replays it at the equivalent spot. */
    assert_eq!(local, edit(3, 0, "L"));
  }

  #[test]
  fn collide_overlap_converges_when_absorbing() {
    let content = "0123456789";
    let remote0 = edit(2, 5, "E");
    let local0 = edit(3, 1, "L");
    let (mut remote, mut local) = (remote0.clone(), local0.clone());
    collide(&mut remote, &mut local);
    let client_side = remote.apply_to(&local0.apply_to(content));
    let server_side = local.apply_to(&remote0.apply_to(content));
    assert_eq!(client_side, "01EL789");
    assert_eq!(client_side, server_side);
  }

  #[test]
  fn collide_ties_treat_the_remote_as_earlier() {
    let mut remote = edit(1, 0, "XX");
    let mut local = edit(1, 2, "Y");
    collide(&mut remote, &mut local);
    assert_eq!(remote, edit(1, 0, "XX"));
    assert_eq!(local, edit(3, 2, "Y"));
  }

  proptest! {
    #[test]
    fn merge_preserves_composition((content, a, b) in content_and_sequential_pair()) {
      let sequential = b.apply_to(&a.apply_to(&content));
      let mut merged = a.clone();
      if merge(&mut merged, &b) {
        prop_assert_eq!(merged.apply_to(&content), sequential);
      }
    }
  }
  proptest! {
    #[test]
    fn collide_commutes_outside_deletion_overlap((content, r, l) in content_and_concurrent_pair()) {
      let (earlier, later) = if r.position <= l.position { (&r, &l) } else { (&l, &r) };
      prop_assume!(
        earlier.num_delete == 0 || earlier.position + earlier.num_delete <= later.position
      );
      let (mut r2, mut l2) = (r.clone(), l.clone());
      collide(&mut r2, &mut l2);
      let remote_first = l2.apply_to(&r.apply_to(&content));
      let local_first = r2.apply_to(&l.apply_to(&content));
      prop_assert_eq!(remote_first, local_first);
    }
  }
  proptest! {
    #[test]
    fn collide_never_moves_an_edit_out_of_bounds((content, r, l) in content_and_concurrent_pair()) {
      let (mut r2, mut l2) = (r.clone(), l.clone());
      collide(&mut r2, &mut l2);
      /* Whichever side applies first, the transformed partner must land
       * inside the once-edited string. */
      let after_remote = r.apply_to(&content);
      let after_local = l.apply_to(&content);
      prop_assert!(l2.position <= after_remote.chars().count());
      prop_assert!(r2.position <= after_local.chars().count());
    }
  }
}
