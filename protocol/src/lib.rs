/*
 * Description: Coordination core for the cotext collaborative editing protocol.
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

//! Coordination core for the cotext collaborative editing protocol.
//!
//! Participants edit a shared document concurrently. Each applies its own
//! edits immediately, submits them to the authoritative server one at a
//! time, and receives everyone else's edits as a linearized stream. The
//! [model::Model] in this crate is the piece that keeps those two histories
//! reconciled; [transforms] holds the edit representation and the merge and
//! collide primitives it is built on, and [messages] the wire vocabulary a
//! host speaks around it.

/* Make all doctests fail if they produce any warnings. */
#![doc(test(attr(deny(warnings))))]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(clippy::all)]

pub mod documents;
pub mod error;
pub mod messages;
pub mod model;
pub mod transforms;

pub use error::Error;
