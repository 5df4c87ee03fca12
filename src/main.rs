/*
 * Description: A client for the cotext protocol.
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

//! A client for the cotext protocol.
//!
//! Speaks line-delimited JSON on stdin/stdout so that any transport or
//! editor integration can be glued on outside: server messages and local
//! edits come in on stdin, submit commands and editor notifications go out
//! on stdout. Logs go to stderr to keep the protocol stream clean.

#![deny(rustdoc::missing_crate_level_docs)]
/* Make all doctests fail if they produce any warnings. */
#![doc(test(attr(deny(warnings))))]
#![deny(clippy::all)]

mod sessions;

use crate::sessions::{Outbound, SessionSet};
use cotext_protocol::{
  documents::DocumentId,
  messages::{EditorEvent, ErrorReport, InboundMessage},
};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::io::{self, BufRead, Write};

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Opts {
  #[clap(subcommand)]
  action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
  /// Print a fresh document id as JSON.
  NewDocument,
  /// Coordinate document sessions over stdin/stdout.
  Serve,
}

fn serve() {
  let sessions = SessionSet::new();
  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut stdout = stdout.lock();
  for line in stdin.lock().lines() {
    let line = line.expect("expected reading from stdin to succeed");
    if line.trim().is_empty() {
      continue;
    }
    let outputs = match serde_json::from_str::<InboundMessage>(&line) {
      Ok(message) => match sessions.dispatch(message) {
        Ok(outputs) => outputs,
        Err(e) => vec![Outbound::Event(EditorEvent::error(ErrorReport {
          message: e.to_string(),
        }))],
      },
      Err(e) => {
        tracing::warn!(error = %e, "undecodable input line");
        vec![Outbound::Event(EditorEvent::error(ErrorReport {
          message: format!("could not decode message: {}", e),
        }))]
      },
    };
    for output in outputs.into_iter() {
      let j = serde_json::to_string(&output).expect("expected json encoding to succeed");
      writeln!(stdout, "{}", j).expect("expected writing to stdout to succeed");
    }
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();
  let Opts { action } = Opts::parse();
  match action {
    Action::NewDocument => {
      let id = DocumentId::default();
      let j = serde_json::to_string(&id).expect("expected json encoding to succeed");
      println!("{}", j);
    },
    Action::Serve => serve(),
  }
}
