// Copyright 2025 Xrefd Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Serializable resumption state for a paged reference traversal.
//!
//! A cursor is opaque to clients: the wire form is standard base64 over a
//! JSON record tagged by `phase`. Within the service the cursor is the
//! single authority on where a traversal stands; no other per-request
//! state survives between pages.

use anyhow::Result;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::ResolveError;
use crate::models::Moniker;

/// Position-anchored state shared by the `same-dump` and
/// `definition-monikers` phases. Fields missing on the wire default to
/// zero values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PositionState {
    /// Originating dump for the whole request.
    pub dump_id: i64,
    /// Bundle-relative path of the document the user is pointing at.
    pub path: String,
    pub line: u32,
    pub character: u32,
    /// Monikers attached to the range at `(path, line, character)`.
    pub monikers: Vec<Moniker>,
    /// Results already emitted by the current bundle query.
    pub skip_results: usize,
}

/// Batch-traversal state shared by the `same-repo` and `remote-repo`
/// phases. The two skip counters for dumps resume the nested paging
/// loops: `skip_dumps_when_batching` is the catalog pager offset,
/// `skip_dumps_in_batch` the index into the current `dump_ids` batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchState {
    pub dump_id: i64,
    pub scheme: String,
    pub identifier: String,
    pub name: String,
    pub version: String,
    /// Candidate dumps accepted by the identifier filter. Empty exactly
    /// when a refill from the catalog pager is required.
    pub dump_ids: Vec<i64>,
    pub total_dumps_when_batching: usize,
    pub skip_dumps_when_batching: usize,
    pub skip_dumps_in_batch: usize,
    pub skip_results_in_dump: usize,
}

/// Resumable traversal state, one variant per phase. Phase progression is
/// monotonic: same-dump, definition-monikers, same-repo, remote-repo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum Cursor {
    SameDump(PositionState),
    DefinitionMonikers(PositionState),
    SameRepo(BatchState),
    RemoteRepo(BatchState),
}

impl Cursor {
    /// The dump the request originated from.
    pub fn dump_id(&self) -> i64 {
        match self {
            Cursor::SameDump(s) | Cursor::DefinitionMonikers(s) => s.dump_id,
            Cursor::SameRepo(s) | Cursor::RemoteRepo(s) => s.dump_id,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            Cursor::SameDump(_) => "same-dump",
            Cursor::DefinitionMonikers(_) => "definition-monikers",
            Cursor::SameRepo(_) => "same-repo",
            Cursor::RemoteRepo(_) => "remote-repo",
        }
    }

    /// Encode to the opaque wire form handed to clients.
    pub fn to_wire(&self) -> Result<String> {
        let raw = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    /// Decode a wire blob. Garbage input and unknown phases both surface
    /// as [`ResolveError::InvalidCursor`]; the resolver does not inspect
    /// previous cursors beyond this.
    pub fn from_wire(blob: &str) -> Result<Self, ResolveError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .map_err(|e| ResolveError::InvalidCursor(format!("bad base64: {}", e)))?;
        serde_json::from_slice(&raw)
            .map_err(|e| ResolveError::InvalidCursor(format!("bad payload: {}", e)))
    }
}
