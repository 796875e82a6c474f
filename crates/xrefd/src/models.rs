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

use serde::{Deserialize, Serialize};

/// Processing state of a dump in the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DumpState {
    Queued,
    Processing,
    Completed,
    Errored,
}

/// One indexed snapshot of a repository at a commit. Immutable once
/// `state` is `Completed`; referenced by id from package and reference
/// rows until retention removes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dump {
    pub id: i64,
    pub commit: String,
    /// Repo-relative prefix stripped from bundle paths at ingest time and
    /// re-applied when locations are published.
    pub root: String,
    pub visible_at_tip: bool,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    pub state: DumpState,
    pub failure_summary: Option<String>,
    pub failure_stacktrace: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tracing_context: String,
    pub repository_id: i64,
    pub indexer: String,
}

/// Kind of moniker attached to a range. `import` monikers participate in
/// the jump to the defining dump; `export` monikers mark what a dump
/// publishes under its package.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MonikerKind {
    Import,
    Export,
    Local,
}

/// A symbol identity within a naming scheme, as stored in a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Moniker {
    pub kind: MonikerKind,
    pub scheme: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_information_id: Option<String>,
}

/// Name and version of the package a moniker belongs to, resolved from a
/// bundle given a package information id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInformation {
    pub name: String,
    pub version: String,
}

/// Zero-based source range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Range {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
}

/// A raw in-bundle location. `path` is relative to the dump root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub range: Range,
}

/// A location rebased into its owning dump: `path` is repo-relative
/// (`dump.root` + bundle path) and the dump carries repository and commit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedLocation {
    pub dump: Dump,
    pub path: String,
    pub range: Range,
}

/// One row yielded by a reference pager: a candidate dump together with
/// the serialized identifier filter recorded for it at ingest time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub dump_id: i64,
    pub filter: Vec<u8>,
}
