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

//! Answers "find references" for a symbol position across many indexed
//! snapshots (dumps) of many repositories. The catalog of dumps and
//! cross-dump package metadata lives behind the [`db::Db`] capability;
//! per-dump content lookups live behind [`bundles::BundleManagerClient`].
//! The resolver in [`resolver`] produces one linear page of locations per
//! request and hands continuation state back as an opaque [`cursor::Cursor`].

pub mod bloom;
pub mod bundles;
pub mod config;
pub mod cursor;
pub mod db;
pub mod errors;
pub mod models;
pub mod resolver;
// Test utilities exposed for integration tests.
pub mod test_utils;

pub use resolver::ReferencePageResolver;
