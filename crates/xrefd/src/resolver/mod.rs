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

//! The paged reference resolver: a resumable four-phase traversal that
//! produces one linear page of reference locations per request.
//!
//! Phases run in a fixed order and never revisit an earlier phase:
//! `same-dump` (references inside the originating dump), then
//! `definition-monikers` (jump through import monikers to the defining
//! dump), then `same-repo` and `remote-repo` (other dumps referencing the
//! symbol's package, narrowed by per-reference identifier filters). All
//! resumption state lives in the client-held [`Cursor`]; the resolver
//! itself is built fresh per request and holds no shared mutable state.

mod batch;
mod location;
mod monikers;
mod phases;

use std::sync::Arc;

use anyhow::Result;

use crate::bundles::BundleManagerClient;
use crate::cursor::Cursor;
use crate::db::Db;
use crate::models::ResolvedLocation;

pub use location::{resolve_locations_with_dump, slice_locations};
pub use monikers::lookup_moniker;

pub struct ReferencePageResolver {
    db: Arc<dyn Db>,
    bundles: Arc<dyn BundleManagerClient>,
    repository_id: i64,
    commit: String,
    remote_dump_limit: usize,
    /// Locations still wanted by the caller in this invocation. Handlers
    /// read it as their per-call budget; the driver decrements it as
    /// batches come back.
    limit: usize,
}

impl ReferencePageResolver {
    pub fn new(
        db: Arc<dyn Db>,
        bundles: Arc<dyn BundleManagerClient>,
        repository_id: i64,
        commit: impl Into<String>,
        limit: usize,
        remote_dump_limit: usize,
    ) -> Self {
        Self {
            db,
            bundles,
            repository_id,
            commit: commit.into(),
            remote_dump_limit,
            limit,
        }
    }

    /// Drive phase handlers until the limit budget is exhausted, the
    /// traversal terminates, or a handler fails. Returns the accumulated
    /// page and, when the traversal can continue, the cursor to resume
    /// from. On error the partial page is discarded.
    pub async fn resolve_page(
        mut self,
        cursor: Cursor,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let mut locations = Vec::new();
        let mut next = Some(cursor);

        while self.limit > 0 {
            let Some(cursor) = next.take() else { break };
            log::debug!(
                "resolving phase {} for dump {} (budget {})",
                cursor.phase(),
                cursor.dump_id(),
                self.limit
            );
            let (batch, new_cursor) = self.dispatch(cursor).await?;
            self.limit = self.limit.saturating_sub(batch.len());
            locations.extend(batch);
            // Phases may transition without producing results; keep
            // iterating until a handler reports the traversal done.
            next = new_cursor;
            if next.is_none() {
                break;
            }
        }

        Ok((locations, next))
    }

    async fn dispatch(
        &self,
        cursor: Cursor,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        match cursor {
            Cursor::SameDump(state) => self.handle_same_dump(state).await,
            Cursor::DefinitionMonikers(state) => self.handle_definition_monikers(state).await,
            Cursor::SameRepo(state) => self.handle_same_repo(state).await,
            Cursor::RemoteRepo(state) => self.handle_remote_repo(state).await,
        }
    }
}
