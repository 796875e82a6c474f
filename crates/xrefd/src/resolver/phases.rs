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

//! The four phase handlers. Each consumes its slice of cursor state and
//! returns `(locations, next_cursor)`; a `None` cursor ends the traversal.

use anyhow::Result;

use super::batch::PagerKind;
use super::location::{resolve_locations_with_dump, slice_locations};
use super::monikers::lookup_moniker;
use super::ReferencePageResolver;
use crate::cursor::{BatchState, Cursor, PositionState};
use crate::errors::ResolveError;
use crate::models::{MonikerKind, ResolvedLocation};

impl ReferencePageResolver {
    /// References recorded directly within the originating dump, plus
    /// reference-kind results for every moniker attached to the range:
    /// a find-references on a reference must also surface references to
    /// the governing definition, and the index data does not always link
    /// those to the local reference set.
    pub(super) async fn handle_same_dump(
        &self,
        state: PositionState,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let dump = self
            .db
            .get_dump_by_id(state.dump_id)
            .await?
            .ok_or(ResolveError::MissingDump(state.dump_id))?;
        let bundle = self.bundles.bundle_client(dump.id);

        let mut locations = bundle
            .references(&state.path, state.line, state.character)
            .await?;

        for moniker in &state.monikers {
            let (results, _) = bundle
                .moniker_results("reference", &moniker.scheme, &moniker.identifier, 0, 0)
                .await?;
            // TODO: deduplicate against the location set gathered so far.
            locations.extend(results);
        }

        let page = slice_locations(&locations, state.skip_results, state.skip_results + self.limit);
        let resolved = resolve_locations_with_dump(&dump, page.to_vec());

        let next_offset = state.skip_results + self.limit;
        let next = if next_offset <= locations.len() {
            // More aggregate results remain past this page.
            Cursor::SameDump(PositionState {
                skip_results: next_offset,
                ..state
            })
        } else {
            Cursor::DefinitionMonikers(PositionState {
                skip_results: 0,
                ..state
            })
        };
        Ok((resolved, Some(next)))
    }

    /// For the first moniker whose package is known, compute the seed for
    /// the same-repo phase; for import monikers, additionally jump to the
    /// defining dump and page through its references.
    pub(super) async fn handle_definition_monikers(
        &self,
        state: PositionState,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let mut next_phase_cursor = None;
        for moniker in &state.monikers {
            let Some(package_information_id) = moniker
                .package_information_id
                .as_deref()
                .filter(|id| !id.is_empty())
            else {
                continue;
            };

            let package = self
                .bundles
                .bundle_client(state.dump_id)
                .package_information(&state.path, package_information_id)
                .await?;

            next_phase_cursor = Some(Cursor::SameRepo(BatchState {
                dump_id: state.dump_id,
                scheme: moniker.scheme.clone(),
                identifier: moniker.identifier.clone(),
                name: package.name,
                version: package.version,
                dump_ids: Vec::new(),
                total_dumps_when_batching: 0,
                skip_dumps_when_batching: 0,
                skip_dumps_in_batch: 0,
                skip_results_in_dump: 0,
            }));
            break;
        }

        for moniker in &state.monikers {
            if moniker.kind != MonikerKind::Import {
                continue;
            }

            let (locations, count) = lookup_moniker(
                self.db.as_ref(),
                self.bundles.as_ref(),
                state.dump_id,
                &state.path,
                "reference",
                moniker,
                self.limit,
                state.skip_results,
            )
            .await?;
            if locations.is_empty() {
                continue;
            }

            let new_offset = state.skip_results + locations.len();
            if new_offset < count {
                // The defining dump has more pages for this moniker.
                let next = Cursor::DefinitionMonikers(PositionState {
                    skip_results: new_offset,
                    ..state.clone()
                });
                return Ok((locations, Some(next)));
            }

            return Ok((locations, next_phase_cursor));
        }

        Ok((Vec::new(), next_phase_cursor))
    }

    /// Other dumps of the requesting repository that reference the
    /// symbol's package. Once exhausted, carry the package triple into
    /// the remote-repo phase with fresh batching state.
    pub(super) async fn handle_same_repo(
        &self,
        state: BatchState,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let seed = state.clone();
        let (locations, next_state) = self
            .resolve_candidate_dumps(PagerKind::SameRepo, state)
            .await?;
        if let Some(next) = next_state {
            return Ok((locations, Some(Cursor::SameRepo(next))));
        }

        let next = Cursor::RemoteRepo(BatchState {
            dump_id: seed.dump_id,
            scheme: seed.scheme,
            identifier: seed.identifier,
            name: seed.name,
            version: seed.version,
            dump_ids: Vec::new(),
            total_dumps_when_batching: 0,
            skip_dumps_when_batching: 0,
            skip_dumps_in_batch: 0,
            skip_results_in_dump: 0,
        });
        Ok((locations, Some(next)))
    }

    /// Dumps of every other repository that reference the symbol's
    /// package. The last phase: exhaustion ends the traversal.
    pub(super) async fn handle_remote_repo(
        &self,
        state: BatchState,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let (locations, next_state) = self
            .resolve_candidate_dumps(PagerKind::RemoteRepo, state)
            .await?;
        Ok((locations, next_state.map(Cursor::RemoteRepo)))
    }
}
