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

//! Candidate-dump traversal shared by the same-repo and remote-repo
//! phases. Two nested paging loops resume across requests: the *refill*
//! step pages the catalog for reference rows and narrows them to a batch
//! of candidate dump ids via the per-reference identifier filter; the
//! *drain* step walks the batch, querying one candidate's bundle at a
//! time and emitting as soon as one produces results.

use anyhow::{anyhow, Result};

use super::location::resolve_locations_with_dump;
use super::ReferencePageResolver;
use crate::bloom::BloomFilter;
use crate::cursor::BatchState;
use crate::db::ReferencePager;
use crate::models::{PackageReference, ResolvedLocation};

/// Which catalog pager a phase traverses.
pub(super) enum PagerKind {
    SameRepo,
    RemoteRepo,
}

impl ReferencePageResolver {
    pub(super) async fn resolve_candidate_dumps(
        &self,
        kind: PagerKind,
        mut state: BatchState,
    ) -> Result<(Vec<ResolvedLocation>, Option<BatchState>)> {
        loop {
            if state.dump_ids.is_empty() {
                let offset_before = state.skip_dumps_when_batching;
                self.refill_candidate_batch(&kind, &mut state).await?;
                if state.dump_ids.is_empty() {
                    // The filter rejected everything scanned. If the scan
                    // advanced there may be acceptable rows further on;
                    // a stalled scan means the rows are exhausted.
                    if state.skip_dumps_when_batching == offset_before
                        || state.skip_dumps_when_batching >= state.total_dumps_when_batching
                    {
                        return Ok((Vec::new(), None));
                    }
                    continue;
                }
            }

            if let Some(result) = self.drain_candidate_batch(&mut state).await? {
                return Ok(result);
            }

            // The whole batch drained without a result (candidates were
            // the originating dump, retired, or empty). Refill when rows
            // remain so paging never drops a later batch.
            if state.skip_dumps_when_batching < state.total_dumps_when_batching {
                state.dump_ids.clear();
                state.skip_dumps_in_batch = 0;
                state.skip_results_in_dump = 0;
                continue;
            }
            return Ok((Vec::new(), None));
        }
    }

    /// Walk the current batch from the recorded index, emitting as soon
    /// as one candidate's bundle produces results. `None` means the batch
    /// drained without producing anything.
    async fn drain_candidate_batch(
        &self,
        state: &mut BatchState,
    ) -> Result<Option<(Vec<ResolvedLocation>, Option<BatchState>)>> {
        for i in state.skip_dumps_in_batch..state.dump_ids.len() {
            let candidate_id = state.dump_ids[i];
            // The originating dump's references were already produced by
            // the same-dump phase.
            if candidate_id == state.dump_id {
                continue;
            }
            let Some(dump) = self.db.get_dump_by_id(candidate_id).await? else {
                // Retired from the catalog since the batch was built.
                continue;
            };

            let (results, count) = self
                .bundles
                .bundle_client(dump.id)
                .moniker_results(
                    "reference",
                    &state.scheme,
                    &state.identifier,
                    self.limit,
                    state.skip_results_in_dump,
                )
                .await?;
            if results.is_empty() {
                continue;
            }
            let resolved = resolve_locations_with_dump(&dump, results);

            // Emit immediately; the next cursor picks the innermost loop
            // that still has work.
            let new_result_offset = state.skip_results_in_dump + resolved.len();
            if new_result_offset < count {
                state.skip_results_in_dump = new_result_offset;
                return Ok(Some((resolved, Some(state.clone()))));
            }
            if i + 1 < state.dump_ids.len() {
                state.skip_dumps_in_batch = i + 1;
                state.skip_results_in_dump = 0;
                return Ok(Some((resolved, Some(state.clone()))));
            }
            if state.skip_dumps_when_batching < state.total_dumps_when_batching {
                state.dump_ids.clear();
                state.skip_dumps_in_batch = 0;
                state.skip_results_in_dump = 0;
                return Ok(Some((resolved, Some(state.clone()))));
            }
            return Ok(Some((resolved, None)));
        }

        Ok(None)
    }

    /// Page the catalog from the recorded offset, keeping dump ids whose
    /// filter may contain the identifier, until `remote_dump_limit`
    /// candidates are accepted or the rows run out. The pager's
    /// transaction is confined to this call: closed on every exit path,
    /// with a mid-page error carried through the close.
    async fn refill_candidate_batch(
        &self,
        kind: &PagerKind,
        state: &mut BatchState,
    ) -> Result<()> {
        let (total_count, mut pager) = self.open_pager(kind, state).await?;

        let mut accepted: Vec<i64> = Vec::new();
        let mut new_offset = state.skip_dumps_when_batching;

        while accepted.len() < self.remote_dump_limit && new_offset < total_count {
            let page = match pager.page_from_offset(new_offset).await {
                Ok(page) => page,
                Err(err) => return Err(close_with(pager, err).await),
            };
            if page.is_empty() {
                // A correct pager never yields an empty page below
                // total_count; bail out rather than loop forever.
                break;
            }

            match apply_bloom_filter(&page, &state.identifier, self.remote_dump_limit - accepted.len()) {
                Ok((kept, scanned)) => {
                    accepted.extend(kept);
                    new_offset += scanned;
                }
                Err(err) => return Err(close_with(pager, err).await),
            }
        }

        log::debug!(
            "batched {} candidate dumps from {} reference rows for {}",
            accepted.len(),
            total_count,
            state.identifier
        );

        state.dump_ids = accepted;
        state.skip_dumps_when_batching = new_offset;
        state.total_dumps_when_batching = total_count;

        pager.close_tx(None).await
    }

    async fn open_pager(
        &self,
        kind: &PagerKind,
        state: &BatchState,
    ) -> Result<(usize, Box<dyn ReferencePager>)> {
        match kind {
            PagerKind::SameRepo => {
                self.db
                    .same_repo_pager(
                        self.repository_id,
                        &self.commit,
                        &state.scheme,
                        &state.name,
                        &state.version,
                        self.remote_dump_limit,
                    )
                    .await
            }
            PagerKind::RemoteRepo => {
                self.db
                    .package_reference_pager(
                        &state.scheme,
                        &state.name,
                        &state.version,
                        self.repository_id,
                        self.remote_dump_limit,
                    )
                    .await
            }
        }
    }
}

/// Roll the pager back, handing `err` through its close path so the
/// original failure is what the caller sees.
async fn close_with(pager: Box<dyn ReferencePager>, err: anyhow::Error) -> anyhow::Error {
    match pager.close_tx(Some(err)).await {
        Err(err) => err,
        Ok(()) => anyhow!("reference pager dropped the error it was closed with"),
    }
}

/// Keep dump ids whose filter may contain `identifier`, accepting at most
/// `max`. Returns the accepted ids and the number of rows scanned
/// (rejected rows included) so the pager offset advances past everything
/// consumed.
fn apply_bloom_filter(
    page: &[PackageReference],
    identifier: &str,
    max: usize,
) -> Result<(Vec<i64>, usize)> {
    let mut kept = Vec::new();
    let mut scanned = 0;
    for row in page {
        if kept.len() >= max {
            break;
        }
        scanned += 1;
        let filter = BloomFilter::decode(&row.filter)?;
        if filter.maybe_contains(identifier) {
            kept.push(row.dump_id);
        }
    }
    Ok((kept, scanned))
}
