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

//! Catalog capability used by the resolver to look up dumps, map package
//! triples to defining dumps, and page over cross-dump reference rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Dump, PackageReference};

/// Read-side catalog operations. Absent rows are a normal outcome, not an
/// error; transport and backend failures surface through `anyhow`.
#[async_trait]
pub trait Db: Send + Sync {
    async fn get_dump_by_id(&self, id: i64) -> Result<Option<Dump>>;

    /// The dump that *defines* `(scheme, name, version)`.
    async fn get_package(&self, scheme: &str, name: &str, version: &str)
        -> Result<Option<Dump>>;

    /// Pager over reference rows for dumps in `repository_id` visible from
    /// `commit`. Returns the total row count alongside the pager; `limit`
    /// is the page size for each `page_from_offset` call.
    async fn same_repo_pager(
        &self,
        repository_id: i64,
        commit: &str,
        scheme: &str,
        name: &str,
        version: &str,
        limit: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)>;

    /// Pager over reference rows for dumps outside `exclude_repository_id`.
    async fn package_reference_pager(
        &self,
        scheme: &str,
        name: &str,
        version: &str,
        exclude_repository_id: i64,
        limit: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)>;
}

/// A transactional cursor over catalog reference rows. The pager owns the
/// enclosing transaction: it is opened by the `Db` factory methods and
/// confined to a single phase invocation. Implementations must roll the
/// transaction back on drop so a cancelled request cannot strand it.
#[async_trait]
pub trait ReferencePager: Send {
    /// Rows starting at `offset`, at most the page size the pager was
    /// opened with. An offset at or past the end yields an empty page.
    async fn page_from_offset(&mut self, offset: usize) -> Result<Vec<PackageReference>>;

    /// Commit (when `err` is `None`) or roll back the transaction. When a
    /// caller captured an error mid-page it passes it here and gets it
    /// back as the returned `Err`, so the original failure survives the
    /// close path.
    async fn close_tx(self: Box<Self>, err: Option<anyhow::Error>) -> Result<()>;
}

/// Internal reference row as ingestion records it.
#[derive(Debug, Clone)]
pub struct ReferenceRow {
    pub scheme: String,
    pub name: String,
    pub version: String,
    pub dump_id: i64,
    pub filter: Vec<u8>,
}

/// In-memory catalog for tests and local serving.
#[derive(Default)]
pub struct InMemoryDb {
    dumps: HashMap<i64, Dump>,
    packages: HashMap<(String, String, String), i64>,
    references: Vec<ReferenceRow>,
    open_pagers: Arc<AtomicUsize>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dump(&mut self, dump: Dump) {
        self.dumps.insert(dump.id, dump);
    }

    /// Register `dump_id` as the definer of the package triple.
    pub fn insert_package(&mut self, scheme: &str, name: &str, version: &str, dump_id: i64) {
        self.packages
            .insert((scheme.into(), name.into(), version.into()), dump_id);
    }

    pub fn insert_reference(&mut self, row: ReferenceRow) {
        self.references.push(row);
    }

    /// Number of reference pagers whose transaction is still open. Used by
    /// tests to assert the pager-lifetime invariant.
    pub fn open_pager_count(&self) -> usize {
        self.open_pagers.load(Ordering::SeqCst)
    }

    fn matching_rows<F>(&self, scheme: &str, name: &str, version: &str, keep: F) -> Vec<PackageReference>
    where
        F: Fn(&Dump) -> bool,
    {
        let mut rows: Vec<(i64, PackageReference)> = self
            .references
            .iter()
            .filter(|row| row.scheme == scheme && row.name == name && row.version == version)
            .filter_map(|row| {
                let dump = self.dumps.get(&row.dump_id)?;
                keep(dump).then(|| {
                    (
                        row.dump_id,
                        PackageReference {
                            dump_id: row.dump_id,
                            filter: row.filter.clone(),
                        },
                    )
                })
            })
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows.into_iter().map(|(_, r)| r).collect()
    }

    fn open_pager(&self, rows: Vec<PackageReference>, page_size: usize) -> (usize, Box<dyn ReferencePager>) {
        self.open_pagers.fetch_add(1, Ordering::SeqCst);
        let total = rows.len();
        let pager = InMemoryReferencePager {
            rows,
            page_size: page_size.max(1),
            open_pagers: Arc::clone(&self.open_pagers),
            closed: false,
        };
        (total, Box::new(pager))
    }
}

#[async_trait]
impl Db for InMemoryDb {
    async fn get_dump_by_id(&self, id: i64) -> Result<Option<Dump>> {
        Ok(self.dumps.get(&id).cloned())
    }

    async fn get_package(&self, scheme: &str, name: &str, version: &str) -> Result<Option<Dump>> {
        let dump_id = self
            .packages
            .get(&(scheme.to_string(), name.to_string(), version.to_string()));
        Ok(dump_id.and_then(|id| self.dumps.get(id)).cloned())
    }

    async fn same_repo_pager(
        &self,
        repository_id: i64,
        commit: &str,
        scheme: &str,
        name: &str,
        version: &str,
        limit: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)> {
        // A dump is visible from (repo, commit) when it was indexed at that
        // commit or is flagged visible at tip.
        let rows = self.matching_rows(scheme, name, version, |dump| {
            dump.repository_id == repository_id
                && (dump.commit == commit || dump.visible_at_tip)
        });
        Ok(self.open_pager(rows, limit))
    }

    async fn package_reference_pager(
        &self,
        scheme: &str,
        name: &str,
        version: &str,
        exclude_repository_id: i64,
        limit: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)> {
        // Cross-repo rows are filtered by repository only; tip visibility
        // scopes the same-repo pager.
        let rows = self.matching_rows(scheme, name, version, |dump| {
            dump.repository_id != exclude_repository_id
        });
        Ok(self.open_pager(rows, limit))
    }
}

struct InMemoryReferencePager {
    rows: Vec<PackageReference>,
    page_size: usize,
    open_pagers: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl ReferencePager for InMemoryReferencePager {
    async fn page_from_offset(&mut self, offset: usize) -> Result<Vec<PackageReference>> {
        if offset >= self.rows.len() {
            return Ok(Vec::new());
        }
        let end = (offset + self.page_size).min(self.rows.len());
        Ok(self.rows[offset..end].to_vec())
    }

    async fn close_tx(mut self: Box<Self>, err: Option<anyhow::Error>) -> Result<()> {
        self.closed = true;
        self.open_pagers.fetch_sub(1, Ordering::SeqCst);
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for InMemoryReferencePager {
    fn drop(&mut self) {
        // Rollback path for cancelled requests.
        if !self.closed {
            self.open_pagers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
