// Copyright 2025 Xrefd Project

// Each test binary compiles this module separately; not all of them use
// every helper.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;

use xrefd::bundles::{BundleManagerClient, InMemoryBundles};
use xrefd::cursor::Cursor;
use xrefd::db::{Db, InMemoryDb};
use xrefd::models::ResolvedLocation;
use xrefd::ReferencePageResolver;

/// A catalog + bundle store under construction.
#[derive(Default)]
pub struct SceneBuilder {
    pub db: InMemoryDb,
    pub bundles: InMemoryBundles,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Scene {
        Scene {
            db: Arc::new(self.db),
            bundles: Arc::new(self.bundles),
        }
    }
}

pub struct Scene {
    pub db: Arc<InMemoryDb>,
    pub bundles: Arc<InMemoryBundles>,
}

impl Scene {
    pub fn resolver(
        &self,
        repository_id: i64,
        commit: &str,
        limit: usize,
        remote_dump_limit: usize,
    ) -> ReferencePageResolver {
        ReferencePageResolver::new(
            self.db.clone() as Arc<dyn Db>,
            self.bundles.clone() as Arc<dyn BundleManagerClient>,
            repository_id,
            commit,
            limit,
            remote_dump_limit,
        )
    }

    /// One stateless request: resolve a page and hand back the wire form
    /// of the next cursor, exactly as a client sees it.
    pub async fn request(
        &self,
        repository_id: i64,
        commit: &str,
        limit: usize,
        remote_dump_limit: usize,
        cursor: Cursor,
    ) -> Result<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let resolver = self.resolver(repository_id, commit, limit, remote_dump_limit);
        let (locations, next) = resolver.resolve_page(cursor).await?;
        // Force every intermediate cursor through the wire codec so the
        // paged drives below also prove the round-trip property.
        let next = match next {
            Some(cursor) => Some(Cursor::from_wire(&cursor.to_wire()?)?),
            None => None,
        };
        Ok((locations, next))
    }

    /// Drive the resolver with the returned cursor until it reports the
    /// traversal done, collecting every location and the phase of every
    /// cursor hop.
    pub async fn drive_to_exhaustion(
        &self,
        repository_id: i64,
        commit: &str,
        limit: usize,
        remote_dump_limit: usize,
        cursor: Cursor,
    ) -> Result<(Vec<ResolvedLocation>, Vec<&'static str>)> {
        let mut all = Vec::new();
        let mut phases = vec![cursor.phase()];
        let mut next = Some(cursor);
        for _ in 0..1000 {
            let Some(cursor) = next else {
                return Ok((all, phases));
            };
            let (locations, new_cursor) = self
                .request(repository_id, commit, limit, remote_dump_limit, cursor)
                .await?;
            all.extend(locations);
            if let Some(cursor) = &new_cursor {
                phases.push(cursor.phase());
            }
            next = new_cursor;
        }
        panic!("traversal did not terminate within 1000 requests");
    }
}

/// Sort key so multisets of locations can be compared across drives.
pub fn location_key(location: &ResolvedLocation) -> (i64, String, u32, u32) {
    (
        location.dump.id,
        location.path.clone(),
        location.range.start_line,
        location.range.start_character,
    )
}

pub fn phase_rank(phase: &str) -> usize {
    match phase {
        "same-dump" => 0,
        "definition-monikers" => 1,
        "same-repo" => 2,
        "remote-repo" => 3,
        other => panic!("unknown phase {}", other),
    }
}
