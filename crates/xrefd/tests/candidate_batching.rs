// Copyright 2025 Xrefd Project

mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::SceneBuilder;
use xrefd::cursor::{BatchState, Cursor};
use xrefd::db::{Db, ReferencePager};
use xrefd::models::{Dump, PackageReference};
use xrefd::test_utils::{dump, dump_hidden, location, reference_row};

const SCHEME: &str = "gomod";
const IDENT: &str = "example.com/lib:Thing";
const PKG: &str = "example.com/lib";
const VERSION: &str = "v1.4.0";

fn same_repo_cursor(dump_id: i64) -> Cursor {
    Cursor::SameRepo(batch_state(dump_id))
}

fn batch_state(dump_id: i64) -> BatchState {
    BatchState {
        dump_id,
        scheme: SCHEME.to_string(),
        identifier: IDENT.to_string(),
        name: PKG.to_string(),
        version: VERSION.to_string(),
        dump_ids: Vec::new(),
        total_dumps_when_batching: 0,
        skip_dumps_when_batching: 0,
        skip_dumps_in_batch: 0,
        skip_results_in_dump: 0,
    }
}

#[tokio::test]
async fn bloom_filter_narrows_a_thousand_rows_to_two_candidates() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    // 1000 dumps in the same repository reference the package, but only
    // two of them mention the identifier we are resolving.
    for id in 1000..2000 {
        scene.db.insert_dump(dump(id, 100, "c0ffee", ""));
        let identifiers: &[&str] = if id == 1100 || id == 1700 {
            &[IDENT, "example.com/lib:Other"]
        } else {
            &["example.com/lib:Other"]
        };
        scene
            .db
            .insert_reference(reference_row(SCHEME, PKG, VERSION, id, identifiers));
    }
    // Dump 1100 has three results so the drain stays on it, preserving
    // the freshly batched state in the returned cursor.
    scene.bundles.bundle_mut(1100).moniker_results.insert(
        ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
        vec![
            location("a.go", 1),
            location("a.go", 2),
            location("a.go", 3),
        ],
    );
    let scene = scene.build();

    let (locations, cursor) = scene
        .request(100, "c0ffee", 2, 25, same_repo_cursor(1))
        .await
        .unwrap();

    assert_eq!(locations.len(), 2);
    assert!(locations.iter().all(|l| l.dump.id == 1100));

    match cursor.expect("more results in dump 1100") {
        Cursor::SameRepo(state) => {
            assert_eq!(state.dump_ids, vec![1100, 1700]);
            assert_eq!(state.total_dumps_when_batching, 1000);
            // Only two candidates were accepted, so scanning ran through
            // every row before stopping.
            assert_eq!(state.skip_dumps_when_batching, 1000);
            assert_eq!(state.skip_dumps_in_batch, 0);
            assert_eq!(state.skip_results_in_dump, 2);
        }
        other => panic!("unexpected cursor {:?}", other),
    }

    assert_eq!(scene.db.open_pager_count(), 0);
}

#[tokio::test]
async fn empty_same_repo_hands_off_and_remote_dump_pages() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    // No same-repo rows at all; one remote dump with five results.
    scene.db.insert_dump(dump(9, 300, "fadedfa", "vendor/"));
    scene
        .db
        .insert_reference(reference_row(SCHEME, PKG, VERSION, 9, &[IDENT]));
    scene.bundles.bundle_mut(9).moniker_results.insert(
        ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
        (0..5).map(|i| location("vendored.go", i)).collect(),
    );
    let scene = scene.build();

    let (locations, cursor) = scene
        .request(100, "c0ffee", 2, 25, same_repo_cursor(1))
        .await
        .unwrap();

    assert_eq!(locations.len(), 2);
    assert!(locations.iter().all(|l| l.dump.id == 9));
    assert_eq!(locations[0].path, "vendor/vendored.go");

    // The cursor stays on the same candidate with the result offset
    // advanced by exactly the page budget.
    match cursor.expect("three results remain in dump 9") {
        Cursor::RemoteRepo(state) => {
            assert_eq!(state.dump_ids, vec![9]);
            assert_eq!(state.skip_dumps_in_batch, 0);
            assert_eq!(state.skip_results_in_dump, 2);
        }
        other => panic!("unexpected cursor {:?}", other),
    }

    assert_eq!(scene.db.open_pager_count(), 0);
}

#[tokio::test]
async fn candidate_missing_from_catalog_is_skipped() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    scene.db.insert_dump(dump(56, 100, "c0ffee", ""));
    scene.bundles.bundle_mut(56).moniker_results.insert(
        ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
        vec![location("survivor.go", 8)],
    );
    let scene = scene.build();

    // A resumed cursor whose batch still names dump 55, retired from the
    // catalog since the batch was built.
    let mut state = batch_state(1);
    state.dump_ids = vec![55, 56];
    state.total_dumps_when_batching = 2;
    state.skip_dumps_when_batching = 2;

    let (locations, cursor) = scene
        .request(100, "c0ffee", 10, 25, Cursor::RemoteRepo(state))
        .await
        .unwrap();

    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].dump.id, 56);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn originating_dump_is_never_a_candidate() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    scene.db.insert_dump(dump(2, 100, "c0ffee", ""));
    for id in [1, 2] {
        scene
            .db
            .insert_reference(reference_row(SCHEME, PKG, VERSION, id, &[IDENT]));
        scene.bundles.bundle_mut(id).moniker_results.insert(
            ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
            vec![location("shared.go", id as u32)],
        );
    }
    let scene = scene.build();

    let (locations, _) = scene
        .drive_to_exhaustion(100, "c0ffee", 10, 25, same_repo_cursor(1))
        .await
        .unwrap();

    // Dump 1 originated the request; its references were the same-dump
    // phase's job and must not resurface from the batch.
    assert!(locations.iter().all(|l| l.dump.id == 2));
    assert_eq!(locations.len(), 1);
}

#[tokio::test]
async fn same_repo_pager_ignores_invisible_and_foreign_dumps() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    // Visible sibling, hidden sibling, and another repository's dump.
    scene.db.insert_dump(dump(2, 100, "c0ffee", ""));
    scene.db.insert_dump(dump_hidden(3, 100, "01dc0de", ""));
    scene.db.insert_dump(dump(4, 300, "fadedfa", ""));
    for id in [2, 3, 4] {
        scene
            .db
            .insert_reference(reference_row(SCHEME, PKG, VERSION, id, &[IDENT]));
        scene.bundles.bundle_mut(id).moniker_results.insert(
            ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
            vec![location("ref.go", id as u32)],
        );
    }
    let scene = scene.build();

    let resolver = scene.resolver(100, "c0ffee", 10, 25);
    let (locations, cursor) = resolver.resolve_page(same_repo_cursor(1)).await.unwrap();

    // Same-repo sees only dump 2; the remote phase then picks up dump 4.
    let mut ids: Vec<i64> = locations.iter().map(|l| l.dump.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 4]);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn remote_repo_pager_keeps_dumps_hidden_in_their_own_repo() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    // The remote dump is not visible at its repository's tip; cross-repo
    // candidacy is by repository alone, so it must still be traversed.
    scene
        .db
        .insert_dump(dump_hidden(7, 400, "5ca1ab1e", "pkg/"));
    scene
        .db
        .insert_reference(reference_row(SCHEME, PKG, VERSION, 7, &[IDENT]));
    scene.bundles.bundle_mut(7).moniker_results.insert(
        ("reference".to_string(), SCHEME.to_string(), IDENT.to_string()),
        vec![location("hidden.go", 14)],
    );
    let scene = scene.build();

    let (locations, cursor) = scene
        .request(100, "c0ffee", 10, 25, same_repo_cursor(1))
        .await
        .unwrap();

    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].dump.id, 7);
    assert_eq!(locations[0].path, "pkg/hidden.go");
    assert!(cursor.is_none());
    assert_eq!(scene.db.open_pager_count(), 0);
}

#[tokio::test]
async fn undecodable_filter_fails_and_still_closes_the_pager() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    scene.db.insert_dump(dump(2, 100, "c0ffee", ""));
    scene.db.insert_reference(xrefd::db::ReferenceRow {
        scheme: SCHEME.to_string(),
        name: PKG.to_string(),
        version: VERSION.to_string(),
        dump_id: 2,
        filter: b"corrupt".to_vec(),
    });
    let scene = scene.build();

    let err = scene
        .request(100, "c0ffee", 10, 25, same_repo_cursor(1))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("decode reference filter"));
    assert_eq!(scene.db.open_pager_count(), 0);
}

/// A catalog whose pager reports rows it can never produce. The refill
/// loop must bail out instead of spinning on the empty pages.
struct BuggyPagerDb;

struct EmptyPager;

#[async_trait]
impl ReferencePager for EmptyPager {
    async fn page_from_offset(&mut self, _offset: usize) -> Result<Vec<PackageReference>> {
        Ok(Vec::new())
    }

    async fn close_tx(self: Box<Self>, err: Option<anyhow::Error>) -> Result<()> {
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Db for BuggyPagerDb {
    async fn get_dump_by_id(&self, _id: i64) -> Result<Option<Dump>> {
        Ok(None)
    }

    async fn get_package(&self, _: &str, _: &str, _: &str) -> Result<Option<Dump>> {
        Ok(None)
    }

    async fn same_repo_pager(
        &self,
        _: i64,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)> {
        Ok((10, Box::new(EmptyPager)))
    }

    async fn package_reference_pager(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: i64,
        _: usize,
    ) -> Result<(usize, Box<dyn ReferencePager>)> {
        Ok((10, Box::new(EmptyPager)))
    }
}

#[tokio::test]
async fn empty_pager_page_terminates_the_refill() {
    use std::sync::Arc;
    use xrefd::bundles::{BundleManagerClient, InMemoryBundles};
    use xrefd::ReferencePageResolver;

    let resolver = ReferencePageResolver::new(
        Arc::new(BuggyPagerDb),
        Arc::new(InMemoryBundles::new()) as Arc<dyn BundleManagerClient>,
        100,
        "c0ffee",
        10,
        25,
    );

    let (locations, cursor) = resolver.resolve_page(same_repo_cursor(1)).await.unwrap();
    assert!(locations.is_empty());
    assert!(cursor.is_none());
}
