// Copyright 2025 Xrefd Project

mod common;

use common::SceneBuilder;
use xrefd::cursor::{Cursor, PositionState};
use xrefd::errors::ResolveError;
use xrefd::test_utils::{dump, local_moniker, location};

fn same_dump_cursor(dump_id: i64, path: &str, line: u32) -> Cursor {
    Cursor::SameDump(PositionState {
        dump_id,
        path: path.to_string(),
        line,
        character: 5,
        monikers: Vec::new(),
        skip_results: 0,
    })
}

#[tokio::test]
async fn single_dump_two_references_fit_in_one_page() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", "services/api/"));
    scene.bundles.bundle_mut(1).references.insert(
        ("main.go".to_string(), 7, 5),
        vec![location("main.go", 10), location("util.go", 20)],
    );
    let scene = scene.build();

    let (locations, cursor) = scene
        .request(100, "c0ffee", 10, 20, same_dump_cursor(1, "main.go", 7))
        .await
        .unwrap();

    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].path, "services/api/main.go");
    assert_eq!(locations[0].range.start_line, 10);
    assert_eq!(locations[1].path, "services/api/util.go");
    assert!(cursor.is_none());
}

#[tokio::test]
async fn seven_references_page_three_at_a_time() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    scene.bundles.bundle_mut(1).references.insert(
        ("main.go".to_string(), 7, 5),
        (0..7).map(|i| location("main.go", 10 + i)).collect(),
    );
    let scene = scene.build();

    let (page1, cursor) = scene
        .request(100, "c0ffee", 3, 20, same_dump_cursor(1, "main.go", 7))
        .await
        .unwrap();
    assert_eq!(page1.len(), 3);
    let cursor = cursor.expect("cursor after first page");
    assert_eq!(cursor.phase(), "same-dump");
    match &cursor {
        Cursor::SameDump(state) => assert_eq!(state.skip_results, 3),
        other => panic!("unexpected cursor {:?}", other),
    }

    let (page2, cursor) = scene.request(100, "c0ffee", 3, 20, cursor).await.unwrap();
    assert_eq!(page2.len(), 3);
    let cursor = cursor.expect("cursor after second page");
    match &cursor {
        Cursor::SameDump(state) => assert_eq!(state.skip_results, 6),
        other => panic!("unexpected cursor {:?}", other),
    }

    // Third page drains the last location, hands off to the
    // definition-monikers phase internally, and (with no monikers) the
    // traversal ends within the same request.
    let (page3, cursor) = scene.request(100, "c0ffee", 3, 20, cursor).await.unwrap();
    assert_eq!(page3.len(), 1);
    assert!(cursor.is_none());

    let lines: Vec<u32> = page1
        .iter()
        .chain(&page2)
        .chain(&page3)
        .map(|l| l.range.start_line)
        .collect();
    assert_eq!(lines, vec![10, 11, 12, 13, 14, 15, 16]);
}

#[tokio::test]
async fn moniker_results_are_appended_to_local_references() {
    let mut scene = SceneBuilder::new();
    scene.db.insert_dump(dump(1, 100, "c0ffee", ""));
    let bundle = scene.bundles.bundle_mut(1);
    bundle.references.insert(
        ("main.go".to_string(), 7, 5),
        vec![location("main.go", 10)],
    );
    bundle.moniker_results.insert(
        (
            "reference".to_string(),
            "gomod".to_string(),
            "example.com/pkg:Thing".to_string(),
        ),
        vec![location("other.go", 30), location("other.go", 40)],
    );
    let scene = scene.build();

    let moniker = local_moniker("gomod", "example.com/pkg:Thing");
    let cursor = Cursor::SameDump(PositionState {
        dump_id: 1,
        path: "main.go".to_string(),
        line: 7,
        character: 5,
        monikers: vec![moniker],
        skip_results: 0,
    });

    let (locations, cursor) = scene.request(100, "c0ffee", 10, 20, cursor).await.unwrap();

    // Local references first, then the per-moniker reference rows.
    let lines: Vec<u32> = locations.iter().map(|l| l.range.start_line).collect();
    assert_eq!(lines, vec![10, 30, 40]);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn missing_originating_dump_is_fatal() {
    let scene = SceneBuilder::new().build();

    let err = scene
        .request(100, "c0ffee", 10, 20, same_dump_cursor(404, "main.go", 7))
        .await
        .unwrap_err();

    match err.downcast_ref::<ResolveError>() {
        Some(ResolveError::MissingDump(id)) => assert_eq!(*id, 404),
        other => panic!("unexpected error: {:?}", other),
    }
}
