//! Shared fixtures for the resolver test suites. Exposed publicly so the
//! integration tests under `tests/` can build catalogs, bundles, and
//! filters without repeating boilerplate.

use crate::bloom::BloomFilter;
use crate::db::ReferenceRow;
use crate::models::{
    Dump, DumpState, Location, Moniker, MonikerKind, Range,
};

/// A completed, tip-visible dump.
pub fn dump(id: i64, repository_id: i64, commit: &str, root: &str) -> Dump {
    let mut d = dump_hidden(id, repository_id, commit, root);
    d.visible_at_tip = true;
    d
}

/// A completed dump that is not visible at tip.
pub fn dump_hidden(id: i64, repository_id: i64, commit: &str, root: &str) -> Dump {
    Dump {
        id,
        commit: commit.to_string(),
        root: root.to_string(),
        visible_at_tip: false,
        uploaded_at: chrono::Utc::now(),
        state: DumpState::Completed,
        failure_summary: None,
        failure_stacktrace: None,
        started_at: Some(chrono::Utc::now()),
        finished_at: Some(chrono::Utc::now()),
        tracing_context: String::new(),
        repository_id,
        indexer: "lsif-test".to_string(),
    }
}

/// A one-line location in the given bundle-relative path.
pub fn location(path: &str, line: u32) -> Location {
    Location {
        path: path.to_string(),
        range: Range {
            start_line: line,
            start_character: 3,
            end_line: line,
            end_character: 9,
        },
    }
}

pub fn import_moniker(scheme: &str, identifier: &str, package_information_id: &str) -> Moniker {
    Moniker {
        kind: MonikerKind::Import,
        scheme: scheme.to_string(),
        identifier: identifier.to_string(),
        package_information_id: Some(package_information_id.to_string()),
    }
}

/// A moniker that never leaves its dump: no package information.
pub fn local_moniker(scheme: &str, identifier: &str) -> Moniker {
    Moniker {
        kind: MonikerKind::Local,
        scheme: scheme.to_string(),
        identifier: identifier.to_string(),
        package_information_id: None,
    }
}

pub fn export_moniker(scheme: &str, identifier: &str, package_information_id: &str) -> Moniker {
    Moniker {
        kind: MonikerKind::Export,
        scheme: scheme.to_string(),
        identifier: identifier.to_string(),
        package_information_id: Some(package_information_id.to_string()),
    }
}

/// An encoded reference filter containing exactly `identifiers`.
pub fn encoded_filter(identifiers: &[&str]) -> Vec<u8> {
    let mut filter = BloomFilter::new(2048, 8);
    for identifier in identifiers {
        filter.insert(identifier);
    }
    filter.encode().expect("encode filter")
}

/// A reference row for a package triple pointing at `dump_id`, with a
/// filter containing `identifiers`.
pub fn reference_row(
    scheme: &str,
    name: &str,
    version: &str,
    dump_id: i64,
    identifiers: &[&str],
) -> ReferenceRow {
    ReferenceRow {
        scheme: scheme.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        dump_id,
        filter: encoded_filter(identifiers),
    }
}
