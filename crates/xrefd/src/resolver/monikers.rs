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

use anyhow::Result;

use super::location::resolve_locations_with_dump;
use crate::bundles::BundleManagerClient;
use crate::db::Db;
use crate::models::{Moniker, ResolvedLocation};

/// Resolve a moniker through the catalog to the dump that defines its
/// package, then query that dump's bundle for matching locations.
///
/// The moniker's package information is read from the *source* dump's
/// bundle; `get_package` maps it to the *target* dump. A moniker without
/// package information, or a package the catalog has never seen, yields
/// an empty result with count 0; both are normal outcomes.
pub async fn lookup_moniker(
    db: &dyn Db,
    bundles: &dyn BundleManagerClient,
    dump_id: i64,
    path: &str,
    kind: &str,
    moniker: &Moniker,
    limit: usize,
    skip: usize,
) -> Result<(Vec<ResolvedLocation>, usize)> {
    let Some(package_information_id) = moniker
        .package_information_id
        .as_deref()
        .filter(|id| !id.is_empty())
    else {
        return Ok((Vec::new(), 0));
    };

    let package = bundles
        .bundle_client(dump_id)
        .package_information(path, package_information_id)
        .await?;

    let Some(target) = db
        .get_package(&moniker.scheme, &package.name, &package.version)
        .await?
    else {
        log::debug!(
            "no dump defines {}@{} ({})",
            package.name,
            package.version,
            moniker.scheme
        );
        return Ok((Vec::new(), 0));
    };

    let (locations, count) = bundles
        .bundle_client(target.id)
        .moniker_results(kind, &moniker.scheme, &moniker.identifier, limit, skip)
        .await?;

    Ok((resolve_locations_with_dump(&target, locations), count))
}
