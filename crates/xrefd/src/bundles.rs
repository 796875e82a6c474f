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

//! Clients for the bundle manager, the content tier that answers per-dump
//! lookups (references, moniker results, package information). One
//! [`BundleClient`] is scoped to a single dump id.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Location, Moniker, PackageInformation};

/// Hands out per-dump clients. Shared across requests; implementations
/// must be concurrency-safe.
pub trait BundleManagerClient: Send + Sync {
    fn bundle_client(&self, dump_id: i64) -> Box<dyn BundleClient>;
}

/// Per-dump content lookups.
#[async_trait]
pub trait BundleClient: Send + Sync {
    /// Reference locations recorded for the range(s) at a position.
    async fn references(&self, path: &str, line: u32, character: u32) -> Result<Vec<Location>>;

    /// Locations attached to a moniker under `kind` (e.g. "reference"),
    /// plus the total count before paging. `limit == 0` means all.
    async fn moniker_results(
        &self,
        kind: &str,
        scheme: &str,
        identifier: &str,
        limit: usize,
        skip: usize,
    ) -> Result<(Vec<Location>, usize)>;

    /// Package name and version for a package information id within the
    /// given document.
    async fn package_information(
        &self,
        path: &str,
        package_information_id: &str,
    ) -> Result<PackageInformation>;

    /// Monikers attached to the ranges at a position, flattened in range
    /// order. Used to seed a fresh traversal.
    async fn monikers_by_position(
        &self,
        path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<Moniker>>;
}

/// HTTP client for a remote bundle manager.
#[derive(Clone)]
pub struct HttpBundleManagerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBundleManagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl BundleManagerClient for HttpBundleManagerClient {
    fn bundle_client(&self, dump_id: i64) -> Box<dyn BundleClient> {
        Box::new(HttpBundleClient {
            base_url: format!("{}/dbs/{}", self.base_url, dump_id),
            client: self.client.clone(),
        })
    }
}

struct HttpBundleClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MonikerResultsResponse {
    locations: Vec<Location>,
    count: usize,
}

impl HttpBundleClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("bundle manager request {}", url))?
            .error_for_status()
            .with_context(|| format!("bundle manager response {}", url))?;
        response
            .json()
            .await
            .with_context(|| format!("bundle manager payload {}", url))
    }
}

#[async_trait]
impl BundleClient for HttpBundleClient {
    async fn references(&self, path: &str, line: u32, character: u32) -> Result<Vec<Location>> {
        self.get_json(
            "references",
            &[
                ("path", path.to_string()),
                ("line", line.to_string()),
                ("character", character.to_string()),
            ],
        )
        .await
    }

    async fn moniker_results(
        &self,
        kind: &str,
        scheme: &str,
        identifier: &str,
        limit: usize,
        skip: usize,
    ) -> Result<(Vec<Location>, usize)> {
        let mut query = vec![
            ("kind", kind.to_string()),
            ("scheme", scheme.to_string()),
            ("identifier", identifier.to_string()),
            ("skip", skip.to_string()),
        ];
        if limit > 0 {
            query.push(("limit", limit.to_string()));
        }
        let response: MonikerResultsResponse = self.get_json("monikerResults", &query).await?;
        Ok((response.locations, response.count))
    }

    async fn package_information(
        &self,
        path: &str,
        package_information_id: &str,
    ) -> Result<PackageInformation> {
        self.get_json(
            "packageInformation",
            &[
                ("path", path.to_string()),
                ("packageInformationId", package_information_id.to_string()),
            ],
        )
        .await
    }

    async fn monikers_by_position(
        &self,
        path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<Moniker>> {
        // The bundle manager groups monikers by range; flatten in order.
        let grouped: Vec<Vec<Moniker>> = self
            .get_json(
                "monikersByPosition",
                &[
                    ("path", path.to_string()),
                    ("line", line.to_string()),
                    ("character", character.to_string()),
                ],
            )
            .await?;
        Ok(grouped.into_iter().flatten().collect())
    }
}

/// Content for a single dump, keyed the way the resolver queries it.
#[derive(Debug, Clone, Default)]
pub struct BundleData {
    /// `(path, line, character)` -> reference locations.
    pub references: HashMap<(String, u32, u32), Vec<Location>>,
    /// `(path, line, character)` -> monikers attached to those ranges.
    pub monikers: HashMap<(String, u32, u32), Vec<Moniker>>,
    /// `(kind, scheme, identifier)` -> full (unpaged) result list.
    pub moniker_results: HashMap<(String, String, String), Vec<Location>>,
    /// `(path, package information id)` -> package information.
    pub package_information: HashMap<(String, String), PackageInformation>,
}

/// In-memory bundle store for tests and local serving. A dump with no
/// registered bundle answers every lookup with empty results.
#[derive(Default)]
pub struct InMemoryBundles {
    bundles: HashMap<i64, BundleData>,
}

impl InMemoryBundles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bundle(&mut self, dump_id: i64, data: BundleData) {
        self.bundles.insert(dump_id, data);
    }

    pub fn bundle_mut(&mut self, dump_id: i64) -> &mut BundleData {
        self.bundles.entry(dump_id).or_default()
    }
}

impl BundleManagerClient for InMemoryBundles {
    fn bundle_client(&self, dump_id: i64) -> Box<dyn BundleClient> {
        Box::new(InMemoryBundleClient {
            data: self.bundles.get(&dump_id).cloned().unwrap_or_default(),
        })
    }
}

struct InMemoryBundleClient {
    data: BundleData,
}

#[async_trait]
impl BundleClient for InMemoryBundleClient {
    async fn references(&self, path: &str, line: u32, character: u32) -> Result<Vec<Location>> {
        Ok(self
            .data
            .references
            .get(&(path.to_string(), line, character))
            .cloned()
            .unwrap_or_default())
    }

    async fn moniker_results(
        &self,
        kind: &str,
        scheme: &str,
        identifier: &str,
        limit: usize,
        skip: usize,
    ) -> Result<(Vec<Location>, usize)> {
        let all = self
            .data
            .moniker_results
            .get(&(kind.to_string(), scheme.to_string(), identifier.to_string()))
            .cloned()
            .unwrap_or_default();
        let count = all.len();
        let start = skip.min(count);
        let end = if limit == 0 {
            count
        } else {
            (start + limit).min(count)
        };
        Ok((all[start..end].to_vec(), count))
    }

    async fn package_information(
        &self,
        path: &str,
        package_information_id: &str,
    ) -> Result<PackageInformation> {
        self.data
            .package_information
            .get(&(path.to_string(), package_information_id.to_string()))
            .cloned()
            .with_context(|| {
                format!(
                    "package information {} not present in document {}",
                    package_information_id, path
                )
            })
    }

    async fn monikers_by_position(
        &self,
        path: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<Moniker>> {
        Ok(self
            .data
            .monikers
            .get(&(path.to_string(), line, character))
            .cloned()
            .unwrap_or_default())
    }
}
