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

//! HTTP surface for the reference resolver.
//!
//! `GET /references` takes either an opaque `cursor` from a previous page
//! or the initial position (`dump_id`, `path`, `line`, `character`), and
//! returns one page of locations plus the cursor for the next page.
//! Catalog and bundle content come from a JSON snapshot file in local
//! mode, or from a remote bundle manager when one is configured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use xrefd::bundles::{BundleData, BundleManagerClient, HttpBundleManagerClient, InMemoryBundles};
use xrefd::config::{load_app_config, AppConfig, MergeOpts};
use xrefd::cursor::{Cursor, PositionState};
use xrefd::db::{Db, InMemoryDb, ReferenceRow};
use xrefd::errors::ResolveError;
use xrefd::models::{Dump, Location, Moniker, PackageInformation, Range, ResolvedLocation};
use xrefd::ReferencePageResolver;

#[derive(Parser, Debug)]
#[command(name = "xrefd-api", about = "Paged find-references API server")]
struct Args {
    /// Address to bind, e.g. 127.0.0.1:3192
    #[arg(long)]
    bind: Option<String>,
    /// Base URL of a remote bundle manager; omit to serve bundle content
    /// from the snapshot file
    #[arg(long)]
    bundle_manager_url: Option<String>,
    /// JSON snapshot with catalog rows (and bundle content in local mode)
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Candidate dumps batched per catalog refill
    #[arg(long)]
    remote_dump_limit: Option<usize>,
}

#[derive(Clone)]
struct AppState {
    db: Arc<dyn Db>,
    bundles: Arc<dyn BundleManagerClient>,
    config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_app_config(
        AppConfig::default(),
        MergeOpts {
            config_path: args.config.clone(),
            cli_bind_addr: args.bind.clone(),
            cli_bundle_manager_url: args.bundle_manager_url.clone(),
            cli_remote_dump_limit: args.remote_dump_limit,
        },
    )?;

    let snapshot = match &args.snapshot {
        Some(path) => Snapshot::load(path)?,
        None => {
            tracing::warn!("no snapshot supplied; serving an empty catalog");
            Snapshot::default()
        }
    };

    let db: Arc<dyn Db> = Arc::new(snapshot.build_db());
    let bundles: Arc<dyn BundleManagerClient> = match &config.bundle_manager_url {
        Some(url) => {
            tracing::info!("using remote bundle manager at {}", url);
            Arc::new(HttpBundleManagerClient::new(url.clone()))
        }
        None => Arc::new(snapshot.build_bundles()),
    };

    let state = AppState {
        db,
        bundles,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/references", get(references_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("parse bind address {}", config.bind_addr))?;
    tracing::info!("xrefd-api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize, Debug)]
struct ReferencesQuery {
    repository_id: i64,
    commit: String,
    limit: Option<usize>,
    /// Opaque cursor from a previous page. When present the position
    /// parameters are ignored.
    cursor: Option<String>,
    dump_id: Option<i64>,
    path: Option<String>,
    line: Option<u32>,
    character: Option<u32>,
}

#[derive(Serialize)]
struct ReferencesResponse {
    locations: Vec<ApiLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
}

#[derive(Serialize)]
struct ApiLocation {
    repository_id: i64,
    commit: String,
    dump_id: i64,
    path: String,
    range: Range,
}

impl From<ResolvedLocation> for ApiLocation {
    fn from(location: ResolvedLocation) -> Self {
        Self {
            repository_id: location.dump.repository_id,
            commit: location.dump.commit.clone(),
            dump_id: location.dump.id,
            path: location.path,
            range: location.range,
        }
    }
}

async fn references_handler(
    State(app): State<AppState>,
    Query(query): Query<ReferencesQuery>,
) -> Result<Json<ReferencesResponse>, (StatusCode, String)> {
    tracing::debug!("references request: {:?}", query);

    let cursor = match &query.cursor {
        Some(blob) => Cursor::from_wire(blob)
            .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?,
        None => initial_cursor(&app, &query).await?,
    };

    let limit = query.limit.unwrap_or(app.config.default_page_limit).max(1);
    let resolver = ReferencePageResolver::new(
        Arc::clone(&app.db),
        Arc::clone(&app.bundles),
        query.repository_id,
        query.commit.clone(),
        limit,
        app.config.remote_dump_limit,
    );

    let (locations, next) = resolver.resolve_page(cursor).await.map_err(map_error)?;
    let cursor = next
        .map(|c| c.to_wire())
        .transpose()
        .map_err(map_error)?;

    Ok(Json(ReferencesResponse {
        locations: locations.into_iter().map(ApiLocation::from).collect(),
        cursor,
    }))
}

/// Seed a fresh same-dump cursor from the position parameters, attaching
/// the monikers the bundle records for the ranges there.
async fn initial_cursor(
    app: &AppState,
    query: &ReferencesQuery,
) -> Result<Cursor, (StatusCode, String)> {
    let (Some(dump_id), Some(path)) = (query.dump_id, query.path.clone()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "either cursor or dump_id/path/line/character is required".to_string(),
        ));
    };
    let line = query.line.unwrap_or(0);
    let character = query.character.unwrap_or(0);

    let monikers = app
        .bundles
        .bundle_client(dump_id)
        .monikers_by_position(&path, line, character)
        .await
        .map_err(map_error)?;

    Ok(Cursor::SameDump(PositionState {
        dump_id,
        path,
        line,
        character,
        monikers,
        skip_results: 0,
    }))
}

fn map_error(err: anyhow::Error) -> (StatusCode, String) {
    match err.downcast_ref::<ResolveError>() {
        Some(ResolveError::MissingDump(_)) => (StatusCode::NOT_FOUND, err.to_string()),
        Some(ResolveError::InvalidCursor(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
        None => {
            tracing::error!("references request failed: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot loading
// ---------------------------------------------------------------------------

/// Catalog rows plus (for local mode) per-dump bundle content, as one JSON
/// document. The reference `filter` field is the ingest-side encoding.
#[derive(Deserialize, Default)]
struct Snapshot {
    #[serde(default)]
    dumps: Vec<Dump>,
    #[serde(default)]
    packages: Vec<SnapshotPackage>,
    #[serde(default)]
    references: Vec<SnapshotReference>,
    #[serde(default)]
    bundles: Vec<SnapshotBundle>,
}

#[derive(Deserialize)]
struct SnapshotPackage {
    scheme: String,
    name: String,
    version: String,
    dump_id: i64,
}

#[derive(Deserialize)]
struct SnapshotReference {
    scheme: String,
    name: String,
    version: String,
    dump_id: i64,
    /// Raw JSON filter as written by ingestion.
    filter: serde_json::Value,
}

#[derive(Deserialize)]
struct SnapshotBundle {
    dump_id: i64,
    #[serde(default)]
    references: Vec<PositionLocations>,
    #[serde(default)]
    monikers: Vec<PositionMonikers>,
    #[serde(default)]
    moniker_results: Vec<MonikerLocations>,
    #[serde(default)]
    package_information: Vec<DocumentPackageInformation>,
}

#[derive(Deserialize)]
struct PositionLocations {
    path: String,
    line: u32,
    character: u32,
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct PositionMonikers {
    path: String,
    line: u32,
    character: u32,
    monikers: Vec<Moniker>,
}

#[derive(Deserialize)]
struct MonikerLocations {
    kind: String,
    scheme: String,
    identifier: String,
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct DocumentPackageInformation {
    path: String,
    package_information_id: String,
    info: PackageInformation,
}

impl Snapshot {
    fn load(path: &PathBuf) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parse snapshot {}", path.display()))
    }

    fn build_db(&self) -> InMemoryDb {
        let mut db = InMemoryDb::new();
        for dump in &self.dumps {
            db.insert_dump(dump.clone());
        }
        for package in &self.packages {
            db.insert_package(
                &package.scheme,
                &package.name,
                &package.version,
                package.dump_id,
            );
        }
        for reference in &self.references {
            db.insert_reference(ReferenceRow {
                scheme: reference.scheme.clone(),
                name: reference.name.clone(),
                version: reference.version.clone(),
                dump_id: reference.dump_id,
                filter: reference.filter.to_string().into_bytes(),
            });
        }
        db
    }

    fn build_bundles(&self) -> InMemoryBundles {
        let mut bundles = InMemoryBundles::new();
        for bundle in &self.bundles {
            let mut data = BundleData::default();
            for entry in &bundle.references {
                data.references.insert(
                    (entry.path.clone(), entry.line, entry.character),
                    entry.locations.clone(),
                );
            }
            for entry in &bundle.monikers {
                data.monikers.insert(
                    (entry.path.clone(), entry.line, entry.character),
                    entry.monikers.clone(),
                );
            }
            for entry in &bundle.moniker_results {
                data.moniker_results.insert(
                    (entry.kind.clone(), entry.scheme.clone(), entry.identifier.clone()),
                    entry.locations.clone(),
                );
            }
            for entry in &bundle.package_information {
                data.package_information.insert(
                    (entry.path.clone(), entry.package_information_id.clone()),
                    entry.info.clone(),
                );
            }
            bundles.insert_bundle(bundle.dump_id, data);
        }
        bundles
    }
}
