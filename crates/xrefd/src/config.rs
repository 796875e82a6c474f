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
use std::fs;

/// Service-level tunables. `remote_dump_limit` caps how many candidate
/// dumps a single refill batches; it is service-configured and read-only
/// per request, unlike the request-scoped page limit.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub bundle_manager_url: Option<String>,
    pub remote_dump_limit: usize,
    pub default_page_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3192".to_string(),
            bundle_manager_url: None,
            remote_dump_limit: 20,
            default_page_limit: 100,
        }
    }
}

/// CLI-level options that binaries pass to `load_app_config`.
/// Keep this small and explicit; binaries can expand for extra fields.
#[derive(Clone, Debug, Default)]
pub struct MergeOpts {
    pub config_path: Option<std::path::PathBuf>,
    pub cli_bind_addr: Option<String>,
    pub cli_bundle_manager_url: Option<String>,
    pub cli_remote_dump_limit: Option<usize>,
}

/// Load and merge AppConfig from: defaults <- config file <- env vars <- CLI
pub fn load_app_config(mut base: AppConfig, opts: MergeOpts) -> Result<AppConfig> {
    if let Some(path) = opts.config_path.as_ref() {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            let v: toml::Value = toml::from_str(&s)?;
            if let Some(addr) = v.get("bind_addr").and_then(|x| x.as_str()) {
                base.bind_addr = addr.to_string();
            }
            if let Some(url) = v.get("bundle_manager_url").and_then(|x| x.as_str()) {
                base.bundle_manager_url = Some(url.to_string());
            }
            if let Some(n) = v.get("remote_dump_limit").and_then(|x| x.as_integer()) {
                base.remote_dump_limit = n as usize;
            }
            if let Some(n) = v.get("default_page_limit").and_then(|x| x.as_integer()) {
                base.default_page_limit = n as usize;
            }
        }
    }

    // env vars override file
    if let Ok(addr) = std::env::var("XREFD_BIND_ADDR") {
        base.bind_addr = addr;
    }
    if let Ok(url) = std::env::var("XREFD_BUNDLE_MANAGER_URL") {
        base.bundle_manager_url = Some(url);
    }
    if let Ok(n) = std::env::var("XREFD_REMOTE_DUMP_LIMIT") {
        if let Ok(v) = n.parse::<usize>() {
            base.remote_dump_limit = v;
        }
    }
    if let Ok(n) = std::env::var("XREFD_DEFAULT_PAGE_LIMIT") {
        if let Ok(v) = n.parse::<usize>() {
            base.default_page_limit = v;
        }
    }

    // CLI overrides everything
    if let Some(addr) = opts.cli_bind_addr {
        base.bind_addr = addr;
    }
    if let Some(url) = opts.cli_bundle_manager_url {
        base.bundle_manager_url = Some(url);
    }
    if let Some(n) = opts.cli_remote_dump_limit {
        base.remote_dump_limit = n;
    }

    Ok(base)
}
