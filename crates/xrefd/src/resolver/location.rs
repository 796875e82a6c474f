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

use crate::models::{Dump, Location, ResolvedLocation};

/// Rebase raw in-bundle locations into their owning dump: the published
/// path is the dump root followed by the bundle-relative path.
pub fn resolve_locations_with_dump(dump: &Dump, locations: Vec<Location>) -> Vec<ResolvedLocation> {
    locations
        .into_iter()
        .map(|location| ResolvedLocation {
            dump: dump.clone(),
            path: format!("{}{}", dump.root, location.path),
            range: location.range,
        })
        .collect()
}

/// `locations[lo..hi]` with both bounds clamped to the slice.
pub fn slice_locations(locations: &[Location], lo: usize, hi: usize) -> &[Location] {
    let lo = lo.min(locations.len());
    let hi = hi.min(locations.len()).max(lo);
    &locations[lo..hi]
}
