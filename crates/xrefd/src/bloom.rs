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

//! Per-reference identifier filter.
//!
//! Ingestion writes one filter per reference row covering every identifier
//! the dump references; the resolver tests the identifier of interest
//! against it before spending a bundle RPC on the dump. False positives
//! are filtered downstream by the actual bundle query; false negatives
//! must not occur. The wire format is fixed by the ingest side: JSON with
//! a base64 bit array.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BloomFilter {
    num_hash_functions: u32,
    num_bits: u32,
    #[serde(with = "bits_base64")]
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Empty filter sized for the ingest side and for test fixtures.
    pub fn new(num_bits: u32, num_hash_functions: u32) -> Self {
        let num_bits = num_bits.max(1);
        Self {
            num_hash_functions: num_hash_functions.max(1),
            num_bits,
            bits: vec![0u8; num_bits.div_ceil(8) as usize],
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let filter: BloomFilter =
            serde_json::from_slice(raw).context("decode reference filter")?;
        anyhow::ensure!(
            filter.bits.len() as u32 * 8 >= filter.num_bits,
            "reference filter bit array too short: {} bytes for {} bits",
            filter.bits.len(),
            filter.num_bits,
        );
        Ok(filter)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("encode reference filter")
    }

    pub fn insert(&mut self, identifier: &str) {
        for index in self.bit_indexes(identifier) {
            self.bits[(index / 8) as usize] |= 1 << (index % 8);
        }
    }

    /// Membership test. `true` may be a false positive; `false` is
    /// authoritative.
    pub fn maybe_contains(&self, identifier: &str) -> bool {
        self.bit_indexes(identifier)
            .into_iter()
            .all(|index| self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0)
    }

    /// The k bit positions for an identifier: double hashing over the two
    /// halves of a SHA-256 digest.
    fn bit_indexes(&self, identifier: &str) -> Vec<u32> {
        let digest = Sha256::digest(identifier.as_bytes());
        let h1 = u64::from_be_bytes(digest[0..8].try_into().unwrap_or_default());
        let h2 = u64::from_be_bytes(digest[8..16].try_into().unwrap_or_default());
        let num_bits = u64::from(self.num_bits.max(1));
        (0..u64::from(self.num_hash_functions))
            .map(|i| ((h1.wrapping_add(i.wrapping_mul(h2))) % num_bits) as u32)
            .collect()
    }
}

mod bits_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bits: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bits))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
