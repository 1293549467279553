// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! Configuration knobs for the NV2A core.
//!
//! The spec leaves several bounds implementation-defined (Cache1's
//! high-watermark, the shader cache's growth limit). This module turns
//! those into config fields instead of hard-coded constants so an
//! embedder can tune them without a rebuild.

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};

/// Top-level configuration for an [`crate::core::pfifo::Pfifo`] +
/// [`crate::core::pgraph::PGraph`] pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NV2AConfig {
    /// Size of the guest VRAM window, in bytes.
    pub vram_size_bytes: u32,

    /// Size of the RAMIN (instance memory) window, in bytes.
    pub ramin_size_bytes: u32,

    /// Cache1 queue high-watermark. The pusher blocks once the queue
    /// reaches this many entries.
    pub cache1_capacity: usize,

    /// Maximum number of compiled shader programs kept in the
    /// fingerprint cache before the least-recently-used entry is
    /// evicted.
    pub shader_cache_capacity: usize,

    /// If true, log a warning for every method that falls through to
    /// the dispatcher's default arm.
    pub log_unimplemented_methods: bool,
}

impl Default for NV2AConfig {
    fn default() -> Self {
        Self {
            vram_size_bytes: 64 * 1024 * 1024,
            ramin_size_bytes: 512 * 1024,
            cache1_capacity: 512,
            shader_cache_capacity: 4096,
            log_unimplemented_methods: true,
        }
    }
}

impl NV2AConfig {
    /// Parse configuration from TOML source text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EmulatorError::InvalidConfig(e.to_string()))
    }
}
