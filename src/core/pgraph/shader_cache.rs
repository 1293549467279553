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

//! A bounded LRU cache from [`ShaderState`] to a compiled host program
//! handle.
//!
//! Bounded via [`crate::core::config::NV2AConfig::shader_cache_capacity`];
//! evicts the least-recently-used entry, calling back into the host to
//! delete the evicted program.

use std::collections::HashMap;

use super::shader_state::ShaderState;

/// Evicts a compiled program the cache no longer holds a reference to.
pub trait ProgramDeleter {
    fn delete_program(&self, handle: u64);
}

struct Slot<P> {
    program: P,
    last_used: u64,
}

/// LRU-bounded shader fingerprint cache.
pub struct ShaderCache<P> {
    capacity: usize,
    clock: u64,
    entries: HashMap<u64, (ShaderState, Slot<P>)>,
}

impl<P> ShaderCache<P> {
    /// Create an empty cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            entries: HashMap::new(),
        }
    }

    fn key_for(state: &ShaderState) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up `state`, returning the cached program and marking it
    /// most-recently-used.
    pub fn get(&mut self, state: &ShaderState) -> Option<&P> {
        let key = Self::key_for(state);
        self.clock += 1;
        let clock = self.clock;
        if let Some((stored_state, slot)) = self.entries.get_mut(&key) {
            if stored_state == state {
                slot.last_used = clock;
                return Some(&slot.program);
            }
        }
        None
    }

    /// Insert a freshly compiled `program` for `state`, evicting the
    /// least-recently-used entry first if at capacity. `on_evict` is
    /// called with the evicted program, for host-side cleanup.
    pub fn insert(&mut self, state: ShaderState, program: P, on_evict: impl FnOnce(P)) {
        let key = Self::key_for(&state);
        self.clock += 1;
        let clock = self.clock;

        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(&lru_key) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, slot))| slot.last_used)
                .map(|(k, _)| k)
            {
                if let Some((_, slot)) = self.entries.remove(&lru_key) {
                    on_evict(slot.program);
                }
            }
        }

        self.entries.insert(
            key,
            (
                state,
                Slot {
                    program,
                    last_used: clock,
                },
            ),
        );
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
