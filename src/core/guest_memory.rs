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

//! Byte-level view into guest VRAM and RAMIN (instance memory).
//!
//! This module owns the two flat byte regions the rest of the core reads
//! and writes, plus a dirty-bit tracker standing in for the host's
//! "mark dirty / test-and-clear dirty" VRAM plumbing, which the
//! specification assumes is externally available but which this crate
//! provides a minimal implementation of so it is self-contained and
//! testable.

/// Guest-visible memory backing VRAM and RAMIN.
///
/// RAMIN is modeled as its own byte region rather than an offset range
/// within VRAM. Real NV2A hardware maps RAMIN into the top of the BAR
/// that also backs VRAM; this crate keeps the two separate for clarity
/// while preserving the address semantics callers rely on (DMA objects
/// whose `target` class is "in-memory" resolve against VRAM, while RAMHT
/// and DMA-descriptor lookups always resolve against RAMIN).
pub struct GuestMemory {
    vram: Vec<u8>,
    ramin: Vec<u8>,
    dirty_ranges: Vec<(u32, u32)>,
}

impl GuestMemory {
    /// Create a new guest memory window with the given region sizes.
    pub fn new(vram_size: u32, ramin_size: u32) -> Self {
        Self {
            vram: vec![0u8; vram_size as usize],
            ramin: vec![0u8; ramin_size as usize],
            dirty_ranges: Vec::new(),
        }
    }

    /// Size of the VRAM region in bytes.
    pub fn vram_size(&self) -> u32 {
        self.vram.len() as u32
    }

    /// Size of the RAMIN region in bytes.
    pub fn ramin_size(&self) -> u32 {
        self.ramin.len() as u32
    }

    /// Read-only view of VRAM.
    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    /// Mutable view of VRAM. Callers that write through this slice are
    /// responsible for calling [`GuestMemory::mark_dirty`] themselves;
    /// prefer [`GuestMemory::vram_write`] when possible.
    pub fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    /// Read-only view of RAMIN.
    pub fn ramin(&self) -> &[u8] {
        &self.ramin
    }

    /// Mutable view of RAMIN.
    pub fn ramin_mut(&mut self) -> &mut [u8] {
        &mut self.ramin
    }

    /// Write `data` into VRAM at `offset` and mark the range dirty.
    pub fn vram_write(&mut self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        let end = start + data.len();
        self.vram[start..end].copy_from_slice(data);
        self.mark_dirty(offset, data.len() as u32);
    }

    /// Mark `[offset, offset + len)` as CPU-dirty.
    pub fn mark_dirty(&mut self, offset: u32, len: u32) {
        if len == 0 {
            return;
        }
        self.dirty_ranges.push((offset, offset + len));
    }

    /// Return true and clear the tracked ranges if any recorded dirty
    /// range overlaps `[offset, offset + len)`.
    pub fn test_and_clear_dirty(&mut self, offset: u32, len: u32) -> bool {
        if len == 0 {
            return false;
        }
        let query_end = offset + len;
        let mut hit = false;
        self.dirty_ranges.retain(|&(start, end)| {
            let overlaps = start < query_end && offset < end;
            if overlaps {
                hit = true;
            }
            !overlaps
        });
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_is_not_dirty() {
        let mut mem = GuestMemory::new(4096, 256);
        assert!(!mem.test_and_clear_dirty(0, 4096));
    }

    #[test]
    fn write_marks_range_dirty_once() {
        let mut mem = GuestMemory::new(4096, 256);
        mem.vram_write(100, &[1, 2, 3, 4]);
        assert!(mem.test_and_clear_dirty(0, 4096));
        assert!(!mem.test_and_clear_dirty(0, 4096), "dirty flag must clear");
    }

    #[test]
    fn dirty_query_respects_disjoint_ranges() {
        let mut mem = GuestMemory::new(4096, 256);
        mem.mark_dirty(1000, 16);
        assert!(!mem.test_and_clear_dirty(0, 999));
        assert!(mem.test_and_clear_dirty(0, 1001));
    }
}
