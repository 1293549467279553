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

//! DMA object resolver.
//!
//! A DMA object is a 12-byte descriptor in RAMIN yielding
//! `{class, target, address, limit}`. It is used both as the source of
//! pushbuffer command streams and as the base for color/zeta/vertex/
//! texture/semaphore memory access.

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;

const DMA_CLASS_MASK: u32 = 0x0000_0FFF;
const DMA_TARGET_MASK: u32 = 0x0000_3000;
const DMA_ADJUST_MASK: u32 = 0xFFF0_0000;
const DMA_ADDRESS_MASK: u32 = 0x000F_FFFF;

/// Where a DMA object's bytes ultimately live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTarget {
    /// NV_DMA_TARGET_NVM0 (unused by this core's in-scope methods).
    Nvm,
    /// NV_DMA_TARGET_PCI.
    Pci,
    /// NV_DMA_TARGET_VIDMEM -- resolves against guest VRAM.
    VideoMemory,
    /// Unknown/reserved target code; carried through unresolved.
    Other(u32),
}

impl From<u32> for DmaTarget {
    fn from(bits: u32) -> Self {
        match bits {
            0 => DmaTarget::Nvm,
            1 => DmaTarget::Pci,
            2 => DmaTarget::VideoMemory,
            other => DmaTarget::Other(other),
        }
    }
}

/// A resolved DMA object descriptor.
#[derive(Debug, Clone, Copy)]
pub struct DmaObject {
    /// Object class code (low 12 bits of the flags word).
    pub class: u32,
    /// Target memory space.
    pub target: DmaTarget,
    /// Base address within the target space.
    pub address: u32,
    /// Byte length of the addressable range.
    pub limit: u32,
}

/// Resolve a DMA object descriptor at `offset` within RAMIN.
///
/// The descriptor is three little-endian 32-bit words: flags, limit,
/// frame. `address` combines the frame's upper bits with the adjust
/// field packed into the flags word, matching the hardware layout.
pub fn resolve(mem: &GuestMemory, offset: u32) -> Result<DmaObject> {
    if offset as u64 + 12 > mem.ramin_size() as u64 {
        return Err(EmulatorError::InvalidDescriptor { offset });
    }

    let ramin = mem.ramin();
    let start = offset as usize;
    let flags = read_le32(ramin, start);
    let limit = read_le32(ramin, start + 4);
    let frame = read_le32(ramin, start + 8);

    let class = flags & DMA_CLASS_MASK;
    let target = DmaTarget::from((flags & DMA_TARGET_MASK) >> 12);
    let address = (frame & DMA_ADDRESS_MASK) | (flags & DMA_ADJUST_MASK);

    Ok(DmaObject {
        class,
        target,
        address,
        limit,
    })
}

impl DmaObject {
    /// Return a host-addressable byte slice over `[address, address +
    /// limit)` in guest VRAM.
    ///
    /// Only `DmaTarget::VideoMemory` is supported; any other target
    /// returns `InvalidExtent` since this core has no RAM/PCI window to
    /// map against.
    pub fn map<'a>(&self, mem: &'a GuestMemory) -> Result<&'a [u8]> {
        if self.target != DmaTarget::VideoMemory {
            return Err(EmulatorError::InvalidExtent {
                address: self.address,
                limit: self.limit,
            });
        }
        let end = self
            .address
            .checked_add(self.limit)
            .ok_or(EmulatorError::InvalidExtent {
                address: self.address,
                limit: self.limit,
            })?;
        if end > mem.vram_size() {
            return Err(EmulatorError::InvalidExtent {
                address: self.address,
                limit: self.limit,
            });
        }
        Ok(&mem.vram()[self.address as usize..end as usize])
    }
}

fn read_le32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_descriptor(mem: &mut GuestMemory, offset: u32, class: u32, target: u32, address: u32, limit: u32) {
        let flags = (class & DMA_CLASS_MASK) | ((target << 12) & DMA_TARGET_MASK);
        let ramin = mem.ramin_mut();
        ramin[offset as usize..offset as usize + 4].copy_from_slice(&flags.to_le_bytes());
        ramin[offset as usize + 4..offset as usize + 8].copy_from_slice(&limit.to_le_bytes());
        ramin[offset as usize + 8..offset as usize + 12].copy_from_slice(&address.to_le_bytes());
    }

    #[test]
    fn resolves_video_memory_descriptor() {
        let mut mem = GuestMemory::new(4096, 256);
        write_descriptor(&mut mem, 16, 0x3d, 2, 0x100, 0x40);

        let obj = resolve(&mem, 16).unwrap();
        assert_eq!(obj.class, 0x3d);
        assert_eq!(obj.target, DmaTarget::VideoMemory);
        assert_eq!(obj.address, 0x100);
        assert_eq!(obj.limit, 0x40);
    }

    #[test]
    fn offset_past_ramin_end_is_invalid_descriptor() {
        let mem = GuestMemory::new(4096, 256);
        let err = resolve(&mem, 250).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidDescriptor { .. }));
    }

    #[test]
    fn map_rejects_extent_beyond_vram() {
        let mut mem = GuestMemory::new(256, 256);
        write_descriptor(&mut mem, 0, 0x3d, 2, 0x100, 0x200);
        let obj = resolve(&mem, 0).unwrap();
        let err = obj.map(&mem).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidExtent { .. }));
    }

    #[test]
    fn map_returns_slice_of_requested_length() {
        let mut mem = GuestMemory::new(4096, 256);
        write_descriptor(&mut mem, 0, 0x3d, 2, 0x10, 0x20);
        let obj = resolve(&mem, 0).unwrap();
        let slice = obj.map(&mem).unwrap();
        assert_eq!(slice.len(), 0x20);
    }
}
