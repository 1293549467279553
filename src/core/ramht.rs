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

//! RAMHT: the object-handle hash table resident in RAMIN.
//!
//! Maps a 32-bit object handle to `{instance address, engine, channel
//! id, valid}`. The hash function intentionally does *not* match the
//! published documentation (see the module-level note on
//! [`hash_for_channel`]) -- this is a known divergence the spec asks us
//! to preserve rather than "fix".

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;

const RAMHT_INSTANCE_MASK: u32 = 0x0000_FFFF;
const RAMHT_ENGINE_MASK: u32 = 0x0003_0000;
const RAMHT_CHID_MASK: u32 = 0x1F00_0000;
const RAMHT_STATUS_MASK: u32 = 0x8000_0000;

/// Engine a RAMHT entry (and therefore a subchannel) can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Software engine: methods are consumed without PGRAPH dispatch.
    Software,
    /// The 3D graphics engine (PGRAPH).
    Graphics,
    /// The DVD subsystem engine.
    Dvd,
}

impl Engine {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Engine::Software,
            0x1_0000 => Engine::Graphics,
            _ => Engine::Dvd,
        }
    }
}

/// A resolved RAMHT entry.
#[derive(Debug, Clone, Copy)]
pub struct RamhtEntry {
    /// The handle this entry was looked up under.
    pub handle: u32,
    /// Instance address of the bound object, in RAMIN.
    pub instance: u32,
    /// Engine the handle is bound to.
    pub engine: Engine,
    /// Channel id this entry belongs to.
    pub channel_id: u8,
    /// Whether the entry slot is marked valid.
    pub valid: bool,
}

/// Compute the RAMHT hash for `handle` given a table of `size` bytes and
/// the channel issuing the lookup.
///
/// `bits = size.trailing_zeros() - 1` (equivalent to the original
/// source's `ffs(size) - 2`). The handle is folded into `bits`-wide XOR
/// chunks, then XORed with `channel_id << (bits - 4)`. This disagrees
/// with the published NV2A documentation but matches the hardware's
/// actual behavior, which is what guest drivers were written against.
pub fn hash_for_channel(size: u32, channel_id: u8, handle: u32) -> u32 {
    let bits = size.trailing_zeros() - 1;
    let mask = (1u32 << bits) - 1;

    let mut hash = 0u32;
    let mut h = handle;
    while h != 0 {
        hash ^= h & mask;
        h >>= bits;
    }
    hash ^= (channel_id as u32) << (bits - 4);
    hash
}

/// Look up `handle` in the RAMHT at `table_offset` within RAMIN, a table
/// of `table_size` bytes, as issued by `channel_id`.
///
/// Returns `Err(InvalidHandle)` if the slot is not marked valid or its
/// stored channel id does not match `channel_id` -- per the spec this is
/// a guest-bug condition, not a recoverable runtime state, but this
/// crate surfaces it as an error rather than asserting.
pub fn lookup(
    mem: &GuestMemory,
    table_offset: u32,
    table_size: u32,
    channel_id: u8,
    handle: u32,
) -> Result<RamhtEntry> {
    let hash = hash_for_channel(table_size, channel_id, handle);
    let entry_offset = table_offset + hash * 8;

    if entry_offset as u64 + 8 > mem.ramin_size() as u64 {
        return Err(EmulatorError::InvalidHandle { handle });
    }

    let ramin = mem.ramin();
    let start = entry_offset as usize;
    let entry_handle = read_le32(ramin, start);
    let context = read_le32(ramin, start + 4);

    let entry = RamhtEntry {
        handle: entry_handle,
        instance: (context & RAMHT_INSTANCE_MASK) << 4,
        engine: Engine::from_bits(context & RAMHT_ENGINE_MASK),
        channel_id: ((context & RAMHT_CHID_MASK) >> 24) as u8,
        valid: (context & RAMHT_STATUS_MASK) != 0,
    };

    if !entry.valid || entry.handle != handle || entry.channel_id != channel_id {
        return Err(EmulatorError::InvalidHandle { handle });
    }

    Ok(entry)
}

/// Write a RAMHT entry. Exposed for test harnesses standing in for the
/// guest driver; the core itself never writes RAMIN.
pub fn write_entry(
    mem: &mut GuestMemory,
    table_offset: u32,
    table_size: u32,
    entry: &RamhtEntry,
) {
    let hash = hash_for_channel(table_size, entry.channel_id, entry.handle);
    let entry_offset = (table_offset + hash * 8) as usize;

    let engine_bits = match entry.engine {
        Engine::Software => 0,
        Engine::Graphics => 0x1_0000,
        Engine::Dvd => 0x2_0000,
    };
    let context = (entry.instance >> 4) & RAMHT_INSTANCE_MASK
        | engine_bits
        | ((entry.channel_id as u32) << 24) & RAMHT_CHID_MASK
        | if entry.valid { RAMHT_STATUS_MASK } else { 0 };

    let ramin = mem.ramin_mut();
    ramin[entry_offset..entry_offset + 4].copy_from_slice(&entry.handle.to_le_bytes());
    ramin[entry_offset + 4..entry_offset + 8].copy_from_slice(&context.to_le_bytes());
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

    #[test]
    fn roundtrip_bind_and_lookup() {
        let mut mem = GuestMemory::new(4096, 4096);
        let entry = RamhtEntry {
            handle: 0xCAFE,
            instance: 0x100,
            engine: Engine::Graphics,
            channel_id: 0,
            valid: true,
        };
        write_entry(&mut mem, 0x1000, 4096, &entry);

        let found = lookup(&mem, 0x1000, 4096, 0, 0xCAFE).unwrap();
        assert_eq!(found.instance, 0x100);
        assert_eq!(found.engine, Engine::Graphics);
        assert_eq!(found.channel_id, 0);
    }

    #[test]
    fn wrong_channel_id_is_invalid_handle() {
        let mut mem = GuestMemory::new(4096, 4096);
        let entry = RamhtEntry {
            handle: 0xCAFE,
            instance: 0x100,
            engine: Engine::Graphics,
            channel_id: 1,
            valid: true,
        };
        write_entry(&mut mem, 0x1000, 4096, &entry);

        let err = lookup(&mem, 0x1000, 4096, 0, 0xCAFE).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidHandle { .. }));
    }

    #[test]
    fn invalid_bit_clear_is_invalid_handle() {
        let mut mem = GuestMemory::new(4096, 4096);
        let entry = RamhtEntry {
            handle: 0xCAFE,
            instance: 0x100,
            engine: Engine::Graphics,
            channel_id: 0,
            valid: false,
        };
        write_entry(&mut mem, 0x1000, 4096, &entry);

        assert!(lookup(&mem, 0x1000, 4096, 0, 0xCAFE).is_err());
    }

    #[test]
    fn hash_matches_known_divergent_formula() {
        // size=4096 -> bits = ctz(4096) - 1 = 12 - 1 = 11
        assert_eq!(hash_for_channel(4096, 0, 0), 0);
        assert_eq!(hash_for_channel(4096, 0, 0x1), 1);
        // channel id folds in at bit (bits - 4) = 7
        assert_eq!(hash_for_channel(4096, 1, 0), 1 << 7);
    }
}
