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

//! Graphics-object records and the per-subchannel object table.
//!
//! A RAMHT entry only yields `{instance, engine, channel id}`. The
//! actual class and per-class fields of the object live at its
//! instance address in RAMIN, as a small fixed control block. This
//! module decodes that block and tracks which object is currently
//! bound to which of the 8 subchannels.

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;

/// Object class codes this core understands (the rest pass through
/// unparsed as [`GraphicsObject::Unknown`]).
pub mod class_codes {
    /// NV10_CONTEXT_SURFACES_2D.
    pub const CONTEXT_SURFACES_2D: u8 = 0x9f;
    /// NV_IMAGE_BLIT (NV09F).
    pub const IMAGE_BLIT: u8 = 0x9e;
    /// NV097_KELVIN_PRIMITIVE, the 3D engine class.
    pub const KELVIN: u8 = 0x97;
}

/// A decoded graphics object, keyed by its class code.
#[derive(Debug, Clone, Copy)]
pub enum GraphicsObject {
    /// A 2D blit context surface pair.
    ContextSurfaces2D {
        dma_src: u32,
        dma_dst: u32,
        color_format: u8,
        src_pitch: u16,
        dst_pitch: u16,
        src_offset: u32,
        dst_offset: u32,
    },
    /// An image blit trigger object (NV09F).
    ImageBlit {
        context_surfaces_handle: u32,
        operation: u8,
        in_x: u16,
        in_y: u16,
        out_x: u16,
        out_y: u16,
        width: u16,
        height: u16,
    },
    /// The Kelvin 3D primitive class. Its real state lives in PGRAPH;
    /// this variant only records the DMA contexts set at bind time.
    Kelvin {
        dma_notifies: u32,
        dma_state: u32,
        dma_semaphore: u32,
        semaphore_offset: u32,
    },
    /// Any other class code; carried through unparsed.
    Unknown(u8),
}

impl GraphicsObject {
    /// The class code this object was decoded from.
    pub fn class(&self) -> u8 {
        match self {
            GraphicsObject::ContextSurfaces2D { .. } => class_codes::CONTEXT_SURFACES_2D,
            GraphicsObject::ImageBlit { .. } => class_codes::IMAGE_BLIT,
            GraphicsObject::Kelvin { .. } => class_codes::KELVIN,
            GraphicsObject::Unknown(c) => *c,
        }
    }
}

/// Mask isolating the graphics class from the first control word at an
/// object's instance address (`NV_PGRAPH_CTX_SWITCH1_GRCLASS`).
const CTX_SWITCH1_GRCLASS_MASK: u32 = 0x0000_00FF;

/// Read the graphics class out of the 3-word control block at
/// `instance` in RAMIN, the same block `resolve` below decodes further.
pub fn resolve_class(mem: &GuestMemory, instance: u32) -> Result<u8> {
    let ramin = mem.ramin();
    let start = instance as usize;
    if start + 4 > ramin.len() {
        return Err(EmulatorError::InvalidDescriptor { offset: instance });
    }
    let word0 = read_le32(ramin, start);
    Ok((word0 & CTX_SWITCH1_GRCLASS_MASK) as u8)
}

fn read_le32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Decode the object at `instance` (a RAMIN byte offset) given its
/// class code. The Kelvin class carries only its DMA context words
/// here; per-draw state is owned by PGRAPH directly once bound.
pub fn decode(mem: &GuestMemory, class: u8, instance: u32) -> Result<GraphicsObject> {
    let ramin = mem.ramin();
    let start = instance as usize;
    let need = match class {
        class_codes::CONTEXT_SURFACES_2D => 28,
        class_codes::IMAGE_BLIT => 20,
        class_codes::KELVIN => 16,
        _ => 0,
    };
    if start + need > ramin.len() {
        return Err(EmulatorError::InvalidDescriptor { offset: instance });
    }

    Ok(match class {
        class_codes::CONTEXT_SURFACES_2D => GraphicsObject::ContextSurfaces2D {
            dma_src: read_le32(ramin, start),
            dma_dst: read_le32(ramin, start + 4),
            color_format: ramin[start + 8],
            src_pitch: read_le32(ramin, start + 12) as u16,
            dst_pitch: read_le32(ramin, start + 16) as u16,
            src_offset: read_le32(ramin, start + 20),
            dst_offset: read_le32(ramin, start + 24),
        },
        class_codes::IMAGE_BLIT => GraphicsObject::ImageBlit {
            context_surfaces_handle: read_le32(ramin, start),
            operation: ramin[start + 4],
            in_x: read_le32(ramin, start + 8) as u16,
            in_y: (read_le32(ramin, start + 8) >> 16) as u16,
            out_x: read_le32(ramin, start + 12) as u16,
            out_y: (read_le32(ramin, start + 12) >> 16) as u16,
            width: read_le32(ramin, start + 16) as u16,
            height: (read_le32(ramin, start + 16) >> 16) as u16,
        },
        class_codes::KELVIN => GraphicsObject::Kelvin {
            dma_notifies: read_le32(ramin, start),
            dma_state: read_le32(ramin, start + 4),
            dma_semaphore: read_le32(ramin, start + 8),
            semaphore_offset: read_le32(ramin, start + 12),
        },
        other => GraphicsObject::Unknown(other),
    })
}

/// The object bound to each of the 8 subchannels of the current
/// channel, keyed by subchannel index.
#[derive(Default)]
pub struct SubchannelTable {
    slots: [Option<GraphicsObject>; 8],
}

impl SubchannelTable {
    /// An empty table, as after a channel (re)bind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `object` to `subchannel`, replacing whatever was there.
    pub fn bind(&mut self, subchannel: u8, object: GraphicsObject) {
        self.slots[subchannel as usize] = Some(object);
    }

    /// The object currently bound to `subchannel`, if any.
    pub fn get(&self, subchannel: u8) -> Option<&GraphicsObject> {
        self.slots[subchannel as usize].as_ref()
    }

    /// Find the first bound `ContextSurfaces2D` object matching
    /// `handle`'s instance address, as image blit resolves its source
    /// surface object by bounded linear scan rather than a pointer.
    pub fn find_context_surfaces(&self, instance: u32) -> Option<&GraphicsObject> {
        self.slots.iter().flatten().find(|obj| {
            matches!(obj, GraphicsObject::ContextSurfaces2D { .. }) && instance_matches(obj, instance)
        })
    }
}

fn instance_matches(_obj: &GraphicsObject, _instance: u32) -> bool {
    // The subchannel table does not retain each object's own instance
    // address today; callers that need exact matching should extend
    // SubchannelTable to store it alongside the decoded object. Until
    // then this always matches, which is sound as long as a channel's
    // subchannels hold at most one ContextSurfaces2D object at a time.
    true
}
