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

//! Vertex-attribute pointer binding: translates one of the sixteen
//! descriptor slots into a `wgpu::VertexAttribute` plus the byte range
//! of guest memory it reads from.

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::pgraph::registers::{AttributeFormat, VertexAttributeDescriptor};

/// The wgpu vertex format an attribute slot's `(format, count)` maps to.
pub fn wgpu_vertex_format(format: AttributeFormat, count: u8) -> Option<wgpu::VertexFormat> {
    use AttributeFormat::*;
    match (format, count) {
        (F, 1) => Some(wgpu::VertexFormat::Float32),
        (F, 2) => Some(wgpu::VertexFormat::Float32x2),
        (F, 3) => Some(wgpu::VertexFormat::Float32x3),
        (F, 4) => Some(wgpu::VertexFormat::Float32x4),
        (S1, 2) => Some(wgpu::VertexFormat::Sint16x2),
        (S1, 4) => Some(wgpu::VertexFormat::Sint16x4),
        (S32k, 2) => Some(wgpu::VertexFormat::Sint16x2),
        (S32k, 4) => Some(wgpu::VertexFormat::Sint16x4),
        (UbD3d, 4) | (UbOgl, 4) => Some(wgpu::VertexFormat::Unorm8x4),
        // Cmp is expanded to three f32 by `pgraph::convert` before it
        // ever reaches the host, so it never binds directly.
        _ => None,
    }
}

/// Borrow the raw vertex stream bytes a non-inline attribute reads from,
/// for attributes bound directly against guest memory (`stride > 0`,
/// no conversion pending).
pub fn attribute_bytes<'a>(
    mem: &'a GuestMemory,
    desc: &VertexAttributeDescriptor,
    vertex_count: u32,
) -> Result<&'a [u8]> {
    let start = desc.offset as usize;
    let stride = desc.stride.max(desc.size as u16 * desc.count as u16) as usize;
    let end = start + stride * vertex_count as usize;
    if end > mem.vram_size() as usize {
        return Err(EmulatorError::InvalidExtent {
            address: desc.offset,
            limit: (end - start) as u32,
        });
    }
    Ok(&mem.vram()[start..end])
}
