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

//! Color-surface upload/download and the Morton-order swizzle/deswizzle
//! helper shared with texture binding.

use crate::core::error::{EmulatorError, Result};
use crate::core::pgraph::registers::{SurfaceDescriptor, SurfaceType};

/// Color-surface formats from `NV097_SET_SURFACE_FORMAT_COLOR`.
pub mod color_format {
    pub const R5G6B5: u8 = 0x03;
    pub const X8R8G8B8_Z8R8G8B8: u8 = 0x05;
    pub const A8R8G8B8: u8 = 0x0a;
}

/// Bytes per pixel for a `NV097_SET_SURFACE_FORMAT_COLOR` value.
pub fn bytes_per_pixel(format: u8) -> Result<u32> {
    match format {
        color_format::R5G6B5 => Ok(2),
        color_format::X8R8G8B8_Z8R8G8B8 | color_format::A8R8G8B8 => Ok(4),
        other => Err(EmulatorError::InvalidDescriptor { offset: other as u32 }),
    }
}

/// The wgpu texture format a surface's pixel format maps to.
pub fn wgpu_format(format: u8) -> Result<wgpu::TextureFormat> {
    match format {
        color_format::R5G6B5 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        color_format::X8R8G8B8_Z8R8G8B8 | color_format::A8R8G8B8 => {
            Ok(wgpu::TextureFormat::Bgra8Unorm)
        }
        other => Err(EmulatorError::InvalidDescriptor { offset: other as u32 }),
    }
}

/// Morton (Z-order) bit-interleave of two 16-bit coordinates, the
/// "swizzle" addressing NV2A uses for non-pitch surfaces and textures.
fn morton_interleave(x: u32, y: u32) -> u32 {
    fn spread(mut v: u32) -> u32 {
        v &= 0x0000ffff;
        v = (v | (v << 8)) & 0x00ff00ff;
        v = (v | (v << 4)) & 0x0f0f0f0f;
        v = (v | (v << 2)) & 0x33333333;
        v = (v | (v << 1)) & 0x55555555;
        v
    }
    spread(x) | (spread(y) << 1)
}

/// Unswizzle `width x height` pixels of `bytes_per_pixel` size from
/// Morton-ordered `src` into row-major `dst` at `dst_pitch` stride.
pub fn unswizzle_rect(src: &[u8], width: u32, height: u32, dst: &mut [u8], dst_pitch: u32, bpp: u32) {
    for y in 0..height {
        for x in 0..width {
            let src_index = (morton_interleave(x, y) * bpp) as usize;
            let dst_index = (y * dst_pitch + x * bpp) as usize;
            dst[dst_index..dst_index + bpp as usize]
                .copy_from_slice(&src[src_index..src_index + bpp as usize]);
        }
    }
}

/// Swizzle `width x height` pixels of `bytes_per_pixel` size from
/// row-major `src` (`src_pitch` stride) into Morton-ordered `dst`.
pub fn swizzle_rect(src: &[u8], width: u32, height: u32, dst: &mut [u8], src_pitch: u32, bpp: u32) {
    for y in 0..height {
        for x in 0..width {
            let src_index = (y * src_pitch + x * bpp) as usize;
            let dst_index = (morton_interleave(x, y) * bpp) as usize;
            dst[dst_index..dst_index + bpp as usize]
                .copy_from_slice(&src[src_index..src_index + bpp as usize]);
        }
    }
}

/// Surface pixel dimensions: log2 width/height for a swizzled surface,
/// clip width/height for a pitch surface.
pub fn surface_dimensions(surface: &SurfaceDescriptor) -> (u32, u32) {
    match surface.surface_type {
        SurfaceType::Swizzle => (
            1u32 << surface.log_width,
            1u32 << surface.log_height,
        ),
        SurfaceType::Pitch => (
            surface.clip_width as u32,
            surface.clip_height as u32,
        ),
    }
}
