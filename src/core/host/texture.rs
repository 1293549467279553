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

//! Texture upload: the `NV097_SET_TEXTURE_FORMAT` color-format table,
//! linear vs. swizzled/mipmapped addressing, and DXT1/3/5 passthrough.
//!
//! # Examples
//!
//! ```no_run
//! use nv2a_core::core::host::texture::{ColorFormatInfo, lookup_format};
//!
//! let info = lookup_format(0x05).unwrap(); // SZ_R5G6B5
//! assert_eq!(info.bytes_per_pixel, 2);
//! ```

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::host::surface;
use crate::core::pgraph::registers::TextureDescriptor;

pub mod color_format {
    pub const SZ_A1R5G5B5: u8 = 0x02;
    pub const SZ_X1R5G5B5: u8 = 0x03;
    pub const SZ_A4R4G4B4: u8 = 0x04;
    pub const SZ_R5G6B5: u8 = 0x05;
    pub const SZ_A8R8G8B8: u8 = 0x06;
    pub const SZ_X8R8G8B8: u8 = 0x07;
    pub const L_DXT1_A1R5G5B5: u8 = 0x0c;
    pub const L_DXT23_A8R8G8B8: u8 = 0x0e;
    pub const L_DXT45_A8R8G8B8: u8 = 0x0f;
    pub const LU_IMAGE_R5G6B5: u8 = 0x11;
    pub const LU_IMAGE_A8R8G8B8: u8 = 0x12;
    pub const LU_IMAGE_X8R8G8B8: u8 = 0x1e;
}

/// Per-format decode info: byte size (compressed formats: bytes per
/// 4x4 block), whether the format is linear (`LU_IMAGE_*`, no swizzle
/// or mipmap chain), and the wgpu format it maps to.
#[derive(Debug, Clone, Copy)]
pub struct ColorFormatInfo {
    pub bytes_per_pixel: u32,
    pub linear: bool,
    pub compressed: bool,
    pub wgpu_format: wgpu::TextureFormat,
}

/// Resolve a `NV097_SET_TEXTURE_FORMAT` color code to its decode info.
pub fn lookup_format(format: u8) -> Result<ColorFormatInfo> {
    use color_format::*;
    let info = match format {
        SZ_A1R5G5B5 | SZ_X1R5G5B5 | SZ_A4R4G4B4 => ColorFormatInfo {
            bytes_per_pixel: 2,
            linear: false,
            compressed: false,
            wgpu_format: wgpu::TextureFormat::Bgra8Unorm,
        },
        SZ_R5G6B5 => ColorFormatInfo {
            bytes_per_pixel: 2,
            linear: false,
            compressed: false,
            wgpu_format: wgpu::TextureFormat::Rgba8Unorm,
        },
        SZ_A8R8G8B8 | SZ_X8R8G8B8 => ColorFormatInfo {
            bytes_per_pixel: 4,
            linear: false,
            compressed: false,
            wgpu_format: wgpu::TextureFormat::Bgra8Unorm,
        },
        L_DXT1_A1R5G5B5 => ColorFormatInfo {
            bytes_per_pixel: 8,
            linear: false,
            compressed: true,
            wgpu_format: wgpu::TextureFormat::Bc1RgbaUnorm,
        },
        L_DXT23_A8R8G8B8 => ColorFormatInfo {
            bytes_per_pixel: 16,
            linear: false,
            compressed: true,
            wgpu_format: wgpu::TextureFormat::Bc2RgbaUnorm,
        },
        L_DXT45_A8R8G8B8 => ColorFormatInfo {
            bytes_per_pixel: 16,
            linear: false,
            compressed: true,
            wgpu_format: wgpu::TextureFormat::Bc3RgbaUnorm,
        },
        LU_IMAGE_R5G6B5 => ColorFormatInfo {
            bytes_per_pixel: 2,
            linear: true,
            compressed: false,
            wgpu_format: wgpu::TextureFormat::Rgba8Unorm,
        },
        LU_IMAGE_A8R8G8B8 | LU_IMAGE_X8R8G8B8 => ColorFormatInfo {
            bytes_per_pixel: 4,
            linear: true,
            compressed: false,
            wgpu_format: wgpu::TextureFormat::Bgra8Unorm,
        },
        other => {
            return Err(EmulatorError::InvalidDescriptor { offset: other as u32 });
        }
    };
    Ok(info)
}

/// Gather a texture's raw bytes from guest memory into a tightly packed
/// RGBA8/BGRA8/BC-block buffer ready for `queue.write_texture`.
///
/// Linear (`LU_IMAGE_*`) textures are uploaded row-by-row at
/// `desc.pitch` stride exactly as stored; everything else (including
/// DXT-compressed formats, whose 4x4 blocks the hardware already lays
/// out linearly within a swizzled addressing space) is deswizzled via
/// [`surface::unswizzle_rect`] first.
///
/// # Returns
///
/// `(packed_bytes, width, height)`.
pub fn gather_texture_bytes(
    mem: &GuestMemory,
    desc: &TextureDescriptor,
) -> Result<(Vec<u8>, u32, u32)> {
    let info = lookup_format(desc.color_format)?;
    let width = 1u32 << desc.log_width;
    let height = 1u32 << desc.log_height;

    let vram = mem.vram();
    let start = desc.offset as usize;
    let row_bytes = (width * info.bytes_per_pixel) as usize;
    let total = row_bytes * height as usize;
    let end = start + total;
    if end > vram.len() {
        return Err(EmulatorError::InvalidExtent {
            address: desc.offset,
            limit: total as u32,
        });
    }

    if info.linear {
        let pitch = desc.pitch as usize;
        let mut packed = vec![0u8; total];
        for row in 0..height as usize {
            let src = start + row * pitch;
            let dst = row * row_bytes;
            packed[dst..dst + row_bytes].copy_from_slice(&vram[src..src + row_bytes]);
        }
        Ok((packed, width, height))
    } else {
        let mut packed = vec![0u8; total];
        surface::unswizzle_rect(
            &vram[start..end],
            width,
            height,
            &mut packed,
            row_bytes as u32,
            info.bytes_per_pixel,
        );
        Ok((packed, width, height))
    }
}
