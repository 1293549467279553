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

//! `NV09F_SIZE` SRCCOPY: a CPU-side memcpy rectangle between two
//! context-surfaces-2D regions in guest VRAM.

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::objects::GraphicsObject;

/// SRCCOPY operation code, the only one this core implements.
pub const OPERATION_SRCCOPY: u8 = 0x3;

/// Color format codes `ContextSurfaces2D::color_format` can hold that
/// this blit understands.
pub mod color_format {
    pub const Y8: u8 = 0x01;
    pub const A8R8G8B8: u8 = 0x0a;
}

fn bytes_per_pixel(color_format: u8) -> Result<u32> {
    match color_format {
        color_format::Y8 => Ok(1),
        color_format::A8R8G8B8 => Ok(4),
        other => Err(EmulatorError::InvalidDescriptor { offset: other as u32 }),
    }
}

/// Run one SRCCOPY blit: `width × height` pixels from `(in_x, in_y)` in
/// the source surface to `(out_x, out_y)` in the destination surface,
/// row by row, at each surface's own pitch and bytes-per-pixel.
pub fn srccopy(
    mem: &mut GuestMemory,
    surfaces: &GraphicsObject,
    in_x: u16,
    in_y: u16,
    out_x: u16,
    out_y: u16,
    width: u16,
    height: u16,
) -> Result<()> {
    let GraphicsObject::ContextSurfaces2D {
        color_format,
        src_pitch,
        dst_pitch,
        src_offset,
        dst_offset,
        ..
    } = *surfaces
    else {
        return Err(EmulatorError::InvalidDescriptor { offset: 0 });
    };

    let bpp = bytes_per_pixel(color_format)?;
    let row_bytes = width as u32 * bpp;

    for row in 0..height as u32 {
        let src_row_start =
            src_offset + (in_y as u32 + row) * src_pitch as u32 + in_x as u32 * bpp;
        let dst_row_start =
            dst_offset + (out_y as u32 + row) * dst_pitch as u32 + out_x as u32 * bpp;

        let src_end = src_row_start + row_bytes;
        let dst_end = dst_row_start + row_bytes;
        if src_end as usize > mem.vram_size() as usize || dst_end as usize > mem.vram_size() as usize
        {
            return Err(EmulatorError::InvalidExtent {
                address: src_row_start.max(dst_row_start),
                limit: row_bytes,
            });
        }

        let mut scratch = vec![0u8; row_bytes as usize];
        scratch.copy_from_slice(&mem.vram()[src_row_start as usize..src_end as usize]);
        mem.vram_write(dst_row_start, &scratch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surfaces(color_format: u8, pitch: u16) -> GraphicsObject {
        GraphicsObject::ContextSurfaces2D {
            dma_src: 0,
            dma_dst: 0,
            color_format,
            src_pitch: pitch,
            dst_pitch: pitch,
            src_offset: 0,
            dst_offset: 1024,
        }
    }

    #[test]
    fn copies_a8r8g8b8_rectangle_row_by_row() {
        let mut mem = GuestMemory::new(8192, 64);
        for i in 0..16u32 {
            mem.vram_write(i * 4, &i.to_le_bytes());
        }
        let surf = surfaces(color_format::A8R8G8B8, 16);
        srccopy(&mut mem, &surf, 0, 0, 0, 0, 4, 2).unwrap();

        assert_eq!(&mem.vram()[1024..1028], &0u32.to_le_bytes());
        assert_eq!(&mem.vram()[1024 + 16..1024 + 20], &4u32.to_le_bytes());
    }

    #[test]
    fn unknown_color_format_is_rejected() {
        let mut mem = GuestMemory::new(4096, 64);
        let surf = surfaces(0xFF, 16);
        assert!(srccopy(&mut mem, &surf, 0, 0, 0, 0, 1, 1).is_err());
    }

    #[test]
    fn out_of_range_rectangle_is_an_error() {
        let mut mem = GuestMemory::new(64, 64);
        let surf = surfaces(color_format::Y8, 16);
        assert!(srccopy(&mut mem, &surf, 0, 0, 0, 0, 100, 100).is_err());
    }
}
