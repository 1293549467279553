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

//! `SET_BEGIN_END` primitive state machine and draw issue.

use crate::core::error::Result;
use crate::core::guest_memory::GuestMemory;
use crate::core::host::HostGpu;

use super::convert;
use super::PGraphState;

/// `END`, the primitive code that triggers a draw instead of starting
/// one.
pub const PRIMITIVE_END: u8 = 0;
/// Highest valid primitive code (`POLYGON`).
pub const PRIMITIVE_MAX: u8 = 10;

/// Dispatch `SET_BEGIN_END`'s `code` parameter.
pub fn dispatch_begin_end(
    state: &mut PGraphState,
    mem: &mut GuestMemory,
    host: &dyn HostGpu,
    code: u8,
) -> Result<()> {
    if code == PRIMITIVE_END {
        end_primitive(state, mem, host)
    } else if code <= PRIMITIVE_MAX {
        start_primitive(state, mem, host, code)
    } else {
        log::warn!("SET_BEGIN_END: out-of-range primitive code {code}");
        Ok(())
    }
}

fn start_primitive(
    state: &mut PGraphState,
    mem: &mut GuestMemory,
    host: &dyn HostGpu,
    code: u8,
) -> Result<()> {
    if mem.test_and_clear_dirty(
        state.dma_color + state.color_surface.offset,
        state.color_surface.pitch as u32 * surface_height(state),
    ) {
        host.upload_surface(mem, &state.color_surface, state.dma_color)?;
    }

    if state.shaders_dirty {
        super::shader_bind::bind_shader(state, host)?;
    }
    for slot in 0..state.textures.len() {
        if state.textures[slot].enabled && state.textures[slot].dirty {
            host.bind_texture(mem, slot, &mut state.textures[slot], state.dma_color)?;
        }
    }
    for slot in 0..state.vertex_attributes.len() {
        if state.vertex_attributes[slot].is_enabled()
            && !state.vertex_attributes[slot].needs_conversion
        {
            host.bind_vertex_attribute(mem, slot, &state.vertex_attributes[slot], state.dma_color)?;
        }
    }

    state.primitive_mode = Some(code);
    state.inline_buffer.clear();
    state.inline_array.clear();
    state.inline_elements.clear();
    Ok(())
}

fn surface_height(state: &PGraphState) -> u32 {
    1u32 << state.color_surface.log_height
}

fn end_primitive(state: &mut PGraphState, mem: &mut GuestMemory, host: &dyn HostGpu) -> Result<()> {
    state.primitive_mode = None;

    if !state.inline_buffer.is_empty() {
        draw_inline_buffer(state, host)?;
    } else if !state.inline_array.is_empty() {
        draw_inline_array(state, mem, host)?;
    } else if !state.inline_elements.is_empty() {
        draw_inline_elements(state, mem, host)?;
    }

    state.color_surface.draw_dirty = true;
    Ok(())
}

/// `SET_VERTEX4F` tightly-packed `{pos[4], diffuse}` records: position
/// as 4 floats, diffuse as 4 BGRA-normalized bytes.
fn draw_inline_buffer(state: &mut PGraphState, host: &dyn HostGpu) -> Result<()> {
    const RECORD_FLOATS: usize = 5;
    let count = state.inline_buffer.len() / RECORD_FLOATS;
    host.draw_arrays(0, count as u32)
}

/// `INLINE_ARRAY`: a flat word stream, sliced into fixed-size vertex
/// records according to the currently enabled attributes.
fn draw_inline_array(state: &mut PGraphState, mem: &GuestMemory, host: &dyn HostGpu) -> Result<()> {
    let per_vertex_bytes: u32 = state
        .vertex_attributes
        .iter()
        .filter(|a| a.is_enabled())
        .map(|a| a.size as u32 * a.count as u32)
        .sum();
    if per_vertex_bytes == 0 {
        return Ok(());
    }

    let array_bytes = (state.inline_array.len() * 4) as u32;
    let index_count = array_bytes / per_vertex_bytes;

    let source: Vec<u8> = state
        .inline_array
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();
    for attr in state.vertex_attributes.iter_mut() {
        if attr.needs_conversion {
            convert::grow_and_convert(attr, &source, index_count);
        }
    }
    let _ = mem;

    host.draw_arrays(0, index_count)
}

/// `ARRAY_ELEMENT16` / `ARRAY_ELEMENT32`: an explicit index list; draw
/// indexed after growing converted attributes up to `max_index + 1`.
fn draw_inline_elements(state: &mut PGraphState, mem: &GuestMemory, host: &dyn HostGpu) -> Result<()> {
    let max_index = state.inline_elements.iter().copied().max().unwrap_or(0);
    let num_elements = max_index + 1;

    for attr in state.vertex_attributes.iter_mut() {
        if attr.needs_conversion {
            convert::grow_and_convert(attr, mem.vram(), num_elements);
        }
    }

    host.draw_indexed(&state.inline_elements)
}

/// `DRAW_ARRAYS` (not begin/end-bracketed): `count + 1` vertices
/// starting at `start_index`.
pub fn draw_arrays_direct(
    state: &mut PGraphState,
    mem: &GuestMemory,
    host: &dyn HostGpu,
    start_index: u32,
    count: u32,
) -> Result<()> {
    let needed = start_index + count + 1;
    for attr in state.vertex_attributes.iter_mut() {
        if attr.needs_conversion {
            convert::grow_and_convert(attr, mem.vram(), needed);
        }
    }
    host.draw_arrays(start_index, count + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::test_support::NullHost;

    #[test]
    fn end_with_no_inline_data_still_marks_draw_dirty() {
        let mut state = PGraphState::new();
        let mut mem = GuestMemory::new(4096, 256);
        let host = NullHost::default();
        dispatch_begin_end(&mut state, &mut mem, &host, PRIMITIVE_END).unwrap();
        assert!(state.color_surface.draw_dirty);
        assert!(host.draws().is_empty());
    }

    #[test]
    fn end_with_inline_array_draws_computed_index_count() {
        let mut state = PGraphState::new();
        state.vertex_attributes[0].count = 3;
        state.vertex_attributes[0].size = 4;
        state.inline_array = vec![0u32; 12]; // 48 bytes / 12-byte vertex = 4 vertices
        let mut mem = GuestMemory::new(4096, 256);
        let host = NullHost::default();
        dispatch_begin_end(&mut state, &mut mem, &host, PRIMITIVE_END).unwrap();
        assert_eq!(host.draws(), vec![(0, 4)]);
    }

    #[test]
    fn draw_arrays_direct_draws_count_plus_one() {
        let state = &mut PGraphState::new();
        let mem = GuestMemory::new(4096, 256);
        let host = NullHost::default();
        draw_arrays_direct(state, &mem, &host, 10, 5).unwrap();
        assert_eq!(host.draws(), vec![(10, 6)]);
    }

    #[test]
    fn start_primitive_sets_mode_and_clears_inline_buffers() {
        let mut state = PGraphState::new();
        state.inline_array.push(1);
        let mut mem = GuestMemory::new(4096, 256);
        let host = NullHost::default();
        dispatch_begin_end(&mut state, &mut mem, &host, 4).unwrap();
        assert_eq!(state.primitive_mode, Some(4));
        assert!(state.inline_array.is_empty());
    }
}
