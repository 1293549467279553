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

//! PGRAPH's method dispatcher: a single entry point keyed by
//! `(graphics_class << 16) | method`, classifying every method into the
//! side-effect categories the PGRAPH state machine implements.

use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::host::HostGpu;
use crate::core::objects::{class_codes, GraphicsObject};

use super::image_blit;
use super::registers::AttributeFormat;
use super::vertex_program::{MAX_PROGRAM_QUADS, NUM_CONSTANTS};
use super::PGraphState;

/// Named `(class << 16) | method` constants this dispatcher recognizes,
/// confirmed against `original_source/hw/xbox/nv2a.c`'s method table.
pub mod methods {
    pub const NV062_SET_CONTEXT_DMA_IMAGE_SOURCE: u32 = 0x0062_0184;
    pub const NV062_SET_CONTEXT_DMA_IMAGE_DESTIN: u32 = 0x0062_0188;
    pub const NV062_SET_COLOR_FORMAT: u32 = 0x0062_0300;
    pub const NV062_SET_PITCH: u32 = 0x0062_0304;
    pub const NV062_SET_OFFSET_SOURCE: u32 = 0x0062_0308;
    pub const NV062_SET_OFFSET_DESTIN: u32 = 0x0062_030C;

    pub const NV09F_SET_CONTEXT_SURFACES: u32 = 0x009F_019C;
    pub const NV09F_SET_OPERATION: u32 = 0x009F_02FC;
    pub const NV09F_CONTROL_POINT_IN: u32 = 0x009F_0300;
    pub const NV09F_CONTROL_POINT_OUT: u32 = 0x009F_0304;
    pub const NV09F_SIZE: u32 = 0x009F_0308;

    pub const NV097_NO_OPERATION: u32 = 0x0097_0100;
    pub const NV097_WAIT_FOR_IDLE: u32 = 0x0097_0110;
    pub const NV097_FLIP_STALL: u32 = 0x0097_0130;
    pub const NV097_SET_CONTEXT_DMA_COLOR: u32 = 0x0097_0194;
    pub const NV097_SET_SURFACE_CLIP_HORIZONTAL: u32 = 0x0097_0200;
    pub const NV097_SET_SURFACE_CLIP_VERTICAL: u32 = 0x0097_0204;
    pub const NV097_SET_SURFACE_FORMAT: u32 = 0x0097_0208;
    pub const NV097_SET_SURFACE_PITCH: u32 = 0x0097_020C;
    pub const NV097_SET_COMBINER_ALPHA_ICW: u32 = 0x0097_0260;
    pub const NV097_SET_COMBINER_SPECULAR_FOG_CW0: u32 = 0x0097_0288;
    pub const NV097_SET_COMBINER_SPECULAR_FOG_CW1: u32 = 0x0097_028C;
    pub const NV097_SET_COMPOSITE_MATRIX: u32 = 0x0097_0680;
    pub const NV097_SET_VIEWPORT_OFFSET: u32 = 0x0097_0A20;
    pub const NV097_SET_COMBINER_FACTOR0: u32 = 0x0097_0A60;
    pub const NV097_SET_COMBINER_FACTOR1: u32 = 0x0097_0A80;
    pub const NV097_SET_COMBINER_ALPHA_OCW: u32 = 0x0097_0AA0;
    pub const NV097_SET_COMBINER_COLOR_ICW: u32 = 0x0097_0AC0;
    pub const NV097_SET_VIEWPORT_SCALE: u32 = 0x0097_0AF0;
    pub const NV097_SET_TRANSFORM_PROGRAM: u32 = 0x0097_0B00;
    pub const NV097_SET_TRANSFORM_CONSTANT: u32 = 0x0097_0B80;
    pub const NV097_SET_VERTEX4F: u32 = 0x0097_1518;
    pub const NV097_SET_VERTEX_DATA_ARRAY_OFFSET: u32 = 0x0097_1720;
    pub const NV097_SET_VERTEX_DATA_ARRAY_FORMAT: u32 = 0x0097_1760;
    pub const NV097_SET_BEGIN_END: u32 = 0x0097_17FC;
    pub const NV097_ARRAY_ELEMENT16: u32 = 0x0097_1800;
    pub const NV097_ARRAY_ELEMENT32: u32 = 0x0097_1808;
    pub const NV097_DRAW_ARRAYS: u32 = 0x0097_1810;
    pub const NV097_INLINE_ARRAY: u32 = 0x0097_1818;
    pub const NV097_SET_VERTEX_DATA4UB: u32 = 0x0097_1940;
    pub const NV097_SET_TEXTURE_OFFSET: u32 = 0x0097_1B00;
    pub const NV097_SET_TEXTURE_FORMAT: u32 = 0x0097_1B04;
    pub const NV097_SET_TEXTURE_CONTROL0: u32 = 0x0097_1B0C;
    pub const NV097_SET_TEXTURE_CONTROL1: u32 = 0x0097_1B10;
    pub const NV097_SET_TEXTURE_FILTER: u32 = 0x0097_1B14;
    pub const NV097_SET_TEXTURE_IMAGE_RECT: u32 = 0x0097_1B1C;
    pub const NV097_BACK_END_WRITE_SEMAPHORE_RELEASE: u32 = 0x0097_1D70;
    pub const NV097_CLEAR_SURFACE: u32 = 0x0097_1D94;
    pub const NV097_SET_COMBINER_COLOR_OCW: u32 = 0x0097_1E40;
    pub const NV097_SET_COMBINER_CONTROL: u32 = 0x0097_1E60;
    pub const NV097_SET_SHADER_STAGE_PROGRAM: u32 = 0x0097_1E70;
    pub const NV097_SET_SHADER_OTHER_STAGE_INPUT: u32 = 0x0097_1E78;
    pub const NV097_SET_TRANSFORM_PROGRAM_LOAD: u32 = 0x0097_1E9C;
    pub const NV097_SET_TRANSFORM_PROGRAM_START: u32 = 0x0097_1EA0;
    pub const NV097_SET_TRANSFORM_CONSTANT_LOAD: u32 = 0x0097_1EA4;
}

/// Combine a class code and a method offset the way RAMHT-bound objects
/// and the method table both key on.
pub fn combine(class: u8, method: u16) -> u32 {
    ((class as u32) << 16) | method as u32
}

/// Mask bits of `NV097_CLEAR_SURFACE`'s OpenGL-style clear mask
/// parameter.
pub mod clear_bits {
    pub const Z: u32 = 1 << 0;
    pub const STENCIL: u32 = 1 << 1;
    pub const COLOR_R: u32 = 1 << 4;
    pub const COLOR_G: u32 = 1 << 5;
    pub const COLOR_B: u32 = 1 << 6;
    pub const COLOR_A: u32 = 1 << 7;
    pub const COLOR: u32 = COLOR_R | COLOR_G | COLOR_B | COLOR_A;
}

/// If `key` falls in the incrementing-method run `[base, base + step *
/// (count - 1)]` at exactly `step`-sized strides, return its slot index.
fn slot_at(key: u32, base: u32, step: u32, count: usize) -> Option<usize> {
    if key < base {
        return None;
    }
    let offset = key - base;
    if offset % step != 0 {
        return None;
    }
    let slot = (offset / step) as usize;
    (slot < count).then_some(slot)
}

/// Read-modify-write the `ContextSurfaces2D` object bound to
/// `subchannel`, creating a zeroed one first if nothing is bound yet
/// (NV062's setters can arrive before its bind-time object decode, same
/// as any other register write to an as-yet-unconfigured object).
fn with_context_surfaces(
    state: &mut PGraphState,
    subchannel: u8,
    f: impl FnOnce(&mut u32, &mut u32, &mut u8, &mut u16, &mut u16, &mut u32, &mut u32),
) {
    let mut dma_src = 0;
    let mut dma_dst = 0;
    let mut color_format = 0;
    let mut src_pitch = 0;
    let mut dst_pitch = 0;
    let mut src_offset = 0;
    let mut dst_offset = 0;

    if let Some(GraphicsObject::ContextSurfaces2D {
        dma_src: s,
        dma_dst: d,
        color_format: c,
        src_pitch: sp,
        dst_pitch: dp,
        src_offset: so,
        dst_offset: d_o,
    }) = state.objects.get(subchannel).copied()
    {
        dma_src = s;
        dma_dst = d;
        color_format = c;
        src_pitch = sp;
        dst_pitch = dp;
        src_offset = so;
        dst_offset = d_o;
    }

    f(
        &mut dma_src,
        &mut dma_dst,
        &mut color_format,
        &mut src_pitch,
        &mut dst_pitch,
        &mut src_offset,
        &mut dst_offset,
    );

    state.objects.bind(
        subchannel,
        GraphicsObject::ContextSurfaces2D {
            dma_src,
            dma_dst,
            color_format,
            src_pitch,
            dst_pitch,
            src_offset,
            dst_offset,
        },
    );
}

/// Unpack an `0xAARRGGBB`-packed combiner factor into normalized RGBA.
fn unpack_combiner_factor(param: u32) -> [f32; 4] {
    [
        ((param >> 16) & 0xFF) as f32 / 255.0,
        ((param >> 8) & 0xFF) as f32 / 255.0,
        (param & 0xFF) as f32 / 255.0,
        ((param >> 24) & 0xFF) as f32 / 255.0,
    ]
}

/// Dispatch one method. `host` performs the side effects the PGRAPH
/// state alone cannot (surface upload/download, flush, draw issue).
/// `subchannel` is needed to resolve which bound object NV062/NV09F
/// register writes target.
pub fn dispatch(
    state: &mut PGraphState,
    mem: &mut GuestMemory,
    host: &dyn HostGpu,
    subchannel: u8,
    class: u8,
    method: u16,
    param: u32,
) -> Result<()> {
    let key = combine(class, method);

    if let Some(slot) = slot_at(key, methods::NV097_SET_TEXTURE_OFFSET, 64, super::NUM_TEXTURE_SLOTS)
    {
        state.textures[slot].offset = param;
        state.textures[slot].dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_TEXTURE_FORMAT, 64, super::NUM_TEXTURE_SLOTS)
    {
        let tex = &mut state.textures[slot];
        tex.dma_select = (param & 0x3) as u8;
        tex.dimensionality = ((param >> 4) & 0xF) as u8;
        tex.color_format = ((param >> 8) & 0xFF) as u8;
        tex.mipmap_levels = ((param >> 16) & 0xF) as u8;
        tex.log_width = ((param >> 20) & 0xF) as u8;
        tex.log_height = ((param >> 24) & 0xF) as u8;
        tex.dirty = true;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_TEXTURE_CONTROL0, 64, super::NUM_TEXTURE_SLOTS)
    {
        let tex = &mut state.textures[slot];
        tex.enabled = param & (1 << 30) != 0;
        tex.lod_min_clamp = ((param >> 18) & 0xFFF) as u16;
        tex.lod_max_clamp = ((param >> 6) & 0xFFF) as u16;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_TEXTURE_CONTROL1, 64, super::NUM_TEXTURE_SLOTS)
    {
        state.textures[slot].pitch = ((param >> 16) & 0xFFFF) as u16;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_TEXTURE_FILTER, 64, super::NUM_TEXTURE_SLOTS) {
        state.textures[slot].filter_min = ((param >> 16) & 0xFF) as u8;
        state.textures[slot].filter_mag = ((param >> 24) & 0xF) as u8;
        return Ok(());
    }
    if let Some(slot) = slot_at(
        key,
        methods::NV097_SET_TEXTURE_IMAGE_RECT,
        64,
        super::NUM_TEXTURE_SLOTS,
    ) {
        state.textures[slot].rect_width = ((param >> 16) & 0xFFFF) as u16;
        state.textures[slot].rect_height = (param & 0xFFFF) as u16;
        state.textures[slot].dirty = true;
        return Ok(());
    }

    if let Some(slot) = slot_at(
        key,
        methods::NV097_SET_VERTEX_DATA_ARRAY_FORMAT,
        4,
        super::NUM_VERTEX_ATTRIBUTE_SLOTS,
    ) {
        let type_code = param & 0xF;
        let count = ((param >> 4) & 0xF) as u8;
        let stride = ((param >> 8) & 0x00FF_FFFF) as u16;
        let format = match type_code {
            0 => AttributeFormat::UbD3d,
            1 => AttributeFormat::S1,
            2 => AttributeFormat::F,
            3 => AttributeFormat::UbOgl,
            5 => AttributeFormat::S32k,
            6 => AttributeFormat::Cmp,
            other => {
                log::warn!("SET_VERTEX_DATA_ARRAY_FORMAT: unknown type code {other}");
                return Ok(());
            }
        };
        if format == AttributeFormat::UbD3d && count != 4 {
            return Err(EmulatorError::InvalidAttributeFormat {
                expected: 4,
                actual: count,
            });
        }
        let attr = &mut state.vertex_attributes[slot];
        attr.format = format;
        attr.size = format.component_bytes();
        attr.count = count;
        attr.stride = stride;
        attr.needs_conversion = format.needs_conversion();
        attr.converted_elements = 0;
        if attr.needs_conversion {
            attr.converted_count = 3 * count;
        } else {
            attr.converted_buffer.clear();
        }
        return Ok(());
    }
    if let Some(slot) = slot_at(
        key,
        methods::NV097_SET_VERTEX_DATA_ARRAY_OFFSET,
        4,
        super::NUM_VERTEX_ATTRIBUTE_SLOTS,
    ) {
        let attr = &mut state.vertex_attributes[slot];
        attr.dma_select = ((param >> 31) & 1) as u8;
        attr.offset = param & 0x7FFF_FFFF;
        attr.converted_elements = 0;
        return Ok(());
    }
    if let Some(slot) = slot_at(
        key,
        methods::NV097_SET_VERTEX_DATA4UB,
        4,
        super::NUM_VERTEX_ATTRIBUTE_SLOTS,
    ) {
        state.vertex_attributes[slot].inline_value = param;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_VERTEX4F, 4, 4) {
        state.vertex4f_scratch[slot] = f32::from_bits(param);
        if slot == 3 {
            const DIFFUSE_ATTR: usize = 3;
            state.inline_buffer.extend_from_slice(&state.vertex4f_scratch);
            state
                .inline_buffer
                .push(f32::from_bits(state.vertex_attributes[DIFFUSE_ATTR].inline_value));
        }
        return Ok(());
    }

    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_ALPHA_ICW, 4, 8) {
        state.alpha_inputs[slot] = param;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_COLOR_ICW, 4, 8) {
        state.rgb_inputs[slot] = param;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_ALPHA_OCW, 4, 8) {
        state.alpha_outputs[slot] = param;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_COLOR_OCW, 4, 8) {
        state.rgb_outputs[slot] = param;
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_FACTOR0, 4, 8) {
        state.combiner_factors[slot] = unpack_combiner_factor(param);
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMBINER_FACTOR1, 4, 8) {
        state.combiner_factors[slot] = unpack_combiner_factor(param);
        state.shaders_dirty = true;
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_COMPOSITE_MATRIX, 4, 16) {
        state.composite.matrix[slot / 4][slot % 4] = f32::from_bits(param);
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_VIEWPORT_OFFSET, 4, 4) {
        state.constants.set(59, slot, f32::from_bits(param));
        return Ok(());
    }
    if let Some(slot) = slot_at(key, methods::NV097_SET_VIEWPORT_SCALE, 4, 4) {
        state.constants.set(58, slot, f32::from_bits(param));
        return Ok(());
    }

    // SET_TRANSFORM_PROGRAM/_CONSTANT repeat the same method key across
    // many sequential calls; the real hardware ignores any slot implied
    // by the method offset and instead advances an internal cursor, so
    // these two are exact-key matches rather than slot_at ranges.
    if key == methods::NV097_SET_TRANSFORM_PROGRAM {
        state
            .vertex_program
            .push_token(param)
            .map_err(|_| EmulatorError::LoadSlotOverflow {
                field: "vertex_program",
                slot: state.vertex_program.program_load,
                capacity: MAX_PROGRAM_QUADS,
            })?;
        state.shaders_dirty = true;
        return Ok(());
    }
    if key == methods::NV097_SET_TRANSFORM_CONSTANT {
        state
            .constants
            .push_word(f32::from_bits(param))
            .map_err(|_| EmulatorError::LoadSlotOverflow {
                field: "constants",
                slot: state.constants.constant_load_slot,
                capacity: NUM_CONSTANTS * 4,
            })?;
        state.shaders_dirty = true;
        return Ok(());
    }

    match key {
        methods::NV062_SET_CONTEXT_DMA_IMAGE_SOURCE => {
            with_context_surfaces(state, subchannel, |dma_src, _, _, _, _, _, _| {
                *dma_src = param;
            });
            Ok(())
        }

        methods::NV062_SET_CONTEXT_DMA_IMAGE_DESTIN => {
            with_context_surfaces(state, subchannel, |_, dma_dst, _, _, _, _, _| {
                *dma_dst = param;
            });
            Ok(())
        }

        methods::NV062_SET_COLOR_FORMAT => {
            with_context_surfaces(state, subchannel, |_, _, color_format, _, _, _, _| {
                *color_format = param as u8;
            });
            Ok(())
        }

        methods::NV062_SET_PITCH => {
            with_context_surfaces(state, subchannel, |_, _, _, src_pitch, dst_pitch, _, _| {
                *src_pitch = (param & 0xFFFF) as u16;
                *dst_pitch = (param >> 16) as u16;
            });
            Ok(())
        }

        methods::NV062_SET_OFFSET_SOURCE => {
            with_context_surfaces(state, subchannel, |_, _, _, _, _, src_offset, _| {
                *src_offset = param;
            });
            Ok(())
        }

        methods::NV062_SET_OFFSET_DESTIN => {
            with_context_surfaces(state, subchannel, |_, _, _, _, _, _, dst_offset| {
                *dst_offset = param;
            });
            Ok(())
        }

        methods::NV09F_SET_CONTEXT_SURFACES => {
            state.blit_context_surfaces_instance = param;
            Ok(())
        }

        methods::NV09F_SET_OPERATION => {
            state.blit_operation = param as u8;
            Ok(())
        }

        methods::NV09F_CONTROL_POINT_IN => {
            state.blit_in_x = (param & 0xFFFF) as u16;
            state.blit_in_y = (param >> 16) as u16;
            Ok(())
        }

        methods::NV09F_CONTROL_POINT_OUT => {
            state.blit_out_x = (param & 0xFFFF) as u16;
            state.blit_out_y = (param >> 16) as u16;
            Ok(())
        }

        methods::NV09F_SIZE => {
            if state.blit_operation != image_blit::OPERATION_SRCCOPY {
                return Ok(());
            }
            let surfaces = state
                .objects
                .find_context_surfaces(state.blit_context_surfaces_instance)
                .cloned()
                .ok_or(EmulatorError::InvalidDescriptor { offset: param })?;
            image_blit::srccopy(
                mem,
                &surfaces,
                state.blit_in_x,
                state.blit_in_y,
                state.blit_out_x,
                state.blit_out_y,
                (param & 0xFFFF) as u16,
                (param >> 16) as u16,
            )
        }

        methods::NV097_NO_OPERATION => {
            if param != 0 {
                state.notify_pending = true;
            }
            Ok(())
        }

        methods::NV097_WAIT_FOR_IDLE => {
            host.flush();
            host.download_surface(mem, &mut state.color_surface, state.dma_color)
        }

        methods::NV097_FLIP_STALL => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.flip_stall_pending = true;
            Ok(())
        }

        methods::NV097_SET_CONTEXT_DMA_COLOR => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.dma_color = param;
            Ok(())
        }

        methods::NV097_SET_SURFACE_CLIP_HORIZONTAL => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.color_surface.clip_x = (param & 0xFFFF) as u16;
            state.color_surface.clip_width = (param >> 16) as u16;
            Ok(())
        }

        methods::NV097_SET_SURFACE_CLIP_VERTICAL => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.color_surface.clip_y = (param & 0xFFFF) as u16;
            state.color_surface.clip_height = (param >> 16) as u16;
            Ok(())
        }

        methods::NV097_SET_SURFACE_FORMAT => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.color_surface.format = (param & 0xFF) as u8;
            state.color_surface.surface_type = if (param >> 8) & 0xF == 2 {
                super::registers::SurfaceType::Swizzle
            } else {
                super::registers::SurfaceType::Pitch
            };
            state.color_surface.log_width = ((param >> 16) & 0xFF) as u8;
            state.color_surface.log_height = ((param >> 24) & 0xFF) as u8;
            Ok(())
        }

        methods::NV097_SET_SURFACE_PITCH => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            state.color_surface.pitch = (param & 0xFFFF) as u16;
            Ok(())
        }

        methods::NV097_SET_COMBINER_SPECULAR_FOG_CW0 => {
            state.final_inputs[0] = param;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_COMBINER_SPECULAR_FOG_CW1 => {
            state.final_inputs[1] = param;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_BEGIN_END => {
            super::begin_end::dispatch_begin_end(state, mem, host, param as u8)
        }

        methods::NV097_ARRAY_ELEMENT16 => {
            state.inline_elements.push(param & 0xFFFF);
            state.inline_elements.push(param >> 16);
            Ok(())
        }

        methods::NV097_ARRAY_ELEMENT32 => {
            state.inline_elements.push(param);
            Ok(())
        }

        methods::NV097_DRAW_ARRAYS => {
            let start_index = param & 0x00FF_FFFF;
            let count = (param >> 24) & 0xFF;
            super::begin_end::draw_arrays_direct(state, mem, host, start_index, count)
        }

        methods::NV097_INLINE_ARRAY => {
            state.inline_array.push(param);
            Ok(())
        }

        methods::NV097_BACK_END_WRITE_SEMAPHORE_RELEASE => {
            host.download_surface(mem, &mut state.color_surface, state.dma_color)?;
            let offset = state.semaphore_dma + state.semaphore_offset;
            mem.vram_write(offset, &param.to_le_bytes());
            Ok(())
        }

        methods::NV097_CLEAR_SURFACE => {
            if param & clear_bits::COLOR != 0 {
                host.upload_surface(mem, &state.color_surface, state.dma_color)?;
            }
            let scissor = (
                state.color_surface.clip_x,
                state.color_surface.clip_y + state.color_surface.clip_height,
                state.color_surface.clip_x + state.color_surface.clip_width,
                state.color_surface.clip_y,
            );
            host.clear(param, scissor)?;
            state.color_surface.draw_dirty = true;
            Ok(())
        }

        methods::NV097_SET_COMBINER_CONTROL => {
            state.combiner_control = param;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_SHADER_STAGE_PROGRAM => {
            state.shader_stage_program = param;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_SHADER_OTHER_STAGE_INPUT => {
            state.other_stage_input = param;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_TRANSFORM_PROGRAM_LOAD => {
            state
                .vertex_program
                .set_load_cursor(param as usize)
                .map_err(|_| EmulatorError::LoadSlotOverflow {
                    field: "vertex_program",
                    slot: param as usize,
                    capacity: MAX_PROGRAM_QUADS,
                })
        }

        methods::NV097_SET_TRANSFORM_PROGRAM_START => {
            if param as usize >= MAX_PROGRAM_QUADS {
                return Err(EmulatorError::LoadSlotOverflow {
                    field: "vertex_program",
                    slot: param as usize,
                    capacity: MAX_PROGRAM_QUADS,
                });
            }
            state.vertex_program.program_start = param as usize;
            state.shaders_dirty = true;
            Ok(())
        }

        methods::NV097_SET_TRANSFORM_CONSTANT_LOAD => {
            if param as usize >= NUM_CONSTANTS {
                return Err(EmulatorError::LoadSlotOverflow {
                    field: "constants",
                    slot: param as usize,
                    capacity: NUM_CONSTANTS,
                });
            }
            state.constants.constant_load_slot = param as usize * 4;
            Ok(())
        }

        _ if class == class_codes::KELVIN => {
            state.shaders_dirty = true;
            Ok(())
        }

        _ => {
            log::warn!(
                "unhandled PGRAPH method 0x{key:08X} (class=0x{class:02X} method=0x{method:04X} param=0x{param:08X})"
            );
            Ok(())
        }
    }
}
