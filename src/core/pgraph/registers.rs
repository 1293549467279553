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

//! PGRAPH's register-addressable state: surface descriptors, texture
//! descriptors, vertex-attribute descriptors, and the composite matrix.

/// Surface storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceType {
    #[default]
    Pitch,
    Swizzle,
}

/// Color or zeta surface descriptor.
#[derive(Debug, Clone, Default)]
pub struct SurfaceDescriptor {
    pub draw_dirty: bool,
    pub pitch: u16,
    pub format: u8,
    pub offset: u32,
    pub surface_type: SurfaceType,
    pub clip_x: u16,
    pub clip_y: u16,
    pub clip_width: u16,
    pub clip_height: u16,
    /// log2(width), valid only when `surface_type == Swizzle`.
    pub log_width: u8,
    /// log2(height), valid only when `surface_type == Swizzle`.
    pub log_height: u8,
}

/// One of four texture slots.
#[derive(Debug, Clone, Default)]
pub struct TextureDescriptor {
    pub dirty: bool,
    pub enabled: bool,
    /// 2 selects DMA B, else DMA A; any other value disables dimensionality.
    pub dimensionality: u8,
    pub dma_select: u8,
    pub offset: u32,
    pub color_format: u8,
    pub log_width: u8,
    pub log_height: u8,
    pub mipmap_levels: u8,
    pub rect_width: u16,
    pub rect_height: u16,
    pub pitch: u16,
    pub filter_min: u8,
    pub filter_mag: u8,
    pub lod_min_clamp: u16,
    pub lod_max_clamp: u16,
}

/// Vertex-attribute format codes from the format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeFormat {
    #[default]
    UbD3d,
    UbOgl,
    S1,
    F,
    S32k,
    Cmp,
}

impl AttributeFormat {
    /// Byte size of one component.
    pub fn component_bytes(self) -> u8 {
        match self {
            AttributeFormat::UbD3d | AttributeFormat::UbOgl => 1,
            AttributeFormat::S1 | AttributeFormat::S32k => 2,
            AttributeFormat::F | AttributeFormat::Cmp => 4,
        }
    }

    /// Whether this format requires converted-attribute expansion.
    pub fn needs_conversion(self) -> bool {
        matches!(self, AttributeFormat::Cmp)
    }
}

/// One of 16 vertex-attribute slots.
#[derive(Debug, Clone, Default)]
pub struct VertexAttributeDescriptor {
    pub format: AttributeFormat,
    pub size: u8,
    pub count: u8,
    pub stride: u16,
    pub dma_select: u8,
    pub offset: u32,
    pub inline_value: u32,
    pub needs_conversion: bool,
    pub converted_buffer: Vec<f32>,
    pub converted_count: u8,
    pub converted_elements: u32,
    pub normalize: bool,
}

impl VertexAttributeDescriptor {
    /// Whether the attribute is currently enabled (`count > 0`).
    pub fn is_enabled(&self) -> bool {
        self.count > 0
    }
}

/// The fixed-function composite transform matrix and z-clip range.
#[derive(Debug, Clone, Copy)]
pub struct CompositeState {
    pub matrix: [[f32; 4]; 4],
    pub zclip_min: f32,
    pub zclip_max: f32,
}

impl Default for CompositeState {
    fn default() -> Self {
        let mut matrix = [[0.0; 4]; 4];
        for (i, row) in matrix.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self {
            matrix,
            zclip_min: 0.0,
            zclip_max: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_state_defaults_to_identity() {
        let state = CompositeState::default();
        assert_eq!(state.matrix[0][0], 1.0);
        assert_eq!(state.matrix[1][2], 0.0);
    }

    #[test]
    fn attribute_disabled_when_count_zero() {
        let attr = VertexAttributeDescriptor::default();
        assert!(!attr.is_enabled());
    }

    #[test]
    fn cmp_format_needs_conversion() {
        assert!(AttributeFormat::Cmp.needs_conversion());
        assert!(!AttributeFormat::F.needs_conversion());
    }
}
