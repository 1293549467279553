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

//! Converted-attribute expansion for vertex-attribute formats the host
//! cannot bind directly (currently just `CMP`).
//!
//! Runs whenever an attribute has `needs_conversion = true`: grows the
//! attribute's converted buffer on demand and fills in every element
//! from `converted_elements` up to `num_elements`.

use super::registers::VertexAttributeDescriptor;

/// Expand a packed `CMP` word (11/11/10-bit signed-normalized fields)
/// into three floats in `[-1.0, 1.0]`.
pub fn expand_cmp(word: u32) -> [f32; 3] {
    let x = sign_extend(word & 0x7FF, 11);
    let y = sign_extend((word >> 11) & 0x7FF, 11);
    let z = sign_extend((word >> 22) & 0x3FF, 10);
    [
        normalize(x, 11),
        normalize(y, 11),
        normalize(z, 10),
    ]
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn normalize(value: i32, bits: u32) -> f32 {
    let max = (1i32 << (bits - 1)) - 1;
    (value as f32 / max as f32).clamp(-1.0, 1.0)
}

/// Grow `attr.converted_buffer` to cover `num_elements` and fill the
/// newly uncovered elements by reading `stride`-spaced 32-bit words
/// from `source`, starting at `attr.offset + converted_elements *
/// stride`.
///
/// `source` stands in for the guest-memory or inline-array region the
/// attribute's DMA selector resolves to; callers pass the already
/// resolved byte slice.
pub fn grow_and_convert(attr: &mut VertexAttributeDescriptor, source: &[u8], num_elements: u32) {
    if num_elements <= attr.converted_elements {
        return;
    }
    let needed = num_elements as usize * 3;
    if attr.converted_buffer.len() < needed {
        attr.converted_buffer.resize(needed, 0.0);
    }

    let stride = attr.stride.max(4) as usize;
    for i in attr.converted_elements..num_elements {
        let base = attr.offset as usize + i as usize * stride;
        if base + 4 > source.len() {
            break;
        }
        let word = u32::from_le_bytes([
            source[base],
            source[base + 1],
            source[base + 2],
            source[base + 3],
        ]);
        let [x, y, z] = expand_cmp(word);
        let out = i as usize * 3;
        attr.converted_buffer[out] = x;
        attr.converted_buffer[out + 1] = y;
        attr.converted_buffer[out + 2] = z;
    }
    attr.converted_elements = num_elements;
}
