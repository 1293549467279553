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

//! Vertex-program token memory and the vertex constant file.

/// Maximum number of instruction quads (4×u32 each) the token memory
/// holds.
pub const MAX_PROGRAM_QUADS: usize = 136;
/// Number of 4-float constant-file slots.
pub const NUM_CONSTANTS: usize = 192;

/// The FINAL bit marking the last instruction quad of a program, per
/// the token layout the translator walks.
const TOKEN_FINAL_BIT: u32 = 1 << 30;

/// Up-to-136-quad instruction memory plus load/start cursors.
#[derive(Debug, Clone)]
pub struct VertexProgramMemory {
    tokens: [[u32; 4]; MAX_PROGRAM_QUADS],
    /// Next write slot.
    pub program_load: usize,
    /// First executed token (set by `SET_TRANSFORM_PROGRAM_START`).
    pub program_start: usize,
    /// Position within the current quad the next [`Self::push_token`]
    /// call writes to.
    next_word: usize,
}

impl Default for VertexProgramMemory {
    fn default() -> Self {
        Self {
            tokens: [[0; 4]; MAX_PROGRAM_QUADS],
            program_load: 0,
            program_start: 0,
            next_word: 0,
        }
    }
}

impl VertexProgramMemory {
    /// Write one token word to the current load slot, then advance it.
    ///
    /// A quad is 4 consecutive words; `word_index` is the position
    /// within the quad (0..4). Returns `Err` if `program_load` would
    /// advance past [`MAX_PROGRAM_QUADS`].
    pub fn load_word(&mut self, word_index: usize, value: u32) -> Result<(), ()> {
        if self.program_load >= MAX_PROGRAM_QUADS {
            return Err(());
        }
        self.tokens[self.program_load][word_index] = value;
        if word_index == 3 {
            self.program_load += 1;
        }
        Ok(())
    }

    /// `SET_TRANSFORM_PROGRAM`'s one-word-per-call push: the method
    /// offset carries no slot information on real hardware (each call
    /// targets whichever word comes next), so this tracks the
    /// within-quad cursor itself rather than taking a word index.
    pub fn push_token(&mut self, value: u32) -> Result<(), ()> {
        let word_index = self.next_word;
        self.load_word(word_index, value)?;
        self.next_word = (word_index + 1) % 4;
        Ok(())
    }

    /// Reposition the load cursor to the start of quad `quad`, as
    /// `SET_TRANSFORM_PROGRAM_LOAD` does. Returns `Err` if `quad` is out
    /// of range.
    pub fn set_load_cursor(&mut self, quad: usize) -> Result<(), ()> {
        if quad >= MAX_PROGRAM_QUADS {
            return Err(());
        }
        self.program_load = quad;
        self.next_word = 0;
        Ok(())
    }

    /// The byte image of the program from `program_start` up to the
    /// first quad with its FINAL bit set (inclusive), or to the end of
    /// memory if none is found.
    pub fn program_bytes_from_start(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for quad in &self.tokens[self.program_start..] {
            for word in quad {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            if quad[0] & TOKEN_FINAL_BIT != 0 {
                break;
            }
        }
        bytes
    }
}

/// The 192-slot constant file, with per-slot dirty tracking and a load
/// cursor mirroring hardware's `constant_load_slot`.
///
/// `constant_load_slot` is word-granular (range `0..NUM_CONSTANTS * 4`),
/// matching `NV097_SET_TRANSFORM_CONSTANT_LOAD`'s units on real
/// hardware: one word is four times a slot.
#[derive(Debug, Clone)]
pub struct ConstantFile {
    values: [[f32; 4]; NUM_CONSTANTS],
    dirty: [bool; NUM_CONSTANTS],
    pub constant_load_slot: usize,
}

impl Default for ConstantFile {
    fn default() -> Self {
        Self {
            values: [[0.0; 4]; NUM_CONSTANTS],
            dirty: [false; NUM_CONSTANTS],
            constant_load_slot: 0,
        }
    }
}

impl ConstantFile {
    /// Write one word at the current load slot and advance it by one
    /// word. Returns `Err` past `NUM_CONSTANTS * 4`.
    pub fn push_word(&mut self, value: f32) -> Result<(), ()> {
        if self.constant_load_slot >= NUM_CONSTANTS * 4 {
            return Err(());
        }
        let slot = self.constant_load_slot / 4;
        let component = self.constant_load_slot % 4;
        self.values[slot][component] = value;
        self.dirty[slot] = true;
        self.constant_load_slot += 1;
        Ok(())
    }

    /// Write a full 4-float constant at the current load slot and
    /// advance it by a whole constant (four words). Returns `Err` past
    /// `NUM_CONSTANTS * 4`.
    pub fn load(&mut self, value: [f32; 4]) -> Result<(), ()> {
        for component in value {
            self.push_word(component)?;
        }
        Ok(())
    }

    /// Directly address slot `index`, component `component` (0..4),
    /// bypassing the load cursor. Used by `SET_VIEWPORT_SCALE`/
    /// `_OFFSET`, which always target fixed constant slots.
    pub fn set(&mut self, index: usize, component: usize, value: f32) {
        self.values[index][component] = value;
        self.dirty[index] = true;
    }

    /// Read constant `i` (`c[i]` in shader source).
    pub fn get(&self, i: usize) -> [f32; 4] {
        self.values[i]
    }

    /// Clear every slot's dirty bit, as after a full constant upload.
    pub fn clear_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_bytes_stop_at_final_bit() {
        let mut mem = VertexProgramMemory::default();
        mem.load_word(0, 1).unwrap();
        mem.load_word(1, 2).unwrap();
        mem.load_word(2, 3).unwrap();
        mem.load_word(3, TOKEN_FINAL_BIT).unwrap();
        mem.load_word(0, 0xFFFF_FFFF).unwrap();
        mem.load_word(1, 0).unwrap();
        mem.load_word(2, 0).unwrap();
        mem.load_word(3, 0).unwrap();

        let bytes = mem.program_bytes_from_start();
        assert_eq!(bytes.len(), 16, "must stop at the FINAL quad");
    }

    #[test]
    fn load_word_overflow_is_an_error() {
        let mut mem = VertexProgramMemory {
            program_load: MAX_PROGRAM_QUADS,
            ..Default::default()
        };
        assert!(mem.load_word(0, 1).is_err());
    }

    #[test]
    fn constant_load_advances_slot_and_marks_dirty() {
        let mut cf = ConstantFile::default();
        cf.load([1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(cf.constant_load_slot, 4);
        assert_eq!(cf.get(0), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn constant_load_overflow_is_an_error() {
        let mut cf = ConstantFile {
            constant_load_slot: NUM_CONSTANTS * 4,
            ..Default::default()
        };
        assert!(cf.load([0.0; 4]).is_err());
    }

    #[test]
    fn push_word_writes_single_component_and_advances_by_one() {
        let mut cf = ConstantFile::default();
        cf.push_word(9.0).unwrap();
        cf.push_word(8.0).unwrap();
        assert_eq!(cf.constant_load_slot, 2);
        assert_eq!(cf.get(0), [9.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn set_addresses_a_slot_directly_without_moving_the_cursor() {
        let mut cf = ConstantFile::default();
        cf.set(58, 2, 42.0);
        assert_eq!(cf.constant_load_slot, 0);
        assert_eq!(cf.get(58), [0.0, 0.0, 42.0, 0.0]);
    }

    #[test]
    fn push_token_wraps_within_a_quad_and_advances_program_load() {
        let mut mem = VertexProgramMemory::default();
        for word in [1, 2, 3, 4] {
            mem.push_token(word).unwrap();
        }
        assert_eq!(mem.program_load, 1);
        mem.push_token(5).unwrap();
        assert_eq!(mem.program_bytes_from_start()[0..4], 1u32.to_le_bytes());
    }

    #[test]
    fn set_load_cursor_rejects_out_of_range_quads() {
        let mut mem = VertexProgramMemory::default();
        assert!(mem.set_load_cursor(MAX_PROGRAM_QUADS).is_err());
        assert!(mem.set_load_cursor(MAX_PROGRAM_QUADS - 1).is_ok());
    }
}
