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

//! Interrupt aggregation across PFIFO, PGRAPH, and any other unit that
//! exposes a pending/enabled register pair.
//!
//! Each unit contributes one bit to the master pending register iff its
//! own `(pending & enabled) != 0`. The IRQ line is driven high iff
//! `(master_pending & master_enabled) != 0`, and must be re-evaluated on
//! every write that clears pending bits or changes an enabled mask.

use std::sync::Mutex;

/// One interrupt-aggregator unit slot.
#[derive(Debug, Clone, Copy, Default)]
struct UnitMask {
    pending: u32,
    enabled: u32,
}

/// Identifies a unit contributing to the master interrupt register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// PFIFO (pusher faults, cache-related conditions).
    Pfifo,
    /// PGRAPH (notify, context switch, and other graphics traps).
    Pgraph,
}

const NUM_UNITS: usize = 2;

fn unit_index(unit: Unit) -> usize {
    match unit {
        Unit::Pfifo => 0,
        Unit::Pgraph => 1,
    }
}

/// Receives IRQ line level changes driven by the aggregator.
pub trait IrqLine: Send + Sync {
    /// Called with `true` to raise the line, `false` to lower it.
    /// Implementations must not call back into the aggregator.
    fn set_level(&self, raised: bool);
}

struct State {
    units: [UnitMask; NUM_UNITS],
    line_raised: bool,
}

/// Aggregates per-unit pending/enabled masks into a single IRQ line.
pub struct InterruptAggregator {
    state: Mutex<State>,
}

impl InterruptAggregator {
    /// Construct an aggregator with every unit's masks cleared.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                units: [UnitMask::default(); NUM_UNITS],
                line_raised: false,
            }),
        }
    }

    /// OR `bits` into `unit`'s pending mask, then re-evaluate the line.
    pub fn raise(&self, unit: Unit, bits: u32, line: &dyn IrqLine) {
        let mut state = self.state.lock().unwrap();
        state.units[unit_index(unit)].pending |= bits;
        Self::reevaluate(&mut state, line);
    }

    /// Clear `bits` from `unit`'s pending mask (write-1-to-clear), then
    /// re-evaluate the line.
    pub fn clear(&self, unit: Unit, bits: u32, line: &dyn IrqLine) {
        let mut state = self.state.lock().unwrap();
        state.units[unit_index(unit)].pending &= !bits;
        Self::reevaluate(&mut state, line);
    }

    /// Replace `unit`'s enabled mask, then re-evaluate the line.
    pub fn set_enabled(&self, unit: Unit, mask: u32, line: &dyn IrqLine) {
        let mut state = self.state.lock().unwrap();
        state.units[unit_index(unit)].enabled = mask;
        Self::reevaluate(&mut state, line);
    }

    /// Current pending bits for `unit`.
    pub fn pending(&self, unit: Unit) -> u32 {
        self.state.lock().unwrap().units[unit_index(unit)].pending
    }

    fn reevaluate(state: &mut State, line: &dyn IrqLine) {
        let active = state
            .units
            .iter()
            .any(|u| (u.pending & u.enabled) != 0);
        if active != state.line_raised {
            state.line_raised = active;
            // Dropping the aggregator's own lock before calling out would
            // require restructuring around a callback queue; the line
            // implementation must not reenter this aggregator.
            line.set_level(active);
        }
    }
}

impl Default for InterruptAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingLine {
        level: AtomicBool,
    }
    impl RecordingLine {
        fn new() -> Self {
            Self {
                level: AtomicBool::new(false),
            }
        }
    }
    impl IrqLine for RecordingLine {
        fn set_level(&self, raised: bool) {
            self.level.store(raised, Ordering::SeqCst);
        }
    }

    #[test]
    fn line_stays_low_until_enabled_and_pending_overlap() {
        let agg = InterruptAggregator::new();
        let line = RecordingLine::new();

        agg.raise(Unit::Pfifo, 0x1, &line);
        assert!(!line.level.load(Ordering::SeqCst));

        agg.set_enabled(Unit::Pfifo, 0x1, &line);
        assert!(line.level.load(Ordering::SeqCst));
    }

    #[test]
    fn clearing_pending_lowers_the_line() {
        let agg = InterruptAggregator::new();
        let line = RecordingLine::new();
        agg.set_enabled(Unit::Pgraph, 0xFF, &line);
        agg.raise(Unit::Pgraph, 0x10, &line);
        assert!(line.level.load(Ordering::SeqCst));

        agg.clear(Unit::Pgraph, 0x10, &line);
        assert!(!line.level.load(Ordering::SeqCst));
    }

    #[test]
    fn line_stays_high_while_any_unit_has_pending() {
        let agg = InterruptAggregator::new();
        let line = RecordingLine::new();
        agg.set_enabled(Unit::Pfifo, 0xFF, &line);
        agg.set_enabled(Unit::Pgraph, 0xFF, &line);
        agg.raise(Unit::Pfifo, 0x1, &line);
        agg.raise(Unit::Pgraph, 0x1, &line);

        agg.clear(Unit::Pfifo, 0x1, &line);
        assert!(line.level.load(Ordering::SeqCst), "pgraph still pending");

        agg.clear(Unit::Pgraph, 0x1, &line);
        assert!(!line.level.load(Ordering::SeqCst));
    }
}
