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

//! Pushbuffer grammar, driven end to end through the doorbell rather
//! than by calling the pusher directly: jump, call/return, increasing
//! and non-increasing method runs, and the fault/interrupt path for a
//! malformed word. The puller thread is never started here, so
//! `Cache1::pop_blocking` drains synchronously.

mod common;

use std::sync::Arc;

use nv2a_core::core::config::NV2AConfig;
use nv2a_core::core::device::Nv2aDevice;
use nv2a_core::core::interrupt::Unit;
use nv2a_core::core::pfifo::PFIFO_INTR_0_DMA_PUSHER;

use common::{RecordingHost, RecordingLine};

fn device() -> Nv2aDevice<Arc<RecordingHost>> {
    let config = NV2AConfig {
        vram_size_bytes: 64 * 1024,
        ramin_size_bytes: 4096,
        cache1_capacity: 64,
        shader_cache_capacity: 64,
        log_unimplemented_methods: true,
    };
    let host = Arc::new(RecordingHost::default());
    let line = Arc::new(RecordingLine::default());
    Nv2aDevice::new(&config, host, line, 0x1000, 4096)
}

fn method_run_header(method: u16, subchannel: u8, count: u16) -> u32 {
    (count as u32) << 18 | (subchannel as u32) << 13 | method as u32
}

fn nonincreasing_header(method: u16, subchannel: u8, count: u16) -> u32 {
    0x4000_0000 | method_run_header(method, subchannel, count)
}

fn write_words(device: &Nv2aDevice<Arc<RecordingHost>>, words: &[u32]) {
    let mut mem = device.mem.lock().unwrap();
    for (i, word) in words.iter().enumerate() {
        mem.vram_write((i * 4) as u32, &word.to_le_bytes());
    }
}

#[test]
fn increasing_method_run_advances_method_by_four_per_word() {
    let device = device();
    write_words(
        &device,
        &[method_run_header(0x100, 2, 3), 0x11, 0x22, 0x33],
    );
    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    device.pfifo.doorbell_write(0x40, 16, &line).unwrap();

    let cache = device.pfifo.cache();
    let e0 = cache.pop_blocking().unwrap();
    let e1 = cache.pop_blocking().unwrap();
    let e2 = cache.pop_blocking().unwrap();
    assert!(cache.pop_blocking().is_none());

    assert_eq!((e0.method, e0.subchannel, e0.parameter), (0x100, 2, 0x11));
    assert_eq!((e1.method, e1.subchannel, e1.parameter), (0x104, 2, 0x22));
    assert_eq!((e2.method, e2.subchannel, e2.parameter), (0x108, 2, 0x33));
}

#[test]
fn nonincreasing_method_run_repeats_the_same_method() {
    let device = device();
    write_words(
        &device,
        &[nonincreasing_header(0x200, 1, 2), 0xAA, 0xBB],
    );
    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    device.pfifo.doorbell_write(0x40, 12, &line).unwrap();

    let cache = device.pfifo.cache();
    let e0 = cache.pop_blocking().unwrap();
    let e1 = cache.pop_blocking().unwrap();
    assert!(cache.pop_blocking().is_none());

    assert_eq!(e0.method, 0x200);
    assert_eq!(e1.method, 0x200);
    assert!(e0.nonincreasing && e1.nonincreasing);
    assert_eq!((e0.parameter, e1.parameter), (0xAA, 0xBB));
}

#[test]
fn old_jump_skips_the_words_between_get_and_the_target() {
    let device = device();
    let mut words = vec![0u32; 6];
    words[0] = 16 | 1; // old jump to byte offset 16
    words[4] = method_run_header(0x100, 0, 1); // at byte offset 16
    words[5] = 0xDEADBEEF; // at byte offset 20
    write_words(&device, &words);

    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    device.pfifo.doorbell_write(0x40, 24, &line).unwrap();

    let entry = device.pfifo.cache().pop_blocking().unwrap();
    assert_eq!(entry.parameter, 0xDEADBEEF);
}

#[test]
fn call_then_return_resumes_at_the_saved_address() {
    let device = device();
    let mut words = vec![0u32; 7];
    words[0] = 16 | 2; // call to byte offset 16, return address = 4
    words[4] = method_run_header(0, 0, 1); // at byte offset 16
    words[5] = 0xCAFEBABE; // at byte offset 20
    words[6] = 0x0002_0000; // return, at byte offset 24
    write_words(&device, &words);

    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    // put = 4: after the return restores get to 4, the loop is done.
    device.pfifo.doorbell_write(0x40, 4, &line).unwrap();

    let entry = device.pfifo.cache().pop_blocking().unwrap();
    assert_eq!(entry.parameter, 0xCAFEBABE);
    assert!(device.pfifo.cache().pop_blocking().is_none());
}

#[test]
fn reserved_command_latches_a_fault_and_raises_the_pfifo_interrupt() {
    let device = device();
    write_words(&device, &[3]); // matches none of the pusher's word patterns

    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    let result = device.pfifo.doorbell_write(0x40, 4, &line);
    assert!(result.is_err());

    assert_ne!(
        device.interrupts.pending(Unit::Pfifo) & PFIFO_INTR_0_DMA_PUSHER,
        0
    );
    assert!(device.pfifo.cache().error().is_some());
}

#[test]
fn latched_error_silently_blocks_further_doorbell_pushes() {
    let device = device();
    write_words(&device, &[3, method_run_header(0x100, 0, 1), 0x42]);

    device.pfifo.set_pushbuffer_base(0);
    let line = RecordingLine::default();
    device.pfifo.doorbell_write(0x40, 4, &line).unwrap_err();

    // A second push past the fault is a no-op: the error is latched
    // until the host clears it.
    device.pfifo.doorbell_write(0x40, 12, &line).unwrap();
    assert!(device.pfifo.cache().pop_blocking().is_none());
}
