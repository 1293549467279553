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

//! Pusher throughput: how fast `pusher::run` drains a synthetic
//! pushbuffer of incrementing-method commands into Cache1.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nv2a_core::core::cache1::Cache1;
use nv2a_core::core::pusher::{self, PusherState};

fn synthetic_pushbuffer(command_count: u32) -> Vec<u8> {
    let mut words = Vec::with_capacity(command_count as usize * 2);
    for i in 0..command_count {
        // Incrementing method header, method_count = 1, subchannel 0.
        let header = 0x0004_0000 | ((0x100 + (i % 0x1000) * 4) & 0x1FFF);
        words.push(header);
        words.push(i);
    }
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn bench_pusher_drain(c: &mut Criterion) {
    let dma = synthetic_pushbuffer(4096);
    let put = dma.len() as u32;

    c.bench_function("pusher_drain_4096_commands", |b| {
        b.iter(|| {
            let cache = Cache1::new(8192);
            let mut state = PusherState::new();
            let mut get = 0u32;
            pusher::run(black_box(&dma), &mut get, put, &mut state, &cache).unwrap();
            // pull_enabled defaults to false, so this drains without blocking.
            while cache.pop_blocking().is_some() {}
        });
    });
}

criterion_group!(benches, bench_pusher_drain);
criterion_main!(benches);
