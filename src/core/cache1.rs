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

//! Cache1: the bounded FIFO of decoded method entries between the
//! pusher and the puller.
//!
//! Two locks: `pull_lock` guards `pull_enabled`/`bound_engines`/
//! `last_engine`, while `cache_lock` plus `cache_cond` guards the queue
//! itself and signals not-empty. A second condvar, `not_full`, provides
//! the high-watermark stall controlled by
//! [`crate::core::config::NV2AConfig::cache1_capacity`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::core::error::PusherFaultKind;
use crate::core::ramht::Engine;

/// Number of subchannels per channel.
pub const NUM_SUBCHANNELS: usize = 8;

/// One decoded pushbuffer command, queued between pusher and puller.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    /// 14-bit method number.
    pub method: u16,
    /// 3-bit subchannel index.
    pub subchannel: u8,
    /// Whether this entry belongs to a non-incrementing method run.
    pub nonincreasing: bool,
    /// The 32-bit parameter word.
    pub parameter: u32,
}

struct QueueState {
    queue: VecDeque<CacheEntry>,
    capacity: usize,
    error: Option<PusherFaultKind>,
}

struct PullState {
    pull_enabled: bool,
    bound_engines: [Option<Engine>; NUM_SUBCHANNELS],
    last_engine: Option<Engine>,
}

/// The method cache queue plus its pull-side bookkeeping.
pub struct Cache1 {
    channel_id: Mutex<u8>,
    queue_state: Mutex<QueueState>,
    cache_cond: Condvar,
    not_full: Condvar,
    pull_state: Mutex<PullState>,
}

impl Cache1 {
    /// Create a new, empty Cache1 with the given high-watermark capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            channel_id: Mutex::new(0),
            queue_state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                capacity,
                error: None,
            }),
            cache_cond: Condvar::new(),
            not_full: Condvar::new(),
            pull_state: Mutex::new(PullState {
                pull_enabled: false,
                bound_engines: [None; NUM_SUBCHANNELS],
                last_engine: None,
            }),
        }
    }

    /// The channel id the pusher and puller currently operate on.
    pub fn channel_id(&self) -> u8 {
        *self.channel_id.lock().unwrap()
    }

    /// Set the channel id Cache1 operates on.
    pub fn set_channel_id(&self, channel_id: u8) {
        *self.channel_id.lock().unwrap() = channel_id;
    }

    /// Enqueue `entry`, blocking while the queue is at its high-water
    /// mark. Returns immediately if an error is already latched (the
    /// pusher's caller is expected to check [`Cache1::error`] first).
    pub fn push_blocking(&self, entry: CacheEntry) {
        let mut state = self.queue_state.lock().unwrap();
        while state.queue.len() >= state.capacity {
            state = self.not_full.wait(state).unwrap();
        }
        state.queue.push_back(entry);
        self.cache_cond.notify_one();
    }

    /// Dequeue one entry, blocking while the queue is empty and pulling
    /// is still enabled. Returns `None` once pulling has been disabled
    /// and the queue has drained -- the signal for the puller thread to
    /// exit.
    pub fn pop_blocking(&self) -> Option<CacheEntry> {
        let mut state = self.queue_state.lock().unwrap();
        loop {
            if let Some(entry) = state.queue.pop_front() {
                self.not_full.notify_one();
                return Some(entry);
            }
            if !self.pull_enabled() {
                return None;
            }
            state = self.cache_cond.wait(state).unwrap();
        }
    }

    /// Latch a pusher fault. Does not clear the queue.
    pub fn set_error(&self, kind: PusherFaultKind) {
        self.queue_state.lock().unwrap().error = Some(kind);
    }

    /// The currently latched pusher fault, if any.
    pub fn error(&self) -> Option<PusherFaultKind> {
        self.queue_state.lock().unwrap().error
    }

    /// Clear a latched pusher fault (the host does this after servicing
    /// the interrupt).
    pub fn clear_error(&self) {
        self.queue_state.lock().unwrap().error = None;
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.queue_state.lock().unwrap().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the puller loop should keep running.
    pub fn pull_enabled(&self) -> bool {
        self.pull_state.lock().unwrap().pull_enabled
    }

    /// Enable pulling, waking anything waiting on queue state.
    pub fn set_pull_enabled(&self, enabled: bool) {
        self.pull_state.lock().unwrap().pull_enabled = enabled;
        // Taking queue_state here is unnecessary for correctness (the
        // condvar is only ever paired with queue_state's mutex through
        // `wait`), but notify_all must happen after the flag is visible.
        let _ = self.queue_state.lock().unwrap();
        self.cache_cond.notify_all();
    }

    /// The engine currently bound to `subchannel`, if any.
    pub fn bound_engine(&self, subchannel: u8) -> Option<Engine> {
        self.pull_state.lock().unwrap().bound_engines[subchannel as usize]
    }

    /// Record `subchannel`'s bound engine and update "last engine".
    pub fn bind_engine(&self, subchannel: u8, engine: Engine) {
        let mut state = self.pull_state.lock().unwrap();
        state.bound_engines[subchannel as usize] = Some(engine);
        state.last_engine = Some(engine);
    }

    /// The most recently bound engine across all subchannels.
    pub fn last_engine(&self) -> Option<Engine> {
        self.pull_state.lock().unwrap().last_engine
    }
}
