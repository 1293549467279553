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

//! The puller: a dedicated thread dispatching Cache1 entries to the
//! bound engine.
//!
//! Spawned when pull access flips 0→1, joined when it flips back. Binds
//! objects on method 0 via RAMHT, resolves handle-bearing parameters in
//! `[0x180, 0x200)`, and otherwise passes methods through to whichever
//! engine the subchannel is bound to.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::cache1::Cache1;
use crate::core::error::{EmulatorError, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::objects;
use crate::core::ramht::{self, Engine};
use std::sync::Mutex;

/// Method range boundaries from the dispatch table in spec section 4.5.
const METHOD_SET_OBJECT: u16 = 0;
const METHOD_PASSTHROUGH_LOW_START: u16 = 0x100;
const METHOD_HANDLE_PARAM_START: u16 = 0x180;
const METHOD_HANDLE_PARAM_END: u16 = 0x200;
const METHOD_PASSTHROUGH_HIGH_END: u16 = 0x2000;

/// Everything the puller needs from the Graphics engine. Kept as a
/// trait so `puller.rs` does not depend on PGRAPH's concrete layout,
/// mirroring the way the pusher does not depend on PGRAPH at all.
pub trait GraphicsEngine: Send + Sync {
    /// The channel id PGRAPH currently considers "current".
    fn current_channel_id(&self) -> u8;

    /// Block until PGRAPH's `fifo_access` flag is true.
    fn wait_fifo_access(&self);

    /// Perform a full context switch to `channel_id`: traps into
    /// PGRAPH, raises the context-switch interrupt, and blocks until
    /// the host clears it and rewrites PGRAPH's context.
    fn context_switch(&self, channel_id: u8);

    /// Dispatch `(class << 16 | method, param)` on the Graphics engine.
    fn dispatch(&self, subchannel: u8, class: u8, method: u16, param: u32) -> Result<()>;
}

/// Per-subchannel object class, needed to route method 0's instance
/// address into the Graphics engine's dispatcher.
#[derive(Debug, Clone, Copy, Default)]
struct SubchannelClass {
    class: Option<u8>,
}

/// Shared puller control: the RAMHT location and RAMIN/backing memory,
/// plus the pull-enabled flag the owning [`crate::core::pfifo::Pfifo`]
/// flips to start/stop the thread.
pub struct PullerContext<G: GraphicsEngine> {
    cache: Arc<Cache1>,
    mem: Arc<Mutex<GuestMemory>>,
    graphics: Arc<G>,
    ramht_offset: u32,
    ramht_size: u32,
    subchannel_classes: Mutex<[SubchannelClass; crate::core::cache1::NUM_SUBCHANNELS]>,
}

impl<G: GraphicsEngine + 'static> PullerContext<G> {
    /// Construct a puller context bound to a fixed RAMHT location.
    pub fn new(
        cache: Arc<Cache1>,
        mem: Arc<Mutex<GuestMemory>>,
        graphics: Arc<G>,
        ramht_offset: u32,
        ramht_size: u32,
    ) -> Self {
        Self {
            cache,
            mem,
            graphics,
            ramht_offset,
            ramht_size,
            subchannel_classes: Mutex::new(Default::default()),
        }
    }

    /// Spawn the puller thread. The thread exits once
    /// [`Cache1::pop_blocking`] returns `None`, i.e. once pull access is
    /// disabled and the queue has drained.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        thread::spawn(move || {
            while let Some(entry) = self.cache.pop_blocking() {
                if let Err(err) = self.handle_entry(entry) {
                    log::warn!("puller: dropping faulted entry: {err}");
                }
            }
            log::info!("puller thread exiting");
        })
    }

    fn handle_entry(&self, entry: crate::core::cache1::CacheEntry) -> Result<()> {
        let channel_id = self.cache.channel_id();

        if entry.method == METHOD_SET_OBJECT {
            return self.bind_object(channel_id, entry.subchannel, entry.parameter);
        }

        if (METHOD_HANDLE_PARAM_START..METHOD_HANDLE_PARAM_END).contains(&entry.method) {
            let resolved = self.resolve_handle_parameter(channel_id, entry.parameter)?;
            return self.dispatch_to_bound_engine(entry.subchannel, entry.method, resolved);
        }

        if (METHOD_PASSTHROUGH_LOW_START..METHOD_HANDLE_PARAM_START).contains(&entry.method)
            || (METHOD_HANDLE_PARAM_END..METHOD_PASSTHROUGH_HIGH_END).contains(&entry.method)
        {
            return self.dispatch_to_bound_engine(entry.subchannel, entry.method, entry.parameter);
        }

        Err(EmulatorError::InvalidMethod {
            method: entry.method,
            subchannel: entry.subchannel,
        })
    }

    fn bind_object(&self, channel_id: u8, subchannel: u8, handle: u32) -> Result<()> {
        let entry = {
            let mem = self.mem.lock().unwrap();
            ramht::lookup(&mem, self.ramht_offset, self.ramht_size, channel_id, handle)?
        };

        if entry.channel_id != self.graphics.current_channel_id() {
            self.graphics.context_switch(entry.channel_id);
        }

        self.cache.bind_engine(subchannel, entry.engine);

        if entry.engine == Engine::Graphics {
            self.graphics.wait_fifo_access();
            let class = {
                let mem = self.mem.lock().unwrap();
                objects::resolve_class(&mem, entry.instance)?
            };
            self.subchannel_classes.lock().unwrap()[subchannel as usize].class = Some(class);
            self.graphics
                .dispatch(subchannel, class, METHOD_SET_OBJECT, entry.instance)?;
        }

        Ok(())
    }

    fn resolve_handle_parameter(&self, channel_id: u8, handle: u32) -> Result<u32> {
        let mem = self.mem.lock().unwrap();
        let entry = ramht::lookup(&mem, self.ramht_offset, self.ramht_size, channel_id, handle)?;
        Ok(entry.instance)
    }

    fn dispatch_to_bound_engine(&self, subchannel: u8, method: u16, param: u32) -> Result<()> {
        match self.cache.bound_engine(subchannel) {
            Some(Engine::Graphics) => {
                self.graphics.wait_fifo_access();
                let class = self.subchannel_classes.lock().unwrap()[subchannel as usize]
                    .class
                    .ok_or(EmulatorError::InvalidMethod { method, subchannel })?;
                self.graphics.dispatch(subchannel, class, method, param)
            }
            Some(_) => Ok(()),
            None => Err(EmulatorError::InvalidMethod { method, subchannel }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache1::CacheEntry;
    use crate::core::ramht::RamhtEntry;
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    struct FakeGraphics {
        current_channel: AtomicU8,
        switched_to: Mutex<Option<u8>>,
        dispatched: Mutex<Vec<(u8, u8, u16, u32)>>,
        fifo_access: AtomicBool,
    }

    impl FakeGraphics {
        fn new() -> Self {
            Self {
                current_channel: AtomicU8::new(0),
                switched_to: Mutex::new(None),
                dispatched: Mutex::new(Vec::new()),
                fifo_access: AtomicBool::new(true),
            }
        }
    }

    impl GraphicsEngine for FakeGraphics {
        fn current_channel_id(&self) -> u8 {
            self.current_channel.load(Ordering::SeqCst)
        }
        fn wait_fifo_access(&self) {
            assert!(self.fifo_access.load(Ordering::SeqCst));
        }
        fn context_switch(&self, channel_id: u8) {
            *self.switched_to.lock().unwrap() = Some(channel_id);
            self.current_channel.store(channel_id, Ordering::SeqCst);
        }
        fn dispatch(&self, subchannel: u8, class: u8, method: u16, param: u32) -> Result<()> {
            self.dispatched
                .lock()
                .unwrap()
                .push((subchannel, class, method, param));
            Ok(())
        }
    }

    fn setup() -> (Arc<Cache1>, Arc<Mutex<GuestMemory>>, Arc<FakeGraphics>) {
        let cache = Arc::new(Cache1::new(16));
        let mem = Arc::new(Mutex::new(GuestMemory::new(4096, 4096)));
        let graphics = Arc::new(FakeGraphics::new());
        (cache, mem, graphics)
    }

    #[test]
    fn set_object_binds_engine_and_dispatches_method_zero() {
        let (cache, mem, graphics) = setup();
        {
            let mut m = mem.lock().unwrap();
            ramht::write_entry(
                &mut m,
                0x1000,
                4096,
                &RamhtEntry {
                    handle: 0xCAFE,
                    instance: 0x142,
                    engine: Engine::Graphics,
                    channel_id: 0,
                    valid: true,
                },
            );
        }
        let ctx = Arc::new(PullerContext::new(
            cache.clone(),
            mem,
            graphics.clone(),
            0x1000,
            4096,
        ));
        ctx.handle_entry(CacheEntry {
            method: 0,
            subchannel: 0,
            nonincreasing: false,
            parameter: 0xCAFE,
        })
        .unwrap();

        assert_eq!(cache.bound_engine(0), Some(Engine::Graphics));
        let dispatched = graphics.dispatched.lock().unwrap();
        assert_eq!(dispatched[0].2, 0);
        assert_eq!(dispatched[0].3, 0x142);
    }

    #[test]
    fn unbound_subchannel_method_is_invalid() {
        let (cache, mem, graphics) = setup();
        let ctx = Arc::new(PullerContext::new(cache, mem, graphics, 0x1000, 4096));
        let err = ctx
            .handle_entry(CacheEntry {
                method: 0x104,
                subchannel: 2,
                nonincreasing: false,
                parameter: 7,
            })
            .unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidMethod { .. }));
    }

    #[test]
    fn cross_channel_bind_triggers_context_switch() {
        let (cache, mem, graphics) = setup();
        {
            let mut m = mem.lock().unwrap();
            ramht::write_entry(
                &mut m,
                0x1000,
                4096,
                &RamhtEntry {
                    handle: 0xBEEF,
                    instance: 0x200,
                    engine: Engine::Graphics,
                    channel_id: 3,
                    valid: true,
                },
            );
        }
        let ctx = Arc::new(PullerContext::new(
            cache.clone(),
            mem,
            graphics.clone(),
            0x1000,
            4096,
        ));
        cache.set_channel_id(3);
        ctx.handle_entry(CacheEntry {
            method: 0,
            subchannel: 0,
            nonincreasing: false,
            parameter: 0xBEEF,
        })
        .unwrap();

        assert_eq!(*graphics.switched_to.lock().unwrap(), Some(3));
    }
}
