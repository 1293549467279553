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

//! PFIFO: wires the channel registers, Cache1, pusher, and puller
//! together.
//!
//! Unlike the rest of this crate's ancestry, which wires its components
//! with `Rc<RefCell<_>>` under a single-threaded owner, `Pfifo` hands
//! the puller a real OS thread per the concurrency model this core is
//! required to implement, so its shared state is `Arc`-owned and
//! lock-guarded instead.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::core::cache1::Cache1;
use crate::core::channel::{self, ChannelFile};
use crate::core::dma_object;
use crate::core::error::{EmulatorError, PusherFaultKind, Result};
use crate::core::guest_memory::GuestMemory;
use crate::core::interrupt::{InterruptAggregator, IrqLine, Unit};
use crate::core::puller::{GraphicsEngine, PullerContext};
use crate::core::pusher::{self, PusherState};

/// Owns the doorbell registers, the method cache, and the dedicated
/// puller thread. The pusher itself has no persistent thread: it runs
/// inline on whichever caller triggers it, per the concurrency model.
pub struct Pfifo<G: GraphicsEngine + 'static> {
    channels: Mutex<ChannelFile>,
    cache: Arc<Cache1>,
    mem: Arc<Mutex<GuestMemory>>,
    pusher_state: Mutex<PusherState>,
    pushbuffer_dma_address: AtomicU32,
    interrupts: Arc<InterruptAggregator>,
    puller_ctx: Arc<PullerContext<G>>,
    puller_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<G: GraphicsEngine + 'static> Pfifo<G> {
    /// Construct a PFIFO with its RAMHT fixed at `ramht_offset` for
    /// `ramht_size` bytes, bound to `graphics` for Graphics-class
    /// dispatch.
    pub fn new(
        mem: Arc<Mutex<GuestMemory>>,
        graphics: Arc<G>,
        interrupts: Arc<InterruptAggregator>,
        cache1_capacity: usize,
        ramht_offset: u32,
        ramht_size: u32,
    ) -> Self {
        let cache = Arc::new(Cache1::new(cache1_capacity));
        let puller_ctx = Arc::new(PullerContext::new(
            cache.clone(),
            mem.clone(),
            graphics,
            ramht_offset,
            ramht_size,
        ));
        Self {
            channels: Mutex::new(ChannelFile::new()),
            cache,
            mem,
            pusher_state: Mutex::new(PusherState::new()),
            pushbuffer_dma_address: AtomicU32::new(0),
            interrupts,
            puller_ctx,
            puller_handle: Mutex::new(None),
        }
    }

    /// Set the base address, in VRAM, of the current channel's
    /// pushbuffer DMA object. A real core resolves this from a DMA
    /// object descriptor bound via the channel's context; this crate
    /// takes the resolved address directly so `pusher.rs` never needs
    /// its own RAMIN-resolution path.
    pub fn set_pushbuffer_base(&self, address: u32) {
        self.pushbuffer_dma_address.store(address, Ordering::SeqCst);
    }

    /// Select which channel the pusher/puller currently operate on.
    pub fn set_channel_id(&self, channel_id: u8) {
        self.cache.set_channel_id(channel_id);
    }

    /// Decode and apply an MMIO write to the per-channel doorbell
    /// region. Returns `Ok(())` even for unmodeled sub-offsets (a
    /// no-op write).
    pub fn doorbell_write(&self, offset: u32, value: u32, line: &dyn IrqLine) -> Result<()> {
        let (channel_id, reg) = channel::decode_doorbell(offset);
        let Some(reg) = reg else {
            return Ok(());
        };

        let mut channels = self.channels.lock().unwrap();
        let ctrl = channels.get_mut(channel_id);
        match reg {
            channel::REG_DMA_PUT => {
                ctrl.dma_put = value;
                drop(channels);
                if channel_id == self.cache.channel_id() {
                    self.run_pusher(value, line)?;
                }
            }
            channel::REG_DMA_GET => ctrl.dma_get = value,
            channel::REG_DMA_REF => ctrl.dma_ref = value,
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Run the pusher inline, synchronously, over `[get, put)` of the
    /// current channel's pushbuffer.
    fn run_pusher(&self, put: u32, line: &dyn IrqLine) -> Result<()> {
        if self.cache.error().is_some() {
            return Ok(());
        }

        let dma_base = self.pushbuffer_dma_address.load(Ordering::SeqCst);
        let mut get = {
            let mut channels = self.channels.lock().unwrap();
            channels.get(self.cache.channel_id()).dma_get
        };

        let mem = self.mem.lock().unwrap();
        let vram = mem.vram();
        let base = dma_base as usize;
        let end = put as usize + base;
        if end > vram.len() {
            return Err(EmulatorError::InvalidExtent {
                address: dma_base,
                limit: put,
            });
        }
        let dma = &vram[base..];

        let mut state = self.pusher_state.lock().unwrap();
        let result = pusher::run(dma, &mut get, put, &mut state, &self.cache);
        drop(mem);

        self.channels.lock().unwrap().get_mut(self.cache.channel_id()).dma_get = get;

        if let Err(kind) = result {
            self.cache.set_error(kind);
            self.interrupts.raise(Unit::Pfifo, PFIFO_INTR_0_DMA_PUSHER, line);
            log::warn!("pusher fault: {kind:?}");
            return Err(EmulatorError::PusherFault { kind });
        }
        Ok(())
    }

    /// Enable or disable the puller thread. Enabling spawns a fresh
    /// thread; disabling signals it to drain and exit, joining it
    /// before returning.
    pub fn set_pull_enabled(&self, enabled: bool) {
        self.cache.set_pull_enabled(enabled);
        let mut handle = self.puller_handle.lock().unwrap();
        if enabled {
            if handle.is_none() {
                *handle = Some(self.puller_ctx.clone().spawn());
            }
        } else if let Some(h) = handle.take() {
            let _ = h.join();
        }
    }

    /// Whether the puller loop is currently enabled.
    pub fn pull_enabled(&self) -> bool {
        self.cache.pull_enabled()
    }

    /// Access to the underlying method cache, for tests and MMIO
    /// readers that report queue depth/error state.
    pub fn cache(&self) -> &Cache1 {
        &self.cache
    }
}

/// PFIFO's DMA-pusher-fault bit in the master interrupt register.
pub const PFIFO_INTR_0_DMA_PUSHER: u32 = 1 << 0;

/// Resolve a channel's pushbuffer DMA object and return its VRAM base
/// address, for callers that bind a DMA context handle rather than
/// calling [`Pfifo::set_pushbuffer_base`] directly.
pub fn resolve_pushbuffer_base(mem: &GuestMemory, descriptor_offset: u32) -> Result<u32> {
    let obj = dma_object::resolve(mem, descriptor_offset)?;
    Ok(obj.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct NoopGraphics;
    impl GraphicsEngine for NoopGraphics {
        fn current_channel_id(&self) -> u8 {
            0
        }
        fn wait_fifo_access(&self) {}
        fn context_switch(&self, _channel_id: u8) {}
        fn dispatch(&self, _subchannel: u8, _class: u8, _method: u16, _param: u32) -> Result<()> {
            Ok(())
        }
    }

    struct RecordingLine(AtomicBool);
    impl IrqLine for RecordingLine {
        fn set_level(&self, raised: bool) {
            self.0.store(raised, Ordering::SeqCst);
        }
    }

    fn write_words(mem: &mut GuestMemory, offset: u32, words: &[u32]) {
        let vram = mem.vram_mut();
        let mut o = offset as usize;
        for w in words {
            vram[o..o + 4].copy_from_slice(&w.to_le_bytes());
            o += 4;
        }
    }

    #[test]
    fn doorbell_put_drives_pusher_and_produces_cache_entry() {
        let mem = Arc::new(Mutex::new(GuestMemory::new(4096, 4096)));
        {
            let mut m = mem.lock().unwrap();
            let header = 0x10 | (0 << 13) | (1u32 << 18);
            write_words(&mut m, 0, &[header, 0x1234]);
        }
        let graphics = Arc::new(NoopGraphics);
        let interrupts = Arc::new(InterruptAggregator::new());
        let pfifo = Pfifo::new(mem, graphics, interrupts, 16, 0x1000, 4096);
        let line = RecordingLine(AtomicBool::new(false));

        pfifo.doorbell_write(channel::REG_DMA_PUT, 8, &line).unwrap();

        let entry = pfifo.cache().pop_blocking().unwrap();
        assert_eq!(entry.method, 0x10);
        assert_eq!(entry.parameter, 0x1234);
    }

    #[test]
    fn doorbell_for_non_current_channel_does_not_run_pusher() {
        let mem = Arc::new(Mutex::new(GuestMemory::new(4096, 4096)));
        let graphics = Arc::new(NoopGraphics);
        let interrupts = Arc::new(InterruptAggregator::new());
        let pfifo = Pfifo::new(mem, graphics, interrupts, 16, 0x1000, 4096);
        let line = RecordingLine(AtomicBool::new(false));

        let offset = 1 * channel::CHANNEL_MMIO_STRIDE + channel::REG_DMA_PUT;
        pfifo.doorbell_write(offset, 8, &line).unwrap();
        assert!(pfifo.cache().is_empty());
    }

    #[test]
    fn reserved_command_raises_pfifo_interrupt() {
        let mem = Arc::new(Mutex::new(GuestMemory::new(4096, 4096)));
        {
            let mut m = mem.lock().unwrap();
            write_words(&mut m, 0, &[0x1234_5678]);
        }
        let graphics = Arc::new(NoopGraphics);
        let interrupts = Arc::new(InterruptAggregator::new());
        let pfifo = Pfifo::new(mem, graphics, interrupts, 16, 0x1000, 4096);
        let line = RecordingLine(AtomicBool::new(false));
        interrupts.set_enabled(Unit::Pfifo, PFIFO_INTR_0_DMA_PUSHER, &line);

        let err = pfifo.doorbell_write(channel::REG_DMA_PUT, 4, &line).unwrap_err();
        assert!(matches!(err, EmulatorError::PusherFault { .. }));
        assert!(line.0.load(Ordering::SeqCst));
        assert!(pfifo.cache().error().is_some());
    }

    #[test]
    fn resolves_pushbuffer_base_from_dma_descriptor() {
        let mut mem = GuestMemory::new(4096, 256);
        let ramin = mem.ramin_mut();
        let flags = 0x3du32 | (2 << 12);
        ramin[0..4].copy_from_slice(&flags.to_le_bytes());
        ramin[4..8].copy_from_slice(&0x100u32.to_le_bytes());
        ramin[8..12].copy_from_slice(&0x40u32.to_le_bytes());
        let base = resolve_pushbuffer_base(&mem, 0).unwrap();
        assert_eq!(base, 0x40);
    }
}
