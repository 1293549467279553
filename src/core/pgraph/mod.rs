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

//! PGRAPH: the 3D drawing engine state machine.
//!
//! [`PGraphState`] is the plain-data register file and cache; [`PGraph`]
//! wraps it in the locking and interrupt plumbing the rest of the core
//! drives it through, and implements [`crate::core::puller::GraphicsEngine`]
//! so a [`crate::core::pfifo::Pfifo`] can dispatch methods into it.

pub mod begin_end;
pub mod combiner;
pub mod convert;
pub mod dispatch;
pub mod image_blit;
pub mod registers;
pub mod shader_bind;
pub mod shader_cache;
pub mod shader_state;
pub mod vertex_program;

use std::sync::{Arc, Condvar, Mutex};

use crate::core::error::Result;
use crate::core::guest_memory::GuestMemory;
use crate::core::host::HostGpu;
use crate::core::interrupt::{InterruptAggregator, IrqLine, Unit};
use crate::core::objects::{self, SubchannelTable};
use crate::core::puller::GraphicsEngine;

use registers::{CompositeState, SurfaceDescriptor, TextureDescriptor, VertexAttributeDescriptor};
use shader_cache::ShaderCache;
use vertex_program::{ConstantFile, VertexProgramMemory};

/// `PGRAPH_INTR_0` context-switch-trap bit.
pub const PGRAPH_INTR_CONTEXT_SWITCH: u32 = 1 << 0;
/// `PGRAPH_INTR_0` notify-trap bit.
pub const PGRAPH_INTR_NOTIFY: u32 = 1 << 1;

/// Number of texture slots.
pub const NUM_TEXTURE_SLOTS: usize = 4;
/// Number of vertex-attribute slots.
pub const NUM_VERTEX_ATTRIBUTE_SLOTS: usize = 16;
/// Number of register-combiner factor pairs.
pub const NUM_COMBINER_FACTORS: usize = 9;

/// The plain-data PGRAPH register file, surface/texture/vertex-attribute
/// descriptors, shader fingerprint state and cache, and draw-issue
/// bookkeeping. Every field named in spec section 3's "PGRAPH state"
/// bullet lives here.
pub struct PGraphState {
    pub objects: SubchannelTable,
    pub current_channel_id: u8,
    pub trapped_channel_id: Option<u8>,
    pub fifo_access: bool,
    pub context_switch_interrupt: bool,
    pub notify_pending: bool,
    pub notify_interrupt: bool,
    pub flip_stall_pending: bool,

    pub dma_color: u32,
    pub color_surface: SurfaceDescriptor,
    pub textures: [TextureDescriptor; NUM_TEXTURE_SLOTS],
    pub vertex_attributes: [VertexAttributeDescriptor; NUM_VERTEX_ATTRIBUTE_SLOTS],
    pub composite: CompositeState,

    pub blit_operation: u8,
    pub blit_context_surfaces_instance: u32,
    pub blit_in_x: u16,
    pub blit_in_y: u16,
    pub blit_out_x: u16,
    pub blit_out_y: u16,

    pub semaphore_dma: u32,
    pub semaphore_offset: u32,

    pub shaders_dirty: bool,
    pub combiner_control: u32,
    pub shader_stage_program: u32,
    pub other_stage_input: u32,
    pub final_inputs: [u32; 2],
    pub rgb_inputs: [u32; 8],
    pub rgb_outputs: [u32; 8],
    pub alpha_inputs: [u32; 8],
    pub alpha_outputs: [u32; 8],
    pub rect_tex: [bool; 4],
    pub combiner_factors: [[f32; 4]; NUM_COMBINER_FACTORS],
    pub vertex_program_enabled: bool,
    pub vertex_program: VertexProgramMemory,
    pub constants: ConstantFile,
    pub shader_cache: ShaderCache<u64>,

    pub primitive_mode: Option<u8>,
    pub inline_buffer: Vec<f32>,
    pub inline_array: Vec<u32>,
    pub inline_elements: Vec<u32>,
    /// Accumulates the position components of `NV097_SET_VERTEX4F`'s
    /// four-word run before they're pushed into `inline_buffer` as one
    /// record alongside the diffuse color.
    pub vertex4f_scratch: [f32; 4],
}

impl PGraphState {
    /// A freshly reset PGRAPH state, as after a device reset.
    pub fn new() -> Self {
        Self::with_shader_cache_capacity(4096)
    }

    /// Same as [`PGraphState::new`] but with an explicit shader-cache
    /// bound, for callers wiring up [`crate::core::config::NV2AConfig`].
    pub fn with_shader_cache_capacity(shader_cache_capacity: usize) -> Self {
        Self {
            objects: SubchannelTable::new(),
            current_channel_id: 0,
            trapped_channel_id: None,
            fifo_access: true,
            context_switch_interrupt: false,
            notify_pending: false,
            notify_interrupt: false,
            flip_stall_pending: false,
            dma_color: 0,
            color_surface: SurfaceDescriptor::default(),
            textures: Default::default(),
            vertex_attributes: Default::default(),
            composite: CompositeState::default(),
            blit_operation: 0,
            blit_context_surfaces_instance: 0,
            blit_in_x: 0,
            blit_in_y: 0,
            blit_out_x: 0,
            blit_out_y: 0,
            semaphore_dma: 0,
            semaphore_offset: 0,
            shaders_dirty: true,
            combiner_control: 0,
            shader_stage_program: 0,
            other_stage_input: 0,
            final_inputs: [0; 2],
            rgb_inputs: [0; 8],
            rgb_outputs: [0; 8],
            alpha_inputs: [0; 8],
            alpha_outputs: [0; 8],
            rect_tex: [false; 4],
            combiner_factors: [[0.0; 4]; NUM_COMBINER_FACTORS],
            vertex_program_enabled: false,
            vertex_program: VertexProgramMemory::default(),
            constants: ConstantFile::default(),
            shader_cache: ShaderCache::new(shader_cache_capacity),
            primitive_mode: None,
            inline_buffer: Vec::new(),
            inline_array: Vec::new(),
            inline_elements: Vec::new(),
            vertex4f_scratch: [0.0; 4],
        }
    }
}

impl Default for PGraphState {
    fn default() -> Self {
        Self::new()
    }
}

/// A small counting-semaphore substitute for `read_3d`/flip-stall: the
/// CRTC path posts it once per vblank, the PGRAPH thread waits on it
/// during `NV097_FLIP_STALL`. No dependency in this crate's stack
/// provides a counting semaphore, so it's a small `Condvar`-backed
/// wrapper instead.
#[derive(Default)]
struct FlipSemaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl FlipSemaphore {
    fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cond.notify_one();
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.cond.wait(count).unwrap();
        }
        *count -= 1;
    }
}

/// PGRAPH, locked: the register file plus the interrupt and fifo-access
/// condition variables the puller and host thread coordinate through.
pub struct PGraph<H: HostGpu> {
    state: Mutex<PGraphState>,
    interrupt_cond: Condvar,
    fifo_access_cond: Condvar,
    flip_semaphore: FlipSemaphore,
    host: H,
    mem: Arc<Mutex<GuestMemory>>,
    interrupts: Arc<InterruptAggregator>,
    line: Arc<dyn IrqLine>,
}

impl<H: HostGpu> PGraph<H> {
    /// Construct PGRAPH bound to `host`, `mem`, and the shared interrupt
    /// aggregator/line the rest of the device uses.
    pub fn new(
        host: H,
        mem: Arc<Mutex<GuestMemory>>,
        interrupts: Arc<InterruptAggregator>,
        line: Arc<dyn IrqLine>,
        shader_cache_capacity: usize,
    ) -> Self {
        Self {
            state: Mutex::new(PGraphState::with_shader_cache_capacity(shader_cache_capacity)),
            interrupt_cond: Condvar::new(),
            fifo_access_cond: Condvar::new(),
            flip_semaphore: FlipSemaphore::default(),
            host,
            mem,
            interrupts,
            line,
        }
    }

    /// Flip `fifo_access`, waking the puller if it was blocked waiting
    /// for it to become true.
    pub fn set_fifo_access(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.fifo_access = enabled;
        drop(state);
        self.fifo_access_cond.notify_all();
    }

    /// The host's acknowledgement of a context-switch trap: writes the
    /// new channel's context (here: just the channel id) and clears the
    /// interrupt, waking the blocked puller thread.
    pub fn clear_context_switch_interrupt(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(channel_id) = state.trapped_channel_id.take() {
            state.current_channel_id = channel_id;
        }
        state.context_switch_interrupt = false;
        self.interrupts
            .clear(Unit::Pgraph, PGRAPH_INTR_CONTEXT_SWITCH, self.line.as_ref());
        drop(state);
        self.interrupt_cond.notify_all();
    }

    /// The host's acknowledgement of a notify trap.
    pub fn clear_notify_interrupt(&self) {
        let mut state = self.state.lock().unwrap();
        state.notify_interrupt = false;
        self.interrupts
            .clear(Unit::Pgraph, PGRAPH_INTR_NOTIFY, self.line.as_ref());
        drop(state);
        self.interrupt_cond.notify_all();
    }

    /// The CRTC path posts this once per vblank to unblock a pending
    /// `FLIP_STALL`.
    pub fn post_flip(&self) {
        self.flip_semaphore.post();
    }

    /// Borrow the locked state for tests and integration harnesses.
    #[cfg(test)]
    pub fn with_state<R>(&self, f: impl FnOnce(&mut PGraphState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

impl<H: HostGpu> GraphicsEngine for PGraph<H> {
    fn current_channel_id(&self) -> u8 {
        self.state.lock().unwrap().current_channel_id
    }

    fn wait_fifo_access(&self) {
        let state = self.state.lock().unwrap();
        let _state = self
            .fifo_access_cond
            .wait_while(state, |s| !s.fifo_access)
            .unwrap();
    }

    fn context_switch(&self, channel_id: u8) {
        let mut state = self.state.lock().unwrap();
        state.trapped_channel_id = Some(channel_id);
        state.context_switch_interrupt = true;
        self.interrupts
            .raise(Unit::Pgraph, PGRAPH_INTR_CONTEXT_SWITCH, self.line.as_ref());
        let _state = self
            .interrupt_cond
            .wait_while(state, |s| s.context_switch_interrupt)
            .unwrap();
    }

    fn dispatch(&self, subchannel: u8, class: u8, method: u16, param: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut mem = self.mem.lock().unwrap();

        if method == 0 {
            let obj = objects::decode(&mem, class, param)?;
            state.objects.bind(subchannel, obj);
            return Ok(());
        }

        dispatch::dispatch(
            &mut state, &mut mem, &self.host, subchannel, class, method, param,
        )?;

        let should_notify = state.notify_pending;
        if should_notify {
            state.notify_pending = false;
            state.notify_interrupt = true;
            drop(mem);
            self.interrupts
                .raise(Unit::Pgraph, PGRAPH_INTR_NOTIFY, self.line.as_ref());
            state = self
                .interrupt_cond
                .wait_while(state, |s| s.notify_interrupt)
                .unwrap();
        } else {
            drop(mem);
        }

        if state.flip_stall_pending {
            state.flip_stall_pending = false;
            drop(state);
            self.flip_semaphore.wait();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guest_memory::GuestMemory;
    use crate::core::host::test_support::NullHost;
    use crate::core::interrupt::InterruptAggregator;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingLine(AtomicBool);
    impl IrqLine for RecordingLine {
        fn set_level(&self, raised: bool) {
            self.0.store(raised, Ordering::SeqCst);
        }
    }

    fn make_pgraph() -> PGraph<NullHost> {
        PGraph::new(
            NullHost::default(),
            Arc::new(Mutex::new(GuestMemory::new(4096, 4096))),
            Arc::new(InterruptAggregator::new()),
            Arc::new(RecordingLine(AtomicBool::new(false))),
            16,
        )
    }

    #[test]
    fn current_channel_id_starts_at_zero() {
        let pgraph = make_pgraph();
        assert_eq!(pgraph.current_channel_id(), 0);
    }

    #[test]
    fn context_switch_blocks_until_cleared() {
        let pgraph = Arc::new(make_pgraph());
        let worker = {
            let pgraph = pgraph.clone();
            std::thread::spawn(move || pgraph.context_switch(2))
        };

        // Give the worker a chance to block, then clear it.
        std::thread::sleep(std::time::Duration::from_millis(20));
        pgraph.clear_context_switch_interrupt();
        worker.join().unwrap();

        assert_eq!(pgraph.current_channel_id(), 2);
    }

    #[test]
    fn wait_fifo_access_returns_immediately_when_enabled() {
        let pgraph = make_pgraph();
        pgraph.wait_fifo_access();
    }

    #[test]
    fn dispatch_binds_object_on_method_zero() {
        let pgraph = make_pgraph();
        {
            let mem = pgraph.mem.lock().unwrap();
            let _ = mem.ramin();
        }
        pgraph.dispatch(0, crate::core::objects::class_codes::KELVIN, 0, 0).unwrap();
        pgraph.with_state(|s| {
            assert!(s.objects.get(0).is_some());
        });
    }
}
