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

//! `Nv2aDevice`: wires guest memory, PFIFO, PGRAPH, and the interrupt
//! aggregator into the one object an embedder constructs.

use std::sync::{Arc, Mutex};

use crate::core::config::NV2AConfig;
use crate::core::guest_memory::GuestMemory;
use crate::core::host::HostGpu;
use crate::core::interrupt::{InterruptAggregator, IrqLine};
use crate::core::pfifo::Pfifo;
use crate::core::pgraph::PGraph;

/// A fully wired NV2A core: guest memory, PFIFO's command pipeline, and
/// PGRAPH's method engine, sharing one interrupt aggregator and IRQ
/// line.
pub struct Nv2aDevice<H: HostGpu + 'static> {
    pub mem: Arc<Mutex<GuestMemory>>,
    pub pgraph: Arc<PGraph<H>>,
    pub pfifo: Pfifo<PGraph<H>>,
    pub interrupts: Arc<InterruptAggregator>,
}

impl<H: HostGpu + 'static> Nv2aDevice<H> {
    /// Construct a device from `config`, bound to `host` for all GPU
    /// side effects and `line` for IRQ delivery.
    ///
    /// `ramht_offset`/`ramht_size` locate RAMHT within RAMIN; a real
    /// embedder resolves these from PFIFO's `RAMHT` base/size config
    /// registers (outside this crate's scope per spec section 1) and
    /// passes the resolved values here.
    pub fn new(
        config: &NV2AConfig,
        host: H,
        line: Arc<dyn IrqLine>,
        ramht_offset: u32,
        ramht_size: u32,
    ) -> Self {
        let mem = Arc::new(Mutex::new(GuestMemory::new(
            config.vram_size_bytes,
            config.ramin_size_bytes,
        )));
        let interrupts = Arc::new(InterruptAggregator::new());
        let pgraph = Arc::new(PGraph::new(
            host,
            mem.clone(),
            interrupts.clone(),
            line,
            config.shader_cache_capacity,
        ));
        let pfifo = Pfifo::new(
            mem.clone(),
            pgraph.clone(),
            interrupts.clone(),
            config.cache1_capacity,
            ramht_offset,
            ramht_size,
        );

        Self {
            mem,
            pgraph,
            pfifo,
            interrupts,
        }
    }
}
