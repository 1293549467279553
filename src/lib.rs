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

//! nv2a-core: emulation core for the NV2A 3D engine
//!
//! This crate implements the command pipeline (PFIFO), the 3D method
//! engine (PGRAPH), and the host-GPU binding layer that together make up
//! the NV2A emulation core. It does not own MMIO register fan-out for
//! peripheral units, PCI enumeration, or guest memory ownership beyond
//! the VRAM/RAMIN window; those are supplied by the embedder through the
//! interfaces in [`core::host`] and [`core::interrupt`].
//!
//! # Architecture
//!
//! - [`core::pfifo`]: DMA pusher + puller + Cache1, channel control
//! - [`core::pgraph`]: the 3D method dispatcher and drawing state machine
//! - [`core::host`]: binds PGRAPH state to a concrete GPU backend (wgpu)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nv2a_core::core::config::NV2AConfig;
//! use nv2a_core::core::device::Nv2aDevice;
//! use nv2a_core::core::host::WgpuHost;
//! use nv2a_core::core::interrupt::IrqLine;
//!
//! struct NoopLine;
//! impl IrqLine for NoopLine {
//!     fn set_level(&self, _raised: bool) {}
//! }
//!
//! # fn example(host: WgpuHost) {
//! let config = NV2AConfig::default();
//! let device = Nv2aDevice::new(&config, host, Arc::new(NoopLine), 0x1000, 0x10000);
//! device.pfifo.set_pull_enabled(true);
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`], an alias
//! for `Result<T, EmulatorError>`.

pub mod core;

pub use core::error::{EmulatorError, Result};
