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

//! Error taxonomy for the NV2A core.
//!
//! Guest-bug conditions (a malformed RAMHT entry, an out-of-range DMA
//! descriptor) are modeled as `Err` rather than `panic!`, so they stay
//! testable. Pushbuffer faults are not returned from the pusher's run
//! loop at all — they are recorded on [`crate::core::pusher::PusherState`]
//! and surfaced as an interrupt, matching real hardware behavior.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors produced by the NV2A emulation core.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// A RAMIN offset for a DMA object descriptor was out of range.
    #[error("invalid DMA descriptor at RAMIN offset 0x{offset:08X}")]
    InvalidDescriptor {
        /// Offset that was out of range.
        offset: u32,
    },

    /// A DMA object's `address + limit` does not fit within the backing
    /// memory (VRAM for the in-memory class).
    #[error("DMA object extent out of range: address=0x{address:08X} limit=0x{limit:08X}")]
    InvalidExtent {
        /// Base address of the DMA object.
        address: u32,
        /// Size of the DMA object.
        limit: u32,
    },

    /// A RAMHT lookup found no valid entry for the given handle, or the
    /// entry's channel id did not match the caller's.
    #[error("no valid RAMHT entry for handle 0x{handle:08X}")]
    InvalidHandle {
        /// The handle that failed to resolve.
        handle: u32,
    },

    /// The puller received a method outside every known dispatch range.
    #[error("method 0x{method:04X} on subchannel {subchannel} has no engine binding")]
    InvalidMethod {
        /// Offending method.
        method: u16,
        /// Subchannel the method was issued on.
        subchannel: u8,
    },

    /// An attribute format setter received a guest `count` incompatible
    /// with the format (e.g. `UB_D3D` with `count != 4`).
    #[error("vertex attribute format requires count={expected}, got {actual}")]
    InvalidAttributeFormat {
        /// Count required by the format.
        expected: u8,
        /// Count the guest supplied.
        actual: u8,
    },

    /// An incrementing-method load slot advanced past its backing
    /// array's bound.
    #[error("{field} load slot {slot} exceeds capacity {capacity}")]
    LoadSlotOverflow {
        /// Name of the overflowing array, for diagnostics.
        field: &'static str,
        /// Slot that was about to be written.
        slot: usize,
        /// Capacity of the backing array.
        capacity: usize,
    },

    /// A pushbuffer decode or run-loop fault. Fatal for the owning
    /// channel until the host clears the interrupt and resets the error.
    #[error("pusher fault: {kind:?}")]
    PusherFault {
        /// The specific fault that occurred.
        kind: PusherFaultKind,
    },

    /// The host GPU backend rejected a shader program at compile time.
    #[error("shader compile error: {0}")]
    ShaderCompileError(String),

    /// The host GPU backend rejected a shader program at link time.
    #[error("shader link error: {0}")]
    ShaderLinkError(String),

    /// A host GPU API call failed (texture creation, buffer mapping, …).
    #[error("host GPU error: {0}")]
    HostGpuError(String),

    /// A config file could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reasons the DMA pusher can suspend, per `NV_PFIFO_CACHE1_DMA_STATE_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PusherFaultKind {
    /// A `call` was issued while a subroutine was already active.
    Call,
    /// A `return` was issued with no subroutine active.
    Return,
    /// A pushbuffer word matched none of the known opcode patterns.
    ReservedCmd,
    /// The channel attempted DMA access outside its granted protection.
    Protection,
}
