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

//! Core emulation components: PFIFO command pipeline, PGRAPH method
//! engine, and the host-GPU binding layer.

pub mod cache1;
pub mod channel;
pub mod config;
pub mod device;
pub mod dma_object;
pub mod error;
pub mod guest_memory;
pub mod host;
pub mod interrupt;
pub mod objects;
pub mod pfifo;
pub mod pgraph;
pub mod puller;
pub mod pusher;
pub mod ramht;
