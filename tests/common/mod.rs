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

//! Shared end-to-end test scaffolding: a recording [`HostGpu`] and an
//! IRQ line, standing in for a real wgpu backend and platform interrupt
//! controller.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nv2a_core::core::error::Result;
use nv2a_core::core::guest_memory::GuestMemory;
use nv2a_core::core::host::HostGpu;
use nv2a_core::core::interrupt::IrqLine;
use nv2a_core::core::pgraph::registers::{
    CompositeState, SurfaceDescriptor, TextureDescriptor, VertexAttributeDescriptor,
};
use nv2a_core::core::pgraph::vertex_program::ConstantFile;

/// A [`HostGpu`] that records call counts instead of touching a real
/// device, for end-to-end tests that drive [`nv2a_core::core::device::Nv2aDevice`]
/// through its public API.
#[derive(Default)]
pub struct RecordingHost {
    pub uploads: AtomicUsize,
    pub downloads: AtomicUsize,
    pub compiles: AtomicUsize,
    pub binds: AtomicUsize,
    pub draws: AtomicUsize,
    next_handle: AtomicU64,
    bound: Mutex<Option<u64>>,
}

impl HostGpu for RecordingHost {
    fn upload_surface(
        &self,
        _mem: &mut GuestMemory,
        _surface: &SurfaceDescriptor,
        _dma_base: u32,
    ) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn download_surface(
        &self,
        _mem: &mut GuestMemory,
        surface: &mut SurfaceDescriptor,
        _dma_base: u32,
    ) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        surface.draw_dirty = false;
        Ok(())
    }

    fn bind_texture(
        &self,
        _mem: &GuestMemory,
        _slot: usize,
        desc: &mut TextureDescriptor,
        _dma_base: u32,
    ) -> Result<()> {
        desc.dirty = false;
        Ok(())
    }

    fn bind_vertex_attribute(
        &self,
        _mem: &GuestMemory,
        _slot: usize,
        _desc: &VertexAttributeDescriptor,
        _dma_base: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn compile_program(&self, _vertex_source: &str, _fragment_source: &str) -> Result<u64> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn bind_program(&self, handle: u64) {
        self.binds.fetch_add(1, Ordering::SeqCst);
        *self.bound.lock().unwrap() = Some(handle);
    }

    fn delete_program(&self, _handle: u64) {}

    fn draw_arrays(&self, _start: u32, _count: u32) -> Result<()> {
        self.draws.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn draw_indexed(&self, _indices: &[u32]) -> Result<()> {
        self.draws.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, _mask: u32, _scissor: (u16, u16, u16, u16)) -> Result<()> {
        Ok(())
    }

    fn flush(&self) {}

    fn upload_shader_uniforms(
        &self,
        _combiner_factors: &[[f32; 4]; 9],
        _composite: &CompositeState,
        _constants: &ConstantFile,
        _clip_range: (f32, f32),
    ) -> Result<()> {
        Ok(())
    }
}

/// Lets a test keep an `Arc<RecordingHost>` for assertions while handing
/// [`nv2a_core::core::device::Nv2aDevice`] its own clone to own.
impl HostGpu for Arc<RecordingHost> {
    fn upload_surface(
        &self,
        mem: &mut GuestMemory,
        surface: &SurfaceDescriptor,
        dma_base: u32,
    ) -> Result<()> {
        (**self).upload_surface(mem, surface, dma_base)
    }

    fn download_surface(
        &self,
        mem: &mut GuestMemory,
        surface: &mut SurfaceDescriptor,
        dma_base: u32,
    ) -> Result<()> {
        (**self).download_surface(mem, surface, dma_base)
    }

    fn bind_texture(
        &self,
        mem: &GuestMemory,
        slot: usize,
        desc: &mut TextureDescriptor,
        dma_base: u32,
    ) -> Result<()> {
        (**self).bind_texture(mem, slot, desc, dma_base)
    }

    fn bind_vertex_attribute(
        &self,
        mem: &GuestMemory,
        slot: usize,
        desc: &VertexAttributeDescriptor,
        dma_base: u32,
    ) -> Result<()> {
        (**self).bind_vertex_attribute(mem, slot, desc, dma_base)
    }

    fn compile_program(&self, vertex_source: &str, fragment_source: &str) -> Result<u64> {
        (**self).compile_program(vertex_source, fragment_source)
    }

    fn bind_program(&self, handle: u64) {
        (**self).bind_program(handle)
    }

    fn delete_program(&self, handle: u64) {
        (**self).delete_program(handle)
    }

    fn draw_arrays(&self, start: u32, count: u32) -> Result<()> {
        (**self).draw_arrays(start, count)
    }

    fn draw_indexed(&self, indices: &[u32]) -> Result<()> {
        (**self).draw_indexed(indices)
    }

    fn clear(&self, mask: u32, scissor: (u16, u16, u16, u16)) -> Result<()> {
        (**self).clear(mask, scissor)
    }

    fn flush(&self) {
        (**self).flush()
    }

    fn upload_shader_uniforms(
        &self,
        combiner_factors: &[[f32; 4]; 9],
        composite: &CompositeState,
        constants: &ConstantFile,
        clip_range: (f32, f32),
    ) -> Result<()> {
        (**self).upload_shader_uniforms(combiner_factors, composite, constants, clip_range)
    }
}

/// An [`IrqLine`] that just remembers whether the line is currently
/// asserted.
#[derive(Default)]
pub struct RecordingLine(pub AtomicBool);

impl IrqLine for RecordingLine {
    fn set_level(&self, raised: bool) {
        self.0.store(raised, Ordering::SeqCst);
    }
}

impl RecordingLine {
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
