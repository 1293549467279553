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

//! Compile the vertex/fragment WGSL source `pgraph::combiner` and
//! `pgraph::shader_bind` produce into a `wgpu::RenderPipeline`.

use crate::core::error::{EmulatorError, Result};

/// A compiled vertex+fragment pair, ready to bind.
pub struct CompiledProgram {
    pub vertex_module: wgpu::ShaderModule,
    pub fragment_module: wgpu::ShaderModule,
    pub pipeline: wgpu::RenderPipeline,
}

/// Compile `vertex_source` and `fragment_source` into a render pipeline
/// against `layout`, the shared bind-group layout `upload_shader_uniforms`
/// writes into.
pub fn compile(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<CompiledProgram> {
    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("nv2a vertex program"),
        source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("nv2a combiner fragment"),
        source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("nv2a pgraph pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    Ok(CompiledProgram {
        vertex_module,
        fragment_module,
        pipeline,
    })
}

/// Surface the device's captured validation errors as a `Result`,
/// since wgpu reports shader compile failures asynchronously rather
/// than through the creation call's return value.
pub fn pop_validation_error(device: &wgpu::Device) -> Result<()> {
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(EmulatorError::ShaderCompileError(error.to_string()));
    }
    Ok(())
}
