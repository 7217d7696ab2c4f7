//! GLSL shader sources and compilation helpers.
//!
//! All shaders target GLSL 1.40 (OpenGL 3.1), which is widely supported on
//! desktop platforms. Every program reads its columns from separate
//! buffers: positions at location 0, colors at 1 and a per-kind extra
//! attribute at 2.

use glow::HasContext;

use crate::error::TessError;

/// Vertex shader for triangle geometry.
///
/// # Uniforms
///
/// | Name          | Type   | Description                       |
/// |---------------|--------|-----------------------------------|
/// | `u_transform` | `mat4` | Model-view-projection matrix      |
pub const FILL_VERTEX_SRC: &str = r"#version 140

in vec3 a_position;
in vec4 a_color;
in vec2 a_texcoord;

uniform mat4 u_transform;

out vec4 v_color;
out vec2 v_texcoord;

void main() {
    v_color = a_color;
    v_texcoord = a_texcoord;
    gl_Position = u_transform * vec4(a_position, 1.0);
}
";

/// Fragment shader for triangle geometry, optionally modulated by a
/// texture.
///
/// # Uniforms
///
/// | Name         | Type        | Description                      |
/// |--------------|-------------|----------------------------------|
/// | `u_textured` | `int`       | `1` when a texture is bound      |
/// | `u_texture`  | `sampler2D` | Texture unit index (always 0)    |
pub const FILL_FRAGMENT_SRC: &str = r"#version 140

in vec4 v_color;
in vec2 v_texcoord;

uniform int u_textured;
uniform sampler2D u_texture;

out vec4 frag_color;

void main() {
    vec4 color = v_color;
    if (u_textured == 1) {
        color *= texture(u_texture, v_texcoord);
    }
    frag_color = vec4(color.rgb * color.a, color.a);
}
";

/// Vertex shader for stroke quads.
///
/// Each vertex carries the segment's other endpoint and a signed half width
/// in pixels; the quad is extruded perpendicular to the segment in screen
/// space so its width does not depend on depth.
///
/// # Uniforms
///
/// | Name          | Type   | Description                       |
/// |---------------|--------|-----------------------------------|
/// | `u_transform` | `mat4` | Model-view-projection matrix      |
/// | `u_viewport`  | `vec2` | Viewport size in pixels           |
pub const LINE_VERTEX_SRC: &str = r"#version 140

in vec3 a_position;
in vec4 a_color;
in vec4 a_direction;

uniform mat4 u_transform;
uniform vec2 u_viewport;

out vec4 v_color;

void main() {
    vec4 clip = u_transform * vec4(a_position, 1.0);
    vec4 other = u_transform * vec4(a_direction.xyz, 1.0);

    vec2 here = clip.xy / clip.w * u_viewport;
    vec2 there = other.xy / other.w * u_viewport;
    vec2 dir = there - here;
    float len = length(dir);
    vec2 normal = len > 0.0 ? vec2(-dir.y, dir.x) / len : vec2(0.0);

    clip.xy += normal * a_direction.w / u_viewport * clip.w;
    v_color = a_color;
    gl_Position = clip;
}
";

/// Vertex shader for point sprites: the corner offset is applied in screen
/// space so points stay round under any transform.
///
/// # Uniforms
///
/// | Name          | Type   | Description                       |
/// |---------------|--------|-----------------------------------|
/// | `u_transform` | `mat4` | Model-view-projection matrix      |
/// | `u_viewport`  | `vec2` | Viewport size in pixels           |
pub const POINT_VERTEX_SRC: &str = r"#version 140

in vec3 a_position;
in vec4 a_color;
in vec2 a_offset;

uniform mat4 u_transform;
uniform vec2 u_viewport;

out vec4 v_color;

void main() {
    vec4 clip = u_transform * vec4(a_position, 1.0);
    clip.xy += a_offset * 2.0 / u_viewport * clip.w;
    v_color = a_color;
    gl_Position = clip;
}
";

/// Fragment shader for stroke quads and point sprites.
pub const COLOR_FRAGMENT_SRC: &str = r"#version 140

in vec4 v_color;

out vec4 frag_color;

void main() {
    frag_color = vec4(v_color.rgb * v_color.a, v_color.a);
}
";

/// Attribute names bound to locations 0, 1 and 2 before linking.
pub const FILL_ATTRIBUTES: [&str; 3] = ["a_position", "a_color", "a_texcoord"];
/// See [`FILL_ATTRIBUTES`].
pub const LINE_ATTRIBUTES: [&str; 3] = ["a_position", "a_color", "a_direction"];
/// See [`FILL_ATTRIBUTES`].
pub const POINT_ATTRIBUTES: [&str; 3] = ["a_position", "a_color", "a_offset"];

/// Compile and link a shader program from vertex and fragment sources,
/// binding `attributes` to consecutive locations.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// [`TessError::Gpu`] with the driver's log if compilation or linking
/// fails.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
    attributes: &[&str],
) -> Result<glow::Program, TessError> {
    let program = unsafe { gl.create_program() }.map_err(TessError::Gpu)?;

    let vs = unsafe { compile_shader(gl, glow::VERTEX_SHADER, vertex_src) }?;
    let fs = unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) }?;

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        for (location, name) in (0u32..).zip(attributes) {
            gl.bind_attrib_location(program, location, name);
        }
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(TessError::Gpu(format!("program link error: {log}")));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, TessError> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(TessError::Gpu)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(TessError::Gpu(format!("shader compile error: {log}")));
        }

        Ok(shader)
    }
}
