//! WGSL programs for the four draw kinds
//!
//! All programs share one uniform block (view projection plus paint
//! parameters) so a single bind group layout with a dynamic offset
//! covers every draw.

/// Position + color + UV, samples the bound texture (solid fills sample
/// the atlas white pixel)
pub const TEXTURED_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    paint_mat: mat3x3<f32>,
    params: vec4<f32>,
    inner_color: vec4<f32>,
    outer_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    out.position = uniforms.view_proj * vec4<f32>(pos, 0.0, 1.0);
    out.color = color;
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, in.uv) * in.color;
}
"#;

/// Position + color; the paint matrix maps canvas positions into
/// gradient space and a rounded-rect distance drives the color mix
pub const COLOR_GRADIENT_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    paint_mat: mat3x3<f32>,
    params: vec4<f32>,
    inner_color: vec4<f32>,
    outer_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) canvas_pos: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) color: vec4<f32>,
) -> VsOut {
    var out: VsOut;
    out.position = uniforms.view_proj * vec4<f32>(pos, 0.0, 1.0);
    out.color = color;
    out.canvas_pos = pos;
    return out;
}

fn sd_round_rect(p: vec2<f32>, extent: vec2<f32>, radius: f32) -> f32 {
    let inner = extent - vec2<f32>(radius, radius);
    let d = abs(p) - inner;
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2<f32>(0.0, 0.0))) - radius;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let local = (uniforms.paint_mat * vec3<f32>(in.canvas_pos, 1.0)).xy;
    let extent = uniforms.params.xy;
    let radius = uniforms.params.z;
    let feather = uniforms.params.w;
    let d = sd_round_rect(local, extent, radius);
    let factor = clamp((d + feather * 0.5) / feather, 0.0, 1.0);
    let paint = mix(uniforms.inner_color, uniforms.outer_color, factor);
    return paint * in.color;
}
"#;

/// Position + color; the paint matrix maps canvas positions straight
/// into UV space (pattern scale baked into the matrix)
pub const IMAGE_PATTERN_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    paint_mat: mat3x3<f32>,
    params: vec4<f32>,
    inner_color: vec4<f32>,
    outer_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) color: vec4<f32>,
) -> VsOut {
    var out: VsOut;
    out.position = uniforms.view_proj * vec4<f32>(pos, 0.0, 1.0);
    out.color = color;
    out.uv = (uniforms.paint_mat * vec3<f32>(pos, 1.0)).xy;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, in.uv) * in.color;
}
"#;

/// Position only; stamps the stencil plane (color writes are masked off
/// in the pipeline)
pub const STENCIL_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    paint_mat: mat3x3<f32>,
    params: vec4<f32>,
    inner_color: vec4<f32>,
    outer_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.view_proj * vec4<f32>(pos, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 0.0);
}
"#;
