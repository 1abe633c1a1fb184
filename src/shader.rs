//! WGSL source for the sprite program.
//!
//! The vertex stage reads the records described in [`crate::vertex`]. The
//! fragment stage samples one of a fixed number of bound textures, picked by
//! the per-vertex texture unit, and multiplies the texel by the premultiplied
//! vertex color.

use std::fmt::Write;

/// The binding of the uniform buffer holding the projection matrix.
pub const UNIFORM_BINDING: u32 = 0;
/// The binding of the shared sampler.
pub const SAMPLER_BINDING: u32 = 1;
/// The binding of the first texture slot.
pub const FIRST_TEXTURE_BINDING: u32 = 2;
/// The name of the vertex entry point.
pub const VERTEX_ENTRY: &str = "vertex";
/// The name of the fragment entry point.
pub const FRAGMENT_ENTRY: &str = "fragment";

/// How the fragment stage picks a texture by unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSelection {
    /// Every unit lives in one `binding_array` indexed directly by the unit.
    /// Requires non-uniform indexing of sampled texture arrays.
    Indexed,
    /// Every unit has its own binding and a `switch` picks between them.
    Branching,
}

impl TextureSelection {
    /// Returns the number of bindings used by the texture slots.
    #[must_use]
    pub const fn texture_bindings(self, texture_units: u32) -> u32 {
        match self {
            Self::Indexed => 1,
            Self::Branching => texture_units,
        }
    }
}

const PRELUDE: &str = r#"struct Uniforms {
    projection: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(0) @binding(1)
var texture_sampler: sampler;
"#;

const STAGES: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) texture_unit: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) @interpolate(flat) texture_unit: u32,
};

@vertex
fn vertex(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.projection * vec4<f32>(input.position, 0.0, 1.0);
    out.color = input.color;
    out.uv = input.uv;
    out.texture_unit = u32(round(input.texture_unit));
    return out;
}

@fragment
fn fragment(input: VertexOutput) -> @location(0) vec4<f32> {
    return sample_unit(input.texture_unit, input.uv) * input.color;
}
"#;

/// Returns the WGSL source of the sprite program for `texture_units` units.
///
/// # Panics
///
/// Panics if `texture_units` is zero.
#[must_use]
pub fn sprite_shader(texture_units: u32, selection: TextureSelection) -> String {
    assert!(texture_units > 0, "at least one texture unit is required");

    let mut source = String::from(PRELUDE);
    let written = match selection {
        TextureSelection::Indexed => write_indexed(&mut source, texture_units),
        TextureSelection::Branching => write_branching(&mut source, texture_units),
    };
    written.expect("writing to a String is infallible");
    source.push_str(STAGES);
    source
}

fn write_indexed(source: &mut String, texture_units: u32) -> std::fmt::Result {
    writeln!(source)?;
    writeln!(source, "@group(0) @binding({})", FIRST_TEXTURE_BINDING)?;
    writeln!(
        source,
        "var textures: binding_array<texture_2d<f32>, {}>;",
        texture_units
    )?;
    writeln!(source)?;
    writeln!(source, "fn sample_unit(unit: u32, uv: vec2<f32>) -> vec4<f32> {{")?;
    writeln!(
        source,
        "    return textureSampleLevel(textures[unit], texture_sampler, uv, 0.0);"
    )?;
    writeln!(source, "}}")
}

fn write_branching(source: &mut String, texture_units: u32) -> std::fmt::Result {
    for unit in 0..texture_units {
        writeln!(source)?;
        writeln!(
            source,
            "@group(0) @binding({})",
            FIRST_TEXTURE_BINDING + unit
        )?;
        writeln!(source, "var texture_{}: texture_2d<f32>;", unit)?;
    }
    writeln!(source)?;
    writeln!(source, "fn sample_unit(unit: u32, uv: vec2<f32>) -> vec4<f32> {{")?;
    writeln!(source, "    var color = vec4<f32>(0.0);")?;
    writeln!(source, "    switch unit {{")?;
    for unit in 0..texture_units {
        writeln!(source, "        case {}u: {{", unit)?;
        writeln!(
            source,
            "            color = textureSampleLevel(texture_{}, texture_sampler, uv, 0.0);",
            unit
        )?;
        writeln!(source, "        }}")?;
    }
    writeln!(source, "        default: {{}}")?;
    writeln!(source, "    }}")?;
    writeln!(source, "    return color;")?;
    writeln!(source, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{}\n{}", err.emit_to_string(source), source));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{:?}\n{}", err, source));
    }

    #[test]
    fn branching_source_is_valid() {
        for units in [1, 2, 16, 24] {
            let source = sprite_shader(units, TextureSelection::Branching);
            validate(&source);
            assert!(source.contains(&format!("case {}u:", units - 1)));
            assert!(!source.contains(&format!("case {}u:", units)));
            assert!(source.contains(&format!(
                "@binding({})",
                FIRST_TEXTURE_BINDING + units - 1
            )));
        }
    }

    #[test]
    fn indexed_source_is_valid() {
        for units in [1, 8, 24] {
            let source = sprite_shader(units, TextureSelection::Indexed);
            validate(&source);
            assert!(source.contains(&format!("binding_array<texture_2d<f32>, {}>", units)));
            assert!(!source.contains("switch"));
        }
    }

    #[test]
    fn binding_counts() {
        assert_eq!(TextureSelection::Indexed.texture_bindings(12), 1);
        assert_eq!(TextureSelection::Branching.texture_bindings(12), 12);
    }
}
