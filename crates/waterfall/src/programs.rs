use std::borrow::Cow;

use crate::types::ProgramNames;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program '{0}' is not registered")]
    Missing(String),
}

/// WGSL source plus the entry point to invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: String,
    pub wgsl: Cow<'static, str>,
    pub entry_point: Cow<'static, str>,
}

/// Registry that resolves program identifiers to sources.
pub trait ProgramLibrary {
    fn lookup(&self, name: &str) -> Option<ProgramSource>;
}

/// The three programs the waterfall needs, resolved at setup.
#[derive(Debug, Clone)]
pub struct ResolvedPrograms {
    pub vertex: ProgramSource,
    pub fragment: ProgramSource,
    pub compute: ProgramSource,
}

/// Looks up every configured identifier; any miss aborts setup.
pub fn resolve_programs(
    library: &dyn ProgramLibrary,
    names: &ProgramNames,
) -> Result<ResolvedPrograms, ProgramError> {
    let find = |name: &str| {
        library
            .lookup(name)
            .ok_or_else(|| ProgramError::Missing(name.to_string()))
    };
    Ok(ResolvedPrograms {
        vertex: find(&names.vertex)?,
        fragment: find(&names.fragment)?,
        compute: find(&names.compute)?,
    })
}

/// Programs shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrograms;

impl ProgramLibrary for BuiltinPrograms {
    fn lookup(&self, name: &str) -> Option<ProgramSource> {
        let (wgsl, entry_point) = match name {
            "waterfall_vertex" => (VERTEX_WGSL, "vs_main"),
            "waterfall_fragment" => (FRAGMENT_WGSL, "fs_main"),
            "intensity_to_color" => (INTENSITY_TO_COLOR_WGSL, "cs_main"),
            _ => return None,
        };
        Some(ProgramSource {
            name: name.to_string(),
            wgsl: Cow::Borrowed(wgsl),
            entry_point: Cow::Borrowed(entry_point),
        })
    }
}

/// Workgroup edge of the conversion kernel; must match `@workgroup_size`.
pub(crate) const CONVERT_WORKGROUP: u32 = 16;

const VERTEX_WGSL: &str = r"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coords: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(input.position, 0.0, 1.0);
    out.tex_coords = input.tex_coords;
    return out;
}
";

// Texel addressing mirrors `geometry::texel_at`.
const FRAGMENT_WGSL: &str = r"
@group(0) @binding(0) var draw_surface: texture_2d<f32>;

@fragment
fn fs_main(@location(0) tex_coords: vec2<f32>) -> @location(0) vec4<f32> {
    let size = vec2<i32>(textureDimensions(draw_surface));
    let last = size - vec2<i32>(1, 1);
    let column = min(i32(floor(clamp(tex_coords.x, 0.0, 1.0) * f32(last.x) + 0.5)), last.x);
    let line = i32(floor(tex_coords.y * f32(last.y) + 0.5));
    let row = ((line % size.y) + size.y) % size.y;
    return textureLoad(draw_surface, vec2<i32>(column, row), 0);
}
";

// Index math mirrors `gradient::gradient_index`.
const INTENSITY_TO_COLOR_WGSL: &str = r"
@group(0) @binding(0) var intensities: texture_2d<u32>;
@group(0) @binding(1) var gradient: texture_1d<f32>;
@group(0) @binding(2) var colors: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(16, 16, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(intensities);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    let raw = textureLoad(intensities, id.xy, 0).r;
    let last = textureDimensions(gradient) - 1u;
    let index = min(raw * last / 65535u, last);
    textureStore(colors, id.xy, textureLoad(gradient, index, 0));
}
";

#[cfg(test)]
mod tests {
    use wgpu::naga;

    use super::*;
    use crate::gradient::gradient_index;

    fn parse_and_validate(program: &ProgramSource) -> naga::Module {
        let module = naga::front::wgsl::parse_str(&program.wgsl).unwrap_or_else(|err| {
            panic!(
                "{} failed to parse:\n{}",
                program.name,
                err.emit_to_string(&program.wgsl)
            )
        });
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{} failed validation: {err:?}", program.name));
        module
    }

    fn entry_point<'a>(module: &'a naga::Module, program: &ProgramSource) -> &'a naga::EntryPoint {
        module
            .entry_points
            .iter()
            .find(|entry| entry.name == program.entry_point)
            .unwrap_or_else(|| panic!("{} has no entry point {}", program.name, program.entry_point))
    }

    struct Empty;

    impl ProgramLibrary for Empty {
        fn lookup(&self, _name: &str) -> Option<ProgramSource> {
            None
        }
    }

    #[test]
    fn builtin_library_resolves_default_names() {
        let programs = resolve_programs(&BuiltinPrograms, &ProgramNames::default())
            .expect("builtins resolve");
        assert_eq!(programs.vertex.entry_point, "vs_main");
        assert_eq!(programs.fragment.entry_point, "fs_main");
        assert_eq!(programs.compute.entry_point, "cs_main");
    }

    #[test]
    fn missing_program_is_reported_by_name() {
        let names = ProgramNames {
            compute: "heatmap_v2".into(),
            ..ProgramNames::default()
        };
        let err = resolve_programs(&BuiltinPrograms, &names).unwrap_err();
        assert_eq!(err, ProgramError::Missing("heatmap_v2".into()));

        let err = resolve_programs(&Empty, &ProgramNames::default()).unwrap_err();
        assert_eq!(err, ProgramError::Missing("waterfall_vertex".into()));
    }

    #[test]
    fn builtin_programs_validate() {
        let programs = resolve_programs(&BuiltinPrograms, &ProgramNames::default()).unwrap();
        for (program, stage) in [
            (&programs.vertex, naga::ShaderStage::Vertex),
            (&programs.fragment, naga::ShaderStage::Fragment),
            (&programs.compute, naga::ShaderStage::Compute),
        ] {
            let module = parse_and_validate(program);
            assert_eq!(entry_point(&module, program).stage, stage, "{}", program.name);
        }
    }

    #[test]
    fn workgroup_constant_matches_kernel() {
        let kernel = BuiltinPrograms.lookup("intensity_to_color").unwrap();
        let module = parse_and_validate(&kernel);
        assert_eq!(
            entry_point(&module, &kernel).workgroup_size,
            [CONVERT_WORKGROUP, CONVERT_WORKGROUP, 1]
        );
    }

    #[test]
    fn kernel_index_formula_matches_gradient_index() {
        let kernel = BuiltinPrograms.lookup("intensity_to_color").unwrap();
        assert!(kernel.wgsl.contains("min(raw * last / 65535u, last)"));
        // The same expression evaluated with the 256-entry table's `last`.
        let last = 255u32;
        for raw in 0..=u32::from(u16::MAX) {
            assert_eq!(gradient_index(raw as u16), (raw * last / 65535).min(last) as usize);
        }
    }

    #[test]
    fn fragment_addresses_texels_without_a_sampler() {
        let fragment = BuiltinPrograms.lookup("waterfall_fragment").unwrap();
        let module = parse_and_validate(&fragment);
        let has_sampler = module.global_variables.iter().any(|(_, global)| {
            matches!(module.types[global.ty].inner, naga::TypeInner::Sampler { .. })
        });
        assert!(!has_sampler);
        assert!(fragment.wgsl.contains("floor(tex_coords.y * f32(last.y) + 0.5)"));
        assert!(fragment.wgsl.contains("((line % size.y) + size.y) % size.y"));
    }
}
