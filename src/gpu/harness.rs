//! Effect harness and front-end validation.
//!
//! An effect source is the body of a WGSL module that must define
//!
//! ```wgsl
//! fn effect(input: ShaderInput) -> vec4<f32>
//! ```
//!
//! It is spliced between a fixed prelude (the `ShaderInput` struct, the
//! screen texture/sampler/uniform bindings and `sample_screen`) and a fixed
//! epilogue (a full-screen triangle vertex stage and a fragment stage that
//! forwards its inputs to `effect`). The result is parsed and validated with
//! naga before any GPU object is created.

use std::fmt;

/// Name of the function an effect source must define.
pub const ENTRY_POINT: &str = "effect";
/// Name of the struct the entry point takes.
pub const INPUT_STRUCT: &str = "ShaderInput";
/// Vertex stage defined by the harness.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment stage defined by the harness.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Resources the prelude binds; effects may not declare their own.
const HARNESS_BINDINGS: [&str; 3] = ["screen_texture", "screen_sampler", "harness_uniforms"];

const PRELUDE: &str = include_str!("shaders/harness_prelude.wgsl");
const EPILOGUE: &str = include_str!("shaders/harness_epilogue.wgsl");

/// Uniform block bound at `@group(0) @binding(2)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HarnessUniforms {
    pub resolution: [f32; 2],
    pub cursor: [f32; 2],
    pub time: f32,
    pub _pad0: f32,
    pub _pad1: [f32; 2],
}

/// Why an effect failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// The compiler rejected the source; the diagnostic is kept verbatim.
    SyntaxOrCompile,
    /// The source parsed but does not define the required entry point.
    MissingEntryPoint,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyntaxOrCompile => f.write_str("Shader compile error"),
            Self::MissingEntryPoint => f.write_str("Missing entry point"),
        }
    }
}

/// A structured compile failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    /// Line in the effect source the diagnostic points at, when known.
    pub line: Option<u32>,
}

impl CompileError {
    pub fn compile(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            kind: CompileErrorKind::SyntaxOrCompile,
            message: message.into(),
            line,
        }
    }

    pub fn missing_entry_point(message: impl Into<String>) -> Self {
        Self {
            kind: CompileErrorKind::MissingEntryPoint,
            message: message.into(),
            line: None,
        }
    }
}

/// An effect that passed front-end validation.
#[derive(Debug)]
pub struct ValidatedEffect {
    /// The effect source as supplied.
    pub source: String,
    /// Full harness module text.
    pub wrapped: String,
    pub module: naga::Module,
    pub info: naga::valid::ModuleInfo,
}

/// Splice an effect source into the harness.
pub fn wrap_source(source: &str) -> String {
    let mut wrapped = String::with_capacity(PRELUDE.len() + source.len() + EPILOGUE.len() + 1);
    wrapped.push_str(PRELUDE);
    wrapped.push_str(source);
    wrapped.push('\n');
    wrapped.push_str(EPILOGUE);
    wrapped
}

/// Map a line of harness text back to the effect source.
fn source_line(harness_line: u32, source: &str) -> Option<u32> {
    let prelude_lines = PRELUDE.lines().count() as u32;
    let source_lines = source.lines().count() as u32;
    let line = harness_line.checked_sub(prelude_lines)?;
    (1..=source_lines).contains(&line).then_some(line)
}

/// Check that `module` defines `fn effect(input: ShaderInput) -> vec4<f32>`.
fn check_entry_point(module: &naga::Module) -> Result<(), CompileError> {
    let function = module
        .functions
        .iter()
        .map(|(_, function)| function)
        .find(|function| function.name.as_deref() == Some(ENTRY_POINT))
        .ok_or_else(|| {
            CompileError::missing_entry_point(format!(
                "Could not find `fn {}({}) -> vec4<f32>` in effect source",
                ENTRY_POINT, INPUT_STRUCT
            ))
        })?;

    let takes_input = match function.arguments.as_slice() {
        [argument] => module.types[argument.ty].name.as_deref() == Some(INPUT_STRUCT),
        _ => false,
    };
    let returns_color = function.result.as_ref().is_some_and(|result| {
        matches!(
            module.types[result.ty].inner,
            naga::TypeInner::Vector {
                size: naga::VectorSize::Quad,
                scalar,
            } if scalar == naga::Scalar::F32
        )
    });

    if takes_input && returns_color {
        Ok(())
    } else {
        Err(CompileError::missing_entry_point(format!(
            "`{}` must have the signature `fn {}(input: {}) -> vec4<f32>`",
            ENTRY_POINT, ENTRY_POINT, INPUT_STRUCT
        )))
    }
}

/// Reject resource bindings the effect pipeline layout does not provide.
fn check_bindings(module: &naga::Module) -> Result<(), CompileError> {
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.as_deref().unwrap_or("<unnamed>");
        if !HARNESS_BINDINGS.contains(&name) {
            return Err(CompileError::compile(
                format!(
                    "`{}` is bound at @group({}) @binding({}); effects can only use the screen texture, sampler and uniforms",
                    name, binding.group, binding.binding
                ),
                None,
            ));
        }
    }
    Ok(())
}

/// Wrap and validate an effect source.
///
/// Parse errors in the effect itself are reported before the entry point is
/// looked up, so a typo is never misreported as a missing entry point.
pub fn validate_effect(source: &str) -> Result<ValidatedEffect, CompileError> {
    let declarations = format!("{}{}\n", PRELUDE, source);
    let module = naga::front::wgsl::parse_str(&declarations).map_err(|e| {
        let line = e
            .location(&declarations)
            .and_then(|loc| source_line(loc.line_number, source));
        CompileError::compile(e.emit_to_string(&declarations), line)
    })?;
    check_entry_point(&module)?;
    check_bindings(&module)?;

    let wrapped = wrap_source(source);
    let module = naga::front::wgsl::parse_str(&wrapped).map_err(|e| {
        let line = e
            .location(&wrapped)
            .and_then(|loc| source_line(loc.line_number, source));
        CompileError::compile(e.emit_to_string(&wrapped), line)
    })?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| {
        let line = e
            .location(&wrapped)
            .and_then(|loc| source_line(loc.line_number, source));
        CompileError::compile(e.emit_to_string(&wrapped), line)
    })?;

    Ok(ValidatedEffect {
        source: source.to_string(),
        wrapped,
        module,
        info,
    })
}
