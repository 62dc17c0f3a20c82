//! Compute kernel source, validation, and argument block.

use std::path::Path;

use super::GpuError;
use crate::schema::SimulationParams;

/// Embedded kernel source, used when no override path is configured.
pub const GREY_SCOTT_SHADER: &str = include_str!("shaders/grey_scott.wgsl");

/// Name of the compute entry point every kernel must expose.
pub const ENTRY_POINT: &str = "grey_scott_step";

/// Workgroup edge length declared by the kernel (`@workgroup_size(16, 16)`).
pub const WORKGROUP_SIZE: u32 = 16;

/// Scalar kernel arguments in positional order `(Du, Dv, F, k, dt, width, height)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelArgs {
    pub du: f32,
    pub dv: f32,
    pub feed: f32,
    pub kill: f32,
    pub dt: f32,
    pub width: u32,
    pub height: u32,
    _pad: u32,
}

impl KernelArgs {
    pub fn new(params: &SimulationParams, width: u32, height: u32) -> Self {
        Self {
            du: params.du,
            dv: params.dv,
            feed: params.feed,
            kill: params.kill,
            dt: params.dt,
            width,
            height,
            _pad: 0,
        }
    }
}

/// Read kernel source from `path`, or return the embedded source.
pub fn load_source(path: Option<&Path>) -> Result<String, GpuError> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path).map_err(|source| GpuError::KernelLoad {
                path: path.to_path_buf(),
                source,
            })?;
            log::info!("Loaded compute kernel from {}", path.display());
            Ok(source)
        }
        None => Ok(GREY_SCOTT_SHADER.to_owned()),
    }
}

/// Parse and validate WGSL, and check for the compute entry point.
///
/// Runs before pipeline creation so a broken kernel surfaces as an error
/// instead of a device validation panic.
pub fn validate_source(source: &str) -> Result<(), GpuError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| GpuError::KernelCompile(e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| GpuError::KernelCompile(format!("{:?}", e)))?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.name == ENTRY_POINT && ep.stage == naga::ShaderStage::Compute);
    if !has_entry {
        return Err(GpuError::KernelCompile(format!(
            "missing compute entry point `{}`",
            ENTRY_POINT
        )));
    }

    Ok(())
}

/// Number of workgroups needed to cover `extent` cells.
#[inline]
pub fn workgroup_count(extent: u32) -> u32 {
    extent.div_ceil(WORKGROUP_SIZE)
}
