//! Shader module management.
//!
//! Loads SPIR-V from files or byte slices into `VkShaderModule`s. A loaded
//! [`Shader`] hands out a [`ShaderEntry`] (module handle plus entry point)
//! which is what a [`GraphicsPipelineConfig`](crate::pipeline::GraphicsPipelineConfig)
//! refers to.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vulkraft_rhi::device::Device;
//! use vulkraft_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vulkraft_rhi::RhiError> {
//! let vertex = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/triangle.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//! let _entry = vertex.entry();
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Graphics pipeline stage a shader is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Runs once per vertex.
    Vertex,
    /// Runs once per fragment.
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A shader module and the entry point to invoke in it.
///
/// The module is borrowed: whoever created it must keep it alive until every
/// pipeline built from this entry has been created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderEntry {
    /// Shader module handle.
    pub module: vk::ShaderModule,
    /// Entry point function name.
    pub entry_point: CString,
}

impl ShaderEntry {
    /// Creates an entry for `module` invoking `entry_point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name contains an interior nul byte.
    pub fn new(module: vk::ShaderModule, entry_point: &str) -> RhiResult<Self> {
        let entry_point = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;
        Ok(Self {
            module,
            entry_point,
        })
    }

    /// Stage create info for `stage`. Borrows the entry point name.
    pub fn stage_create_info(&self, stage: ShaderStage) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

/// Converts raw SPIR-V bytes into little-endian code words.
///
/// # Errors
///
/// Returns an error if the length is not a multiple of 4 or the module does
/// not start with the SPIR-V magic number.
pub fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match code.first() {
        Some(&SPIRV_MAGIC) => Ok(code),
        Some(other) => Err(RhiError::ShaderError(format!(
            "Invalid SPIR-V magic number {:#010x}",
            other
        ))),
        None => Err(RhiError::ShaderError("SPIR-V code is empty".to_string())),
    }
}

/// Owned `VkShaderModule`, destroyed on drop.
pub struct Shader {
    device: Arc<Device>,
    stage: ShaderStage,
    entry: ShaderEntry,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the SPIR-V is malformed,
    /// or module creation fails.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the SPIR-V is malformed, the entry point name
    /// contains a nul byte, or module creation fails.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;
        // Validate the name before creating anything that would need cleanup.
        let mut entry = ShaderEntry::new(vk::ShaderModule::null(), entry_point)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        entry.module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        info!(
            "Created {} shader module with entry point '{}'",
            stage, entry_point
        );

        Ok(Self {
            device,
            stage,
            entry,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.entry.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the entry point function name.
    #[inline]
    pub fn entry_point(&self) -> &CStr {
        &self.entry.entry_point
    }

    /// Module and entry point, for use in a pipeline configuration.
    pub fn entry(&self) -> ShaderEntry {
        self.entry.clone()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.entry.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}
