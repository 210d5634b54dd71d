//! Graphics pipeline configuration and creation.
//!
//! A [`GraphicsPipelineConfig`] is a plain struct: required pieces are
//! `Option`s, everything else has a standard default. [`GraphicsPipeline::new`]
//! validates the config, reporting every missing piece at once, then creates
//! an empty pipeline layout and a dynamic-rendering pipeline.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vulkraft_rhi::device::Device;
//! use vulkraft_rhi::pipeline::{
//!     GraphicsPipeline, GraphicsPipelineConfig, InputAssembly, RenderingFormats, VertexInput,
//! };
//! use vulkraft_rhi::shader::ShaderEntry;
//!
//! # fn example(device: Arc<Device>, vs: ShaderEntry, fs: ShaderEntry) -> Result<(), vulkraft_rhi::RhiError> {
//! let config = GraphicsPipelineConfig {
//!     rendering: Some(RenderingFormats::color(vk::Format::B8G8R8A8_SRGB)),
//!     vertex_shader: Some(vs),
//!     fragment_shader: Some(fs),
//!     vertex_input: Some(VertexInput::None),
//!     input_assembly: Some(InputAssembly::default()),
//!     ..Default::default()
//! };
//! let pipeline = GraphicsPipeline::new(device, &config)?;
//! # let _ = pipeline.handle();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::{ShaderEntry, ShaderStage};
use crate::vertex::VertexLayout;

/// Dynamic states every pipeline has: the viewport and scissor are set per frame.
pub const STANDARD_DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Primitive topology for input assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Connected lines.
    LineStrip,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles with shared edges.
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Converts to Vulkan primitive topology.
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// Polygon rasterization mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    /// Fill the polygon interior.
    #[default]
    Fill,
    /// Draw polygon edges as lines.
    Line,
    /// Draw polygon vertices as points.
    Point,
}

impl PolygonMode {
    /// Converts to Vulkan polygon mode.
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    #[default]
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Attachment formats the pipeline renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderingFormats {
    /// Format of the single color attachment.
    pub color: vk::Format,
    /// Depth attachment format, if any.
    pub depth: Option<vk::Format>,
    /// Stencil attachment format, if any.
    pub stencil: Option<vk::Format>,
}

impl RenderingFormats {
    /// Color attachment only.
    pub const fn color(color: vk::Format) -> Self {
        Self {
            color,
            depth: None,
            stencil: None,
        }
    }
}

/// How vertices reach the vertex shader.
#[derive(Clone, Debug)]
pub enum VertexInput {
    /// No vertex buffers; the shader generates its own positions.
    None,
    /// Vertex buffers described by a layout.
    Layout(VertexLayout),
}

/// Input assembly state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputAssembly {
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
}

/// Rasterization settings. Defaults to fill, no culling, counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rasterization {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
}

/// Everything needed to create a graphics pipeline.
///
/// `rendering`, both shaders, `vertex_input` and `input_assembly` are
/// required. Use [`VertexInput::None`] to state explicitly that the pipeline
/// has no vertex buffers.
#[derive(Clone, Debug, Default)]
pub struct GraphicsPipelineConfig {
    pub rendering: Option<RenderingFormats>,
    pub vertex_shader: Option<ShaderEntry>,
    pub fragment_shader: Option<ShaderEntry>,
    pub vertex_input: Option<VertexInput>,
    pub input_assembly: Option<InputAssembly>,
    pub rasterization: Rasterization,
    /// Depth test and write with `LESS`.
    pub depth_test: bool,
    /// `SRC_ALPHA` / `ONE_MINUS_SRC_ALPHA` color blending.
    pub color_blending: bool,
    /// Dynamic states on top of [`STANDARD_DYNAMIC_STATES`].
    pub extra_dynamic_states: Vec<vk::DynamicState>,
}

/// Borrowed required pieces of a validated config.
struct Required<'a> {
    rendering: &'a RenderingFormats,
    vertex_shader: &'a ShaderEntry,
    fragment_shader: &'a ShaderEntry,
    vertex_input: &'a VertexInput,
    input_assembly: &'a InputAssembly,
}

impl GraphicsPipelineConfig {
    /// Checks that every required piece is present.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::IncompletePipeline`] naming all missing pieces.
    pub fn validate(&self) -> RhiResult<()> {
        self.required().map(|_| ())
    }

    fn required(&self) -> RhiResult<Required<'_>> {
        let mut missing = Vec::new();
        if self.rendering.is_none() {
            missing.push("rendering format");
        }
        if self.vertex_shader.is_none() {
            missing.push("vertex shader");
        }
        if self.fragment_shader.is_none() {
            missing.push("fragment shader");
        }
        if self.vertex_input.is_none() {
            missing.push("vertex layout");
        }
        if self.input_assembly.is_none() {
            missing.push("input assembly");
        }

        match (
            &self.rendering,
            &self.vertex_shader,
            &self.fragment_shader,
            &self.vertex_input,
            &self.input_assembly,
        ) {
            (
                Some(rendering),
                Some(vertex_shader),
                Some(fragment_shader),
                Some(vertex_input),
                Some(input_assembly),
            ) => Ok(Required {
                rendering,
                vertex_shader,
                fragment_shader,
                vertex_input,
                input_assembly,
            }),
            _ => Err(RhiError::IncompletePipeline(missing)),
        }
    }

    /// Standard dynamic states followed by the extra ones, without duplicates.
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        let mut states = STANDARD_DYNAMIC_STATES.to_vec();
        for state in &self.extra_dynamic_states {
            if !states.contains(state) {
                states.push(*state);
            }
        }
        states
    }

    /// Rasterization state: no depth clamp, bias or discard; line width 1.
    pub fn rasterization_state(&self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.rasterization.polygon_mode.to_vk())
            .cull_mode(self.rasterization.cull_mode.to_vk())
            .front_face(self.rasterization.front_face.to_vk())
            .depth_bias_enable(false)
            .line_width(1.0)
    }

    /// Depth state: test and write with `LESS` when enabled, otherwise off.
    pub fn depth_stencil_state(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        let state = vk::PipelineDepthStencilStateCreateInfo::default();
        if self.depth_test {
            state
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
        } else {
            state.depth_test_enable(false)
        }
    }

    /// Blend state of the color attachment. All channels are always written.
    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        if self.color_blending {
            attachment
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
        } else {
            attachment.blend_enable(false)
        }
    }
}

/// Graphics pipeline and its (empty) layout, destroyed on drop.
pub struct GraphicsPipeline {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Validates `config` and creates the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::IncompletePipeline`] if required pieces are
    /// missing, or a Vulkan error if layout or pipeline creation fails.
    pub fn new(device: Arc<Device>, config: &GraphicsPipelineConfig) -> RhiResult<Self> {
        let required = config.required()?;

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.handle().create_pipeline_layout(&layout_info, None)? };
        debug!("Created empty pipeline layout");

        let stages = [
            required
                .vertex_shader
                .stage_create_info(ShaderStage::Vertex),
            required
                .fragment_shader
                .stage_create_info(ShaderStage::Fragment),
        ];

        let empty_layout = VertexLayout::new();
        let vertex_layout = match required.vertex_input {
            VertexInput::None => &empty_layout,
            VertexInput::Layout(layout) => layout,
        };
        let vertex_input_state = vertex_layout.input_state();

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(required.input_assembly.topology.to_vk())
            .primitive_restart_enable(required.input_assembly.primitive_restart);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = config.rasterization_state();

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0);

        let depth_stencil_state = config.depth_stencil_state();

        let blend_attachments = [config.color_blend_attachment()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = config.dynamic_states();
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [required.rendering.color];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(required.rendering.depth.unwrap_or(vk::Format::UNDEFINED))
            .stencil_attachment_format(
                required.rendering.stencil.unwrap_or(vk::Format::UNDEFINED),
            );

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let created = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, result)) => {
                unsafe { device.handle().destroy_pipeline_layout(layout, None) };
                return Err(RhiError::PipelineError(format!(
                    "Graphics pipeline creation failed: {:?}",
                    result
                )));
            }
        };

        info!(
            "Graphics pipeline created (color format {:?})",
            required.rendering.color
        );

        Ok(Self {
            device,
            layout,
            pipeline,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the pipeline layout handle.
    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}
