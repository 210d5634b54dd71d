//! Vertex data structures and input descriptions.
//!
//! # Types
//!
//! - [`VertexLayout`] - binding and attribute descriptions fed to a pipeline
//! - [`ColorVertex`] - position + color vertex with its matching layout

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex input bindings and attributes for a graphics pipeline.
///
/// An empty layout is valid: it describes a pipeline whose vertex shader
/// generates positions itself (for example from `gl_VertexIndex`).
#[derive(Clone, Debug, Default)]
pub struct VertexLayout {
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex buffer binding.
    pub fn push_binding(
        &mut self,
        binding: u32,
        stride: u32,
        input_rate: vk::VertexInputRate,
    ) -> &mut Self {
        self.bindings.push(vk::VertexInputBindingDescription {
            binding,
            stride,
            input_rate,
        });
        self
    }

    /// Adds an attribute read from `binding` at `offset`.
    pub fn push_attribute(
        &mut self,
        binding: u32,
        location: u32,
        offset: u32,
        format: vk::Format,
    ) -> &mut Self {
        self.attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding,
            format,
            offset,
        });
        self
    }

    /// Binding descriptions in insertion order.
    #[inline]
    pub fn bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.bindings
    }

    /// Attribute descriptions in insertion order.
    #[inline]
    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }

    /// True when the layout has neither bindings nor attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.attributes.is_empty()
    }

    /// Vertex input state referencing this layout's descriptions.
    pub fn input_state(&self) -> vk::PipelineVertexInputStateCreateInfo<'_> {
        vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.bindings)
            .vertex_attribute_descriptions(&self.attributes)
    }
}

/// Simple vertex format with position and color.
///
/// - location 0: position (vec3)
/// - location 1: color (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl ColorVertex {
    /// Creates a new colored vertex.
    #[inline]
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Layout for a single per-vertex buffer at binding 0.
    pub fn layout() -> VertexLayout {
        let mut layout = VertexLayout::new();
        layout
            .push_binding(
                0,
                std::mem::size_of::<Self>() as u32,
                vk::VertexInputRate::VERTEX,
            )
            .push_attribute(
                0,
                0,
                std::mem::offset_of!(Self, position) as u32,
                vk::Format::R32G32B32_SFLOAT,
            )
            .push_attribute(
                0,
                1,
                std::mem::offset_of!(Self, color) as u32,
                vk::Format::R32G32B32_SFLOAT,
            );
        layout
    }
}
