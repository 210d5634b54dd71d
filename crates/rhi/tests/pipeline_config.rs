//! Integration tests for pipeline configuration and shader loading.

use ash::vk::{self, Handle};

use vulkraft_rhi::RhiError;
use vulkraft_rhi::pipeline::{
    GraphicsPipelineConfig, InputAssembly, PrimitiveTopology, RenderingFormats, VertexInput,
};
use vulkraft_rhi::shader::{SPIRV_MAGIC, ShaderEntry, spirv_words};
use vulkraft_rhi::vertex::ColorVertex;

fn entry(raw: u64) -> ShaderEntry {
    ShaderEntry::new(vk::ShaderModule::from_raw(raw), "main").expect("valid entry point")
}

#[test]
fn test_empty_config_lists_every_required_field() {
    let err = GraphicsPipelineConfig::default()
        .validate()
        .expect_err("empty config must not validate");

    match &err {
        RhiError::IncompletePipeline(missing) => assert_eq!(missing.len(), 5),
        other => panic!("unexpected error: {:?}", other),
    }

    let message = err.to_string();
    for field in [
        "rendering format",
        "vertex shader",
        "fragment shader",
        "vertex layout",
        "input assembly",
    ] {
        assert!(message.contains(field), "{} not in {:?}", field, message);
    }
}

#[test]
fn test_config_with_vertex_layout_validates() {
    let config = GraphicsPipelineConfig {
        rendering: Some(RenderingFormats {
            color: vk::Format::B8G8R8A8_SRGB,
            depth: Some(vk::Format::D32_SFLOAT),
            stencil: None,
        }),
        vertex_shader: Some(entry(1)),
        fragment_shader: Some(entry(2)),
        vertex_input: Some(VertexInput::Layout(ColorVertex::layout())),
        input_assembly: Some(InputAssembly {
            topology: PrimitiveTopology::TriangleStrip,
            primitive_restart: false,
        }),
        depth_test: true,
        color_blending: true,
        ..Default::default()
    };

    assert!(config.validate().is_ok());
}

#[test]
fn test_explicit_no_vertex_input_counts_as_set() {
    let config = GraphicsPipelineConfig {
        rendering: Some(RenderingFormats::color(vk::Format::B8G8R8A8_UNORM)),
        vertex_shader: Some(entry(1)),
        fragment_shader: Some(entry(2)),
        input_assembly: Some(InputAssembly::default()),
        ..Default::default()
    };

    match config.validate() {
        Err(RhiError::IncompletePipeline(missing)) => assert_eq!(missing, vec!["vertex layout"]),
        other => panic!("unexpected result: {:?}", other),
    }

    let config = GraphicsPipelineConfig {
        vertex_input: Some(VertexInput::None),
        ..config
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_spirv_loading_from_bytes() {
    let bytes: Vec<u8> = [SPIRV_MAGIC, 0x0001_0300, 0, 1, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();

    let words = spirv_words(&bytes).expect("valid SPIR-V header");
    assert_eq!(words.len(), 5);
    assert_eq!(words[0], SPIRV_MAGIC);
}
