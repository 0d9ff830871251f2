#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use strata_d3d11::{
    BindFlags, Buffer, BufferDesc, ComputePipelineDesc, GraphicsPipelineDesc, PipelineResourceLayoutDesc,
    PipelineState, RenderDevice, ResourceState, ShaderCreateInfo, ShaderStage, ShaderVariableType, Texture,
    TextureDesc,
};

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber that records everything at `DEBUG` and above, and returns the
/// captured output next to `f`'s result.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

pub fn mutable_layout() -> PipelineResourceLayoutDesc {
    PipelineResourceLayoutDesc {
        default_variable_type: ShaderVariableType::Mutable,
        ..Default::default()
    }
}

pub fn graphics_pipeline(device: &RenderDevice, name: &str, ps: &[u8], vertex_strides: Vec<u32>) -> Arc<PipelineState> {
    let vs = strata_dxbc::test_utils::RdefBuilder::new(strata_dxbc::ProgramType::Vertex).build_dxbc();
    let desc = GraphicsPipelineDesc {
        name: name.into(),
        resource_layout: mutable_layout(),
        vertex_shader: Some(
            device
                .create_shader(&ShaderCreateInfo::new("vs", ShaderStage::Vertex, &vs))
                .unwrap(),
        ),
        pixel_shader: Some(
            device
                .create_shader(&ShaderCreateInfo::new("ps", ShaderStage::Pixel, ps))
                .unwrap(),
        ),
        vertex_strides,
        ..Default::default()
    };
    Arc::new(device.create_graphics_pipeline_state(desc).unwrap())
}

pub fn compute_pipeline(device: &RenderDevice, name: &str, cs: &[u8]) -> Arc<PipelineState> {
    let desc = ComputePipelineDesc {
        name: name.into(),
        resource_layout: mutable_layout(),
        compute_shader: Some(
            device
                .create_shader(&ShaderCreateInfo::new("cs", ShaderStage::Compute, cs))
                .unwrap(),
        ),
        ..Default::default()
    };
    Arc::new(device.create_compute_pipeline_state(desc).unwrap())
}

pub fn texture(device: &RenderDevice, name: &str, state: ResourceState) -> Arc<Texture> {
    device.create_texture(
        TextureDesc {
            name: name.into(),
            width: 64,
            height: 64,
            bind_flags: BindFlags::SHADER_RESOURCE
                | BindFlags::RENDER_TARGET
                | BindFlags::DEPTH_STENCIL
                | BindFlags::UNORDERED_ACCESS,
        },
        state,
    )
}

pub fn buffer(device: &RenderDevice, name: &str, bind_flags: BindFlags) -> Arc<Buffer> {
    device.create_buffer(
        BufferDesc {
            name: name.into(),
            size: 1024,
            bind_flags,
        },
        ResourceState::UNDEFINED,
    )
}
