#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
#[cfg(not(target_arch = "wasm32"))]
use strata_d3d11::{
    BindFlags, BindShaderResourcesFlags, BufferDesc, GraphicsPipelineDesc, PipelineResourceLayoutDesc,
    PipelineState, RecordingContext, RenderDevice, ResourceMapping, ResourceState, SamplerDesc, ShaderCreateInfo,
    ShaderStage, ShaderStages, ShaderVariableType, TextureDesc, TextureViewType, TransitionMode,
};
#[cfg(not(target_arch = "wasm32"))]
use strata_dxbc::test_utils::RdefBuilder;
#[cfg(not(target_arch = "wasm32"))]
use strata_dxbc::ProgramType;

/// A pixel shader with `n` constant buffers, `n` combined textures and a UAV, plus the mapping
/// that resolves all of them.
#[cfg(not(target_arch = "wasm32"))]
fn setup(device: &RenderDevice, n: u32) -> (Arc<PipelineState>, ResourceMapping) {
    let mut ps = RdefBuilder::new(ProgramType::Pixel).rw_texture("out", 1);
    for i in 0..n {
        ps = ps
            .constant_buffer(&format!("cb{i}"), i)
            .sampler(&format!("tex{i}_sampler"), i, 1)
            .texture(&format!("tex{i}"), i, 1);
    }
    let vs = RdefBuilder::new(ProgramType::Vertex).build_dxbc();
    let ps = ps.build_dxbc();

    let info = ShaderCreateInfo::new("ps", ShaderStage::Pixel, &ps).with_combined_sampler_suffix("_sampler");
    let desc = GraphicsPipelineDesc {
        name: "bench".into(),
        resource_layout: PipelineResourceLayoutDesc {
            default_variable_type: ShaderVariableType::Mutable,
            ..Default::default()
        },
        vertex_shader: Some(
            device
                .create_shader(&ShaderCreateInfo::new("vs", ShaderStage::Vertex, &vs))
                .unwrap(),
        ),
        pixel_shader: Some(device.create_shader(&info).unwrap()),
        ..Default::default()
    };
    let pso = Arc::new(device.create_graphics_pipeline_state(desc).unwrap());

    let mut mapping = ResourceMapping::new();
    let sampler = device.create_sampler(SamplerDesc::default());
    for i in 0..n {
        let cb = device.create_buffer(
            BufferDesc {
                name: format!("cb{i}"),
                size: 256,
                bind_flags: BindFlags::UNIFORM_BUFFER,
            },
            ResourceState::UNDEFINED,
        );
        mapping.add(&format!("cb{i}"), cb, false);

        let tex = device.create_texture(
            TextureDesc {
                name: format!("tex{i}"),
                width: 256,
                height: 256,
                bind_flags: BindFlags::SHADER_RESOURCE,
            },
            ResourceState::UNDEFINED,
        );
        let view = device.create_texture_view(&tex, TextureViewType::ShaderResource, format!("tex{i}"));
        view.set_sampler(Some(sampler.clone()));
        mapping.add(&format!("tex{i}"), view, false);
    }
    let out = device.create_texture(
        TextureDesc {
            name: "out".into(),
            width: 256,
            height: 256,
            bind_flags: BindFlags::UNORDERED_ACCESS,
        },
        ResourceState::UNDEFINED,
    );
    mapping.add(
        "out",
        device.create_texture_view(&out, TextureViewType::UnorderedAccess, "out"),
        false,
    );

    (pso, mapping)
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_commit(c: &mut Criterion) {
    let device = RenderDevice::default();
    let mut group = c.benchmark_group("shader_resource_commit");

    for n in [1u32, 4, 14] {
        let (pso, mapping) = setup(&device, n);

        // --- bind: resolve every variable through the mapping ---
        group.bench_with_input(BenchmarkId::new("bind", n), &mapping, |b, mapping| {
            let mut srb = pso.create_shader_resource_binding(true).unwrap();
            b.iter(|| {
                srb.bind_resources(
                    ShaderStages::PIXEL,
                    black_box(mapping),
                    BindShaderResourcesFlags::UPDATE_ALL,
                );
            })
        });

        let mut srb = pso.create_shader_resource_binding(true).unwrap();
        srb.bind_resources(ShaderStages::PIXEL, &mapping, BindShaderResourcesFlags::UPDATE_ALL);

        // --- recommit: nothing changed, so no native call is issued ---
        group.bench_function(BenchmarkId::new("recommit", n), |b| {
            let mut ctx = device.create_device_context(RecordingContext::without_call_log());
            ctx.set_pipeline_state(&pso);
            ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);
            b.iter(|| ctx.commit_shader_resources(Some(black_box(&srb)), TransitionMode::Transition))
        });

        // --- cold: every commit starts from an invalidated context ---
        group.bench_function(BenchmarkId::new("cold", n), |b| {
            let mut ctx = device.create_device_context(RecordingContext::without_call_log());
            b.iter(|| {
                ctx.invalidate_state();
                ctx.set_pipeline_state(&pso);
                ctx.commit_shader_resources(Some(black_box(&srb)), TransitionMode::Transition);
            })
        });

        // --- verify: only checks states, never transitions ---
        group.bench_function(BenchmarkId::new("verify", n), |b| {
            let mut ctx = device.create_device_context(RecordingContext::without_call_log());
            ctx.set_pipeline_state(&pso);
            ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);
            b.iter(|| ctx.commit_shader_resources(Some(black_box(&srb)), TransitionMode::Verify))
        });
    }

    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_commit);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
