mod common;

use std::sync::Arc;

use proptest::prelude::*;
use strata_d3d11::{
    BindFlags, BindShaderResourcesFlags, DeviceObject, PipelineResourceLayoutDesc, RecordingContext, RenderDevice,
    ResourceCacheAllocator, ResourceMapping, ResourceState, SamplerDesc, ShaderResourceCache, ShaderResourceLayout,
    ShaderResources, ShaderStage, ShaderStages, ShaderVariableDesc, ShaderVariableType, ShaderVariableTypes,
    StateTransitionDesc, TextureViewType, TransitionMode,
};
use strata_dxbc::test_utils::RdefBuilder;
use strata_dxbc::ProgramType;

use common::{buffer, compute_pipeline, graphics_pipeline, texture};

fn variable_type() -> impl Strategy<Value = ShaderVariableType> {
    prop_oneof![
        Just(ShaderVariableType::Static),
        Just(ShaderVariableType::Mutable),
        Just(ShaderVariableType::Dynamic),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the bindings, committing the same binding object twice issues no native call
    /// the second time, and the committed table mirrors the cache.
    #[test]
    fn recommitting_unchanged_bindings_is_free(assignment in prop::collection::vec(prop::option::of(0usize..3), 1..8)) {
        let device = RenderDevice::default();
        let mut rdef = RdefBuilder::new(ProgramType::Pixel);
        for slot in 0..assignment.len() {
            rdef = rdef.constant_buffer(&format!("cb{slot}"), slot as u32);
        }
        let pso = graphics_pipeline(&device, "cbs", &rdef.build_dxbc(), vec![]);
        let pool: Vec<_> = (0..3)
            .map(|i| buffer(&device, &format!("pool{i}"), BindFlags::UNIFORM_BUFFER))
            .collect();

        let mut srb = pso.create_shader_resource_binding(true).unwrap();
        for (slot, choice) in assignment.iter().enumerate() {
            if let Some(choice) = choice {
                srb.variable_by_name(ShaderStage::Pixel, &format!("cb{slot}"))
                    .unwrap()
                    .set(Some(pool[*choice].clone().into()));
            }
        }

        let mut ctx = device.create_device_context(RecordingContext::new());
        ctx.set_pipeline_state(&pso);
        ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);

        let expected: Vec<_> = assignment
            .iter()
            .map(|choice| choice.map(|i| pool[i].native_handle()))
            .collect();
        let committed = ctx.committed_cbs(ShaderStage::Pixel);
        prop_assert_eq!(&committed[..], &expected[..committed.len()]);
        prop_assert!(expected[committed.len()..].iter().all(Option::is_none));

        ctx.native_mut().clear_calls();
        ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);
        prop_assert!(ctx.native().calls().is_empty());
    }

    /// After a texture enters the unordered-access state no committed shader-resource slot,
    /// render target or depth-stencil binding refers to it.
    #[test]
    fn unordered_access_excludes_inputs_and_outputs(
        reads in prop::collection::vec(0usize..4, 1..6),
        render_target in 0usize..4,
        depth in 0usize..4,
        target in 0usize..4,
    ) {
        prop_assume!(depth != render_target);
        let device = RenderDevice::default();
        let textures: Vec<_> = (0..4)
            .map(|i| texture(&device, &format!("tex{i}"), ResourceState::UNDEFINED))
            .collect();

        let mut rdef = RdefBuilder::new(ProgramType::Pixel);
        for slot in 0..reads.len() {
            rdef = rdef.texture(&format!("t{slot}"), slot as u32, 1);
        }
        let pso = graphics_pipeline(&device, "reads", &rdef.build_dxbc(), vec![]);
        let mut ctx = device.create_device_context(RecordingContext::new());

        let rtv = device.create_texture_view(&textures[render_target], TextureViewType::RenderTarget, "rtv");
        let dsv = device.create_texture_view(&textures[depth], TextureViewType::DepthStencil, "dsv");
        ctx.set_render_targets(&[Some(rtv.clone())], Some(dsv.clone()), TransitionMode::Transition);

        let mut mapping = ResourceMapping::new();
        for (slot, &tex) in reads.iter().enumerate() {
            mapping.add(
                &format!("t{slot}"),
                device.create_texture_view(&textures[tex], TextureViewType::ShaderResource, format!("srv{slot}")),
                false,
            );
        }
        let mut srb = pso.create_shader_resource_binding(true).unwrap();
        srb.bind_resources(ShaderStages::PIXEL, &mapping, BindShaderResourcesFlags::UPDATE_ALL);
        ctx.set_pipeline_state(&pso);
        ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);

        let victim = &textures[target];
        ctx.transition_resource_states(&[StateTransitionDesc::texture(victim.clone(), ResourceState::UNORDERED_ACCESS)]);
        prop_assert_eq!(victim.state(), ResourceState::UNORDERED_ACCESS);

        let srv_handles: Vec<_> = reads
            .iter()
            .enumerate()
            .filter(|(_, &tex)| tex == target)
            .filter_map(|(slot, _)| srb_view_handle(&ctx, slot))
            .collect();
        prop_assert!(srv_handles.is_empty());

        let rendered = ctx
            .bound_render_targets()
            .iter()
            .flatten()
            .any(|view| Arc::ptr_eq(view.texture(), victim));
        prop_assert!(!rendered);
        prop_assert!(ctx.bound_depth_stencil().map_or(true, |view| !Arc::ptr_eq(view.texture(), victim)));
        if target == render_target {
            prop_assert!(!ctx.native().render_targets().contains(&Some(rtv.native_handle())));
        }
        if target == depth {
            prop_assert_ne!(ctx.native().depth_stencil(), Some(dsv.native_handle()));
        }
        #[cfg(feature = "development")]
        prop_assert!(ctx.dbg_verify_committed_state());
    }

    /// Binding a combined texture array also fills its sampler slots: one slot per element for
    /// a sampler array, or the single shared slot.
    #[test]
    fn combined_samplers_follow_their_textures(array_size in 1u32..5, shared in any::<bool>()) {
        let device = RenderDevice::default();
        let sampler_count = if shared { 1 } else { array_size };
        let bytecode = RdefBuilder::new(ProgramType::Pixel)
            .sampler("tex_sampler", 0, sampler_count)
            .texture("tex", 0, array_size)
            .build_dxbc();
        let resources = Arc::new(ShaderResources::from_bytecode(&bytecode, "ps", Some("_sampler")).unwrap());
        let allocator = Arc::new(ResourceCacheAllocator::new("property"));
        let mut cache = ShaderResourceCache::new();
        let desc = PipelineResourceLayoutDesc {
            default_variable_type: ShaderVariableType::Dynamic,
            ..Default::default()
        };
        let layout = ShaderResourceLayout::new(resources, &desc, ShaderVariableTypes::DYNAMIC, &mut cache, &allocator).unwrap();

        let samplers: Vec<_> = (0..array_size)
            .map(|_| device.create_sampler(SamplerDesc::default()))
            .collect();
        let views: Vec<Option<DeviceObject>> = samplers
            .iter()
            .enumerate()
            .map(|(i, sampler)| {
                let tex = texture(&device, &format!("tex{i}"), ResourceState::SHADER_RESOURCE);
                let view = device.create_texture_view(&tex, TextureViewType::ShaderResource, format!("srv{i}"));
                view.set_sampler(Some(sampler.clone()));
                Some(view.into())
            })
            .collect();
        layout.variable_by_name(&mut cache, "tex").unwrap().set_array(0, &views);

        let expected: Vec<_> = if shared {
            vec![samplers.last().map(|s| s.native_handle())]
        } else {
            samplers.iter().map(|s| Some(s.native_handle())).collect()
        };
        prop_assert_eq!(cache.sampler_handles(), expected.as_slice());
        prop_assert_eq!(cache.srv_handles().iter().flatten().count(), array_size as usize);

        cache.destroy();
    }

    /// A layout built for a set of variable types holds exactly the resources reflection
    /// counts for that set.
    #[test]
    fn layout_matches_reflected_counts(
        types in prop::collection::vec(variable_type(), 4),
        default_type in variable_type(),
        allowed_bits in 1u32..8,
    ) {
        let bytecode = RdefBuilder::new(ProgramType::Compute)
            .constant_buffer("params", 0)
            .texture("input", 0, 2)
            .sampler("linear", 0, 1)
            .rw_texture("output", 1)
            .build_dxbc();
        let resources = Arc::new(ShaderResources::from_bytecode(&bytecode, "cs", None).unwrap());
        let names = ["params", "input", "linear", "output"];
        let desc = PipelineResourceLayoutDesc {
            default_variable_type: default_type,
            variables: names
                .iter()
                .zip(&types)
                .map(|(name, ty)| ShaderVariableDesc::new(ShaderStages::COMPUTE, *name, *ty))
                .collect(),
            immutable_samplers: vec![],
        };
        let allowed = ShaderVariableTypes::from_bits_truncate(allowed_bits);

        let allocator = Arc::new(ResourceCacheAllocator::new("property"));
        let mut cache = ShaderResourceCache::new();
        let layout = ShaderResourceLayout::new(resources.clone(), &desc, allowed, &mut cache, &allocator).unwrap();

        let expected = resources.count_resources(&desc, allowed, false);
        prop_assert_eq!(layout.counters(), expected);
        prop_assert_eq!(layout.variable_count(), expected.total());
        prop_assert!(cache.slot_counts().fits_d3d11_limits());

        cache.destroy();
    }
}

fn srb_view_handle(ctx: &strata_d3d11::DeviceContext<RecordingContext>, slot: usize) -> Option<strata_d3d11::NativeHandle> {
    ctx.committed_srvs(ShaderStage::Pixel).get(slot).copied().flatten()
}

#[test]
fn compute_uav_pass_runs_before_inputs_for_every_stage_order() {
    let device = RenderDevice::default();
    let cs = RdefBuilder::new(ProgramType::Compute)
        .structured_buffer("src", 0)
        .rw_structured_buffer("dst", 0)
        .build_dxbc();
    let pso = compute_pipeline(&device, "copy", &cs);
    let mut ctx = device.create_device_context(RecordingContext::new());

    let a = buffer(&device, "a", BindFlags::SHADER_RESOURCE | BindFlags::UNORDERED_ACCESS);
    let b = buffer(&device, "b", BindFlags::SHADER_RESOURCE | BindFlags::UNORDERED_ACCESS);
    ctx.set_pipeline_state(&pso);

    // Ping-pong: each pass reads the buffer the previous pass wrote.
    for (src, dst) in [(&a, &b), (&b, &a), (&a, &b)] {
        let mut mapping = ResourceMapping::new();
        mapping.add(
            "src",
            device.create_buffer_view(src, strata_d3d11::BufferViewType::ShaderResource, "src"),
            false,
        );
        mapping.add(
            "dst",
            device.create_buffer_view(dst, strata_d3d11::BufferViewType::UnorderedAccess, "dst"),
            false,
        );
        let mut srb = pso.create_shader_resource_binding(true).unwrap();
        srb.bind_resources(ShaderStages::COMPUTE, &mapping, BindShaderResourcesFlags::UPDATE_ALL);
        ctx.commit_shader_resources(Some(&srb), TransitionMode::Transition);

        assert!(dst.check_state(ResourceState::UNORDERED_ACCESS));
        assert!(src.check_state(ResourceState::SHADER_RESOURCE));
        assert!(!src.check_state(ResourceState::UNORDERED_ACCESS));
        assert_eq!(ctx.committed_uavs(ShaderStage::Compute).len(), 1);
        assert_eq!(ctx.committed_srvs(ShaderStage::Compute).len(), 1);
        #[cfg(feature = "development")]
        assert!(ctx.dbg_verify_committed_state());
    }
}
