//! Bind group layout for the effect harness.

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, BindingType, Device, ShaderStages};

/// `screen_texture` in the harness prelude.
pub const SCREEN_TEXTURE_BINDING: u32 = 0;
/// `screen_sampler` in the harness prelude.
pub const SCREEN_SAMPLER_BINDING: u32 = 1;
/// `harness_uniforms` in the harness prelude.
pub const UNIFORMS_BINDING: u32 = 2;

fn entry(binding: u32, visibility: ShaderStages, ty: BindingType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty,
        count: None,
    }
}

/// Entries for group 0, in binding order.
pub fn effect_layout_entries() -> [BindGroupLayoutEntry; 3] {
    [
        entry(
            SCREEN_TEXTURE_BINDING,
            ShaderStages::FRAGMENT,
            BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        ),
        entry(
            SCREEN_SAMPLER_BINDING,
            ShaderStages::FRAGMENT,
            BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        ),
        entry(
            UNIFORMS_BINDING,
            ShaderStages::FRAGMENT,
            BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<super::harness::HarnessUniforms>() as u64,
                ),
            },
        ),
    ]
}

pub fn create_effect_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("effect_bind_group_layout"),
        entries: &effect_layout_entries(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::DEFAULT_EFFECT_SOURCE;
    use crate::gpu::{harness, GpuContext};

    #[test]
    fn test_entries_cover_prelude_bindings() {
        let effect = harness::validate_effect(DEFAULT_EFFECT_SOURCE).unwrap();
        let mut declared: Vec<_> = effect
            .module
            .global_variables
            .iter()
            .filter_map(|(_, global)| global.binding.as_ref())
            .map(|binding| (binding.group, binding.binding))
            .collect();
        declared.sort_unstable();

        let provided: Vec<_> = effect_layout_entries()
            .iter()
            .map(|entry| (0, entry.binding))
            .collect();
        assert_eq!(declared, provided);
    }

    #[tokio::test]
    async fn test_effect_layout_creation() {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return, // Skip if no GPU
        };

        let _layout = create_effect_layout(&ctx.device);
    }
}
