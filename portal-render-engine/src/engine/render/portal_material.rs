//! Unlit portal material with per-material colour, depth and stencil state.
use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::render::mesh::MeshVertexBufferLayoutRef;
use bevy::render::render_resource::{
    ColorWrites, Face, RenderPipelineDescriptor, SpecializedMeshPipelineError,
};
use bevy::{
    prelude::*,
    reflect::TypePath,
    render::render_resource::{AsBindGroup, ShaderRef},
};

use crate::engine::render::stencil::StencilConfig;

/// Which faces of a mesh are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MaterialSide {
    #[default]
    Front,
    Back,
    Double,
}

impl MaterialSide {
    fn cull_mode(self) -> Option<Face> {
        match self {
            MaterialSide::Front => Some(Face::Back),
            MaterialSide::Back => Some(Face::Front),
            MaterialSide::Double => None,
        }
    }
}

#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
#[bind_group_data(PortalMaterialKey)]
pub struct PortalMaterial {
    #[uniform(0)]
    pub colour: LinearRgba,

    #[uniform(1)]
    pub emissive: LinearRgba,

    pub alpha_mode: AlphaMode,
    pub side: MaterialSide,
    pub colour_write: bool,
    pub depth_write: bool,
    pub stencil: StencilConfig,
}

impl Default for PortalMaterial {
    fn default() -> Self {
        Self {
            colour: LinearRgba::WHITE,
            emissive: LinearRgba::BLACK,
            alpha_mode: AlphaMode::Opaque,
            side: MaterialSide::Front,
            colour_write: true,
            depth_write: true,
            stencil: StencilConfig::default(),
        }
    }
}

impl PortalMaterial {
    pub fn unlit(colour: Color) -> Self {
        let colour = colour.to_linear();
        let alpha_mode = if colour.alpha < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        };
        Self {
            colour,
            alpha_mode,
            ..default()
        }
    }

    pub fn with_emissive(mut self, colour: Color, intensity: f32) -> Self {
        self.emissive = colour.to_linear() * intensity;
        self
    }

    pub fn with_side(mut self, side: MaterialSide) -> Self {
        self.side = side;
        self
    }
}

/// Pipeline-relevant subset of [`PortalMaterial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortalMaterialKey {
    side: MaterialSide,
    colour_write: bool,
    depth_write: bool,
    stencil: StencilConfig,
}

impl From<&PortalMaterial> for PortalMaterialKey {
    fn from(material: &PortalMaterial) -> Self {
        Self {
            side: material.side,
            colour_write: material.colour_write,
            depth_write: material.depth_write,
            stencil: material.stencil,
        }
    }
}

impl Material for PortalMaterial {
    fn fragment_shader() -> ShaderRef {
        "shaders/portal_material.wgsl".into()
    }

    fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let data = key.bind_group_data;
        descriptor.primitive.cull_mode = data.side.cull_mode();

        if !data.colour_write {
            if let Some(fragment) = descriptor.fragment.as_mut() {
                for target in fragment.targets.iter_mut().flatten() {
                    target.write_mask = ColorWrites::empty();
                }
            }
        }

        if let Some(depth_stencil) = descriptor.depth_stencil.as_mut() {
            depth_stencil.depth_write_enabled &= data.depth_write;
            if depth_stencil.format.has_stencil_aspect() {
                depth_stencil.stencil = data.stencil.to_stencil_state();
            }
        }
        Ok(())
    }
}
