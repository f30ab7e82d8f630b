use bevy::prelude::*;

use constants::render_settings::{
    APERTURE_DEPTH_OFFSET, PORTAL_COLOUR, PORTAL_EMISSIVE_INTENSITY, PORTAL_GLOW_OPACITY,
    PORTAL_RADIUS, PORTAL_SEGMENTS, PORTAL_THICKNESS,
};

use crate::engine::render::compositor::OwnedContent;
use crate::engine::render::portal_material::{MaterialSide, PortalMaterial};
use crate::engine::scene::scene_graph::{PortalAperture, PortalGroup, SceneGraph, SceneLayer};

pub struct PortalRing {
    pub root: Entity,
    pub aperture_material: Handle<PortalMaterial>,
    pub owned: OwnedContent,
}

/// Ring, outer glow and the stencil aperture, all on the outside layer.
pub fn spawn_portal_ring(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<PortalMaterial>,
    scene: &SceneGraph,
) -> PortalRing {
    let inner_radius = PORTAL_RADIUS - PORTAL_THICKNESS;
    let ring_mesh = meshes.add(
        Annulus::new(inner_radius, PORTAL_RADIUS)
            .mesh()
            .resolution(PORTAL_SEGMENTS),
    );
    let ring_material = materials.add(
        PortalMaterial::unlit(PORTAL_COLOUR)
            .with_emissive(PORTAL_COLOUR, PORTAL_EMISSIVE_INTENSITY)
            .with_side(MaterialSide::Double),
    );

    let glow_mesh = meshes.add(
        Annulus::new(PORTAL_RADIUS, PORTAL_RADIUS + PORTAL_THICKNESS * 0.75)
            .mesh()
            .resolution(PORTAL_SEGMENTS),
    );
    let glow_material = materials.add(
        PortalMaterial::unlit(PORTAL_COLOUR.with_alpha(PORTAL_GLOW_OPACITY))
            .with_side(MaterialSide::Double),
    );

    let aperture_mesh = meshes.add(
        Circle::new(PORTAL_RADIUS - PORTAL_THICKNESS * 0.5)
            .mesh()
            .resolution(PORTAL_SEGMENTS),
    );
    let aperture_material = materials.add(
        PortalMaterial::unlit(PORTAL_COLOUR).with_side(MaterialSide::Double),
    );

    let layer = SceneLayer::Outside.render_layers();
    let root = commands
        .spawn((
            scene.portal_transform(),
            Visibility::default(),
            PortalGroup,
            Name::new("PortalRing"),
        ))
        .with_children(|parent| {
            parent.spawn((
                Mesh3d(aperture_mesh.clone()),
                MeshMaterial3d(aperture_material.clone()),
                Transform::from_xyz(0.0, 0.0, APERTURE_DEPTH_OFFSET),
                Visibility::Hidden,
                layer.clone(),
                PortalAperture,
            ));
            parent.spawn((
                Mesh3d(ring_mesh.clone()),
                MeshMaterial3d(ring_material.clone()),
                layer.clone(),
            ));
            parent.spawn((
                Mesh3d(glow_mesh.clone()),
                MeshMaterial3d(glow_material.clone()),
                layer.clone(),
            ));
        })
        .id();

    PortalRing {
        root,
        aperture_material: aperture_material.clone(),
        owned: OwnedContent {
            meshes: vec![ring_mesh, glow_mesh, aperture_mesh],
            materials: vec![ring_material, glow_material, aperture_material],
        },
    }
}
