use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;

use constants::render_settings::PORTAL_COLOUR;
use constants::room::{
    FLOOR_COLOUR, FLOOR_RADIUS, PANEL_COLOUR, PANEL_HEIGHT, PANEL_SIZE, ROOM_SIZE,
    ROOM_WALL_COLOUR, STRIP_HEIGHT, STRIP_INSET, STRIP_OPACITY,
};

use crate::engine::render::compositor::OwnedContent;
use crate::engine::render::depth_mask::{create_mask_mesh, ApertureDepthMask};
use crate::engine::render::portal_material::{MaterialSide, PortalMaterial};
use crate::engine::scene::scene_graph::{InsideRoomRoot, SceneGraph, SceneLayer};

pub struct InsideRoom {
    pub root: Entity,
    /// Materials that only show through the aperture while outside.
    pub masked_materials: Vec<Handle<PortalMaterial>>,
    pub owned: OwnedContent,
}

/// Themed room on the inside layer, plus the depth mask that clips it to the aperture.
pub fn spawn_inside_room(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<PortalMaterial>,
    scene: &SceneGraph,
) -> InsideRoom {
    let layer = SceneLayer::Inside.render_layers();

    let room_mesh = meshes.add(Cuboid::new(ROOM_SIZE.x, ROOM_SIZE.y, ROOM_SIZE.z));
    let room_material =
        materials.add(PortalMaterial::unlit(ROOM_WALL_COLOUR).with_side(MaterialSide::Back));

    let strip_mesh = meshes.add(Rectangle::new(ROOM_SIZE.x, STRIP_HEIGHT));
    let strip_material = materials.add(
        PortalMaterial::unlit(PORTAL_COLOUR.with_alpha(STRIP_OPACITY)).with_side(MaterialSide::Double),
    );

    let panel_mesh = meshes.add(Rectangle::new(PANEL_SIZE.0, PANEL_SIZE.1));
    let panel_material = materials.add(PortalMaterial::unlit(PANEL_COLOUR));

    let floor_mesh = meshes.add(Circle::new(FLOOR_RADIUS).mesh().resolution(64));
    let floor_material =
        materials.add(PortalMaterial::unlit(FLOOR_COLOUR).with_side(MaterialSide::Double));

    let strip_z = -ROOM_SIZE.z / 4.0;
    let strip_y = ROOM_SIZE.y / 2.0 - STRIP_INSET;

    let root = commands
        .spawn((
            scene.room_transform(),
            Visibility::default(),
            InsideRoomRoot,
            Name::new("InsideRoom"),
        ))
        .with_children(|parent| {
            parent.spawn((
                Mesh3d(room_mesh.clone()),
                MeshMaterial3d(room_material.clone()),
                layer.clone(),
            ));
            for y in [strip_y, -strip_y] {
                parent.spawn((
                    Mesh3d(strip_mesh.clone()),
                    MeshMaterial3d(strip_material.clone()),
                    Transform::from_xyz(0.0, y, strip_z),
                    layer.clone(),
                ));
            }
            parent.spawn((
                Mesh3d(panel_mesh.clone()),
                MeshMaterial3d(panel_material.clone()),
                Transform::from_xyz(0.0, PANEL_HEIGHT, -ROOM_SIZE.z / 2.0 + 0.05),
                layer.clone(),
            ));
            parent.spawn((
                Mesh3d(floor_mesh.clone()),
                MeshMaterial3d(floor_material.clone()),
                Transform::from_xyz(0.0, -ROOM_SIZE.y / 2.0 + 0.02, -2.0)
                    .with_rotation(Quat::from_rotation_x(-FRAC_PI_2)),
                layer.clone(),
            ));
        })
        .id();

    let mask_mesh = meshes.add(create_mask_mesh());
    let mask_material = materials.add(PortalMaterial {
        colour_write: false,
        side: MaterialSide::Double,
        ..default()
    });
    commands.spawn((
        Mesh3d(mask_mesh.clone()),
        MeshMaterial3d(mask_material.clone()),
        Transform::IDENTITY,
        Visibility::Hidden,
        NoFrustumCulling,
        layer,
        ApertureDepthMask {
            mesh: mask_mesh.clone(),
        },
        Name::new("ApertureDepthMask"),
    ));

    let masked_materials = vec![
        room_material.clone(),
        strip_material.clone(),
        panel_material.clone(),
        floor_material.clone(),
    ];
    InsideRoom {
        root,
        masked_materials,
        owned: OwnedContent {
            meshes: vec![room_mesh, strip_mesh, panel_mesh, floor_mesh, mask_mesh],
            materials: vec![
                room_material,
                strip_material,
                panel_material,
                floor_material,
                mask_material,
            ],
        },
    }
}
