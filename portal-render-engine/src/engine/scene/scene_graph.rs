
use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use serde::Serialize;

use constants::render_settings::{INSIDE_LAYER, OUTSIDE_LAYER};
use constants::room::ROOM_LOCAL_OFFSET;

use crate::engine::camera::portal_camera::CameraState;
use crate::portal::placement::PortalAnchor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneLayer {
    Outside,
    Inside,
}

impl SceneLayer {
    pub fn render_layers(self) -> RenderLayers {
        match self {
            SceneLayer::Outside => RenderLayers::layer(OUTSIDE_LAYER),
            SceneLayer::Inside => RenderLayers::layer(INSIDE_LAYER),
        }
    }
}

#[derive(Component)]
pub struct OutsideCamera;

#[derive(Component)]
pub struct InsideCamera;

/// Root of the ring, glow and aperture meshes.
#[derive(Component)]
pub struct PortalGroup;

#[derive(Component)]
pub struct PortalAperture;

#[derive(Component)]
pub struct InsideRoomRoot;

/// Camera, anchor and per-frame visibility shared by every portal system.
#[derive(Resource, Debug, Clone)]
pub struct SceneGraph {
    pub camera: CameraState,
    anchor: PortalAnchor,
    pub portal_scale: Vec3,
    pub aperture_visible: bool,
    viewport: Option<Vec2>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            camera: CameraState::default(),
            anchor: PortalAnchor::default(),
            portal_scale: Vec3::ONE,
            aperture_visible: false,
            viewport: None,
        }
    }
}

impl SceneGraph {
    pub fn anchor(&self) -> &PortalAnchor {
        &self.anchor
    }

    pub fn set_anchor(&mut self, anchor: PortalAnchor) {
        self.anchor = anchor;
    }

    pub fn viewport(&self) -> Option<Vec2> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Vec2) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        self.viewport = Some(viewport);
        self.camera.set_viewport(viewport);
    }

    pub fn portal_transform(&self) -> Transform {
        self.anchor.transform().with_scale(self.portal_scale)
    }

    /// The room sits behind the ring, opposite the anchor normal.
    pub fn room_transform(&self) -> Transform {
        let rotation = self.anchor.orientation;
        Transform::from_translation(self.anchor.position + rotation * ROOM_LOCAL_OFFSET)
            .with_rotation(rotation)
    }
}

/// Mirrors the scene graph onto the Bevy entities.
pub fn sync_scene_transforms(
    scene: Res<SceneGraph>,
    mut cameras: Query<
        &mut Transform,
        (
            Or<(With<OutsideCamera>, With<InsideCamera>)>,
            Without<PortalGroup>,
            Without<InsideRoomRoot>,
        ),
    >,
    mut portals: Query<
        &mut Transform,
        (With<PortalGroup>, Without<Camera>, Without<InsideRoomRoot>),
    >,
    mut rooms: Query<&mut Transform, (With<InsideRoomRoot>, Without<Camera>, Without<PortalGroup>)>,
) {
    if !scene.is_changed() {
        return;
    }
    let camera = scene.camera.transform();
    for mut transform in cameras.iter_mut() {
        *transform = camera;
    }
    let portal = scene.portal_transform();
    for mut transform in portals.iter_mut() {
        *transform = portal;
    }
    let room = scene.room_transform();
    for mut transform in rooms.iter_mut() {
        *transform = room;
    }
}
