use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use constants::placement::{
    DEFAULT_ANCHOR_POSITION, HIT_TEST_BACKWARD, PLACEMENT_STANDOFF_DISTANCE,
    PLANE_PARALLEL_EPSILON, WALKABLE_MAX_HEIGHT, WALKABLE_MIN_HEIGHT,
};

use crate::engine::camera::portal_camera::CameraState;
use crate::portal::tracking::HitPose;

/// World pose of the portal ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalAnchor {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for PortalAnchor {
    fn default() -> Self {
        Self::facing(DEFAULT_ANCHOR_POSITION, Vec3::Z)
    }
}

impl PortalAnchor {
    /// Anchor at `position` whose local +Z points along `normal`.
    pub fn facing(position: Vec3, normal: Vec3) -> Self {
        let normal = normal.try_normalize().unwrap_or(Vec3::NEG_Z);
        Self {
            position,
            orientation: Quat::from_rotation_arc(Vec3::Z, normal),
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(self.orientation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    PointerPlane,
    WorldHitTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub standoff_distance: f32,
    pub min_height: f32,
    pub max_height: f32,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            standoff_distance: PLACEMENT_STANDOFF_DISTANCE,
            min_height: WALKABLE_MIN_HEIGHT,
            max_height: WALKABLE_MAX_HEIGHT,
        }
    }
}

/// Fired once per placement.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PortalPlaced {
    pub anchor: PortalAnchor,
    pub mode: PlacementMode,
}

#[derive(Resource, Debug, Clone)]
pub struct PlacementResolver {
    mode: PlacementMode,
    settings: PlacementSettings,
    placed: bool,
}

impl PlacementResolver {
    pub fn new(mode: PlacementMode) -> Self {
        Self {
            mode,
            settings: PlacementSettings::default(),
            placed: false,
        }
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PlacementSettings) {
        self.settings = settings;
    }

    /// Screen pixels (top-left origin) to an anchor on the camera-facing standoff plane.
    pub fn resolve_from_pointer(
        &self,
        screen: Vec2,
        viewport: Vec2,
        camera: &CameraState,
    ) -> Option<PortalAnchor> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        let ndc = Vec2::new(
            screen.x / viewport.x * 2.0 - 1.0,
            -(screen.y / viewport.y * 2.0 - 1.0),
        );
        let ray = camera.ray_from_ndc(ndc)?;
        self.place_on_standoff_plane(&ray, camera.position(), camera.forward())
    }

    /// Intersects `ray` with the plane `standoff` metres ahead of `eye` along `forward`.
    pub fn place_on_standoff_plane(
        &self,
        ray: &Ray3d,
        eye: Vec3,
        forward: Vec3,
    ) -> Option<PortalAnchor> {
        let plane_point = eye + forward * self.settings.standoff_distance;
        let distance = ray_plane_distance(ray, plane_point, -forward)?;
        let mut hit = ray.origin + *ray.direction * distance;
        hit.y = hit.y.clamp(self.settings.min_height, self.settings.max_height);
        Some(PortalAnchor::facing(hit, forward))
    }

    pub fn resolve_from_hit_test(&self, hit: &HitPose) -> PortalAnchor {
        PortalAnchor::facing(hit.position, hit.orientation * HIT_TEST_BACKWARD)
    }

    /// Single-write pointer placement. A miss leaves the resolver unplaced.
    pub fn place_from_pointer(
        &mut self,
        screen: Vec2,
        viewport: Vec2,
        camera: &CameraState,
    ) -> Option<PortalAnchor> {
        if self.placed {
            return None;
        }
        let anchor = self.resolve_from_pointer(screen, viewport, camera)?;
        self.placed = true;
        Some(anchor)
    }

    /// First hit of the first non-empty frame wins; everything after is ignored.
    pub fn accept_hit_results(&mut self, hits: &[HitPose]) -> Option<PortalAnchor> {
        if self.placed {
            return None;
        }
        let anchor = self.resolve_from_hit_test(hits.first()?);
        self.placed = true;
        Some(anchor)
    }

    pub fn reset_for_session(&mut self) {
        self.placed = false;
    }
}

fn ray_plane_distance(ray: &Ray3d, plane_point: Vec3, plane_normal: Vec3) -> Option<f32> {
    let denominator = plane_normal.dot(*ray.direction);
    if denominator.abs() < PLANE_PARALLEL_EPSILON {
        return None;
    }
    let t = (plane_point - ray.origin).dot(plane_normal) / denominator;
    (t >= 0.0).then_some(t)
}
