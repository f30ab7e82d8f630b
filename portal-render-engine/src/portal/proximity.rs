use bevy::prelude::*;
use serde::Deserialize;

use constants::interaction::PROXIMITY_NDC_THRESHOLD;

use crate::engine::camera::portal_camera::CameraState;
use crate::portal::placement::PortalAnchor;
use crate::portal::state_machine::PortalState;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    pub ndc_threshold: f32,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            ndc_threshold: PROXIMITY_NDC_THRESHOLD,
        }
    }
}

/// One-shot trigger that fires when the portal looks big enough on screen.
#[derive(Resource, Debug, Clone)]
pub struct ProximityDetector {
    settings: ProximitySettings,
    armed: bool,
}

impl Default for ProximityDetector {
    fn default() -> Self {
        Self {
            settings: ProximitySettings::default(),
            armed: true,
        }
    }
}

impl ProximityDetector {
    pub fn set_settings(&mut self, settings: ProximitySettings) {
        self.settings = settings;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Vertical NDC distance between the anchor and a point `scale_y` above it.
    pub fn apparent_extent(camera: &CameraState, anchor: &PortalAnchor, scale_y: f32) -> f32 {
        let centre = camera.project(anchor.position);
        let top = camera.project(anchor.position + Vec3::new(0.0, scale_y, 0.0));
        (top.y - centre.y).abs()
    }

    /// Returns true exactly once per arming when the extent crosses the threshold.
    pub fn evaluate(
        &mut self,
        state: PortalState,
        camera: &CameraState,
        anchor: &PortalAnchor,
        scale_y: f32,
    ) -> bool {
        if state != PortalState::Outside || !self.armed {
            return false;
        }
        let extent = Self::apparent_extent(camera, anchor, scale_y);
        if extent <= self.settings.ndc_threshold {
            return false;
        }
        debug!("Portal proximity triggered at NDC extent {:.3}", extent);
        self.armed = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_6;

    fn square_camera() -> CameraState {
        let mut camera = CameraState::default();
        camera.set_pose_parts(Vec3::ZERO, Quat::IDENTITY);
        camera.set_viewport(Vec2::splat(512.0));
        camera
    }

    /// Distance at which a unit-tall portal spans 0.5 NDC vertically.
    fn half_extent_distance() -> f32 {
        2.0 / FRAC_PI_6.tan()
    }

    #[test]
    fn fires_once_until_rearmed() {
        let camera = square_camera();
        let anchor = PortalAnchor::facing(Vec3::new(0.0, 0.0, -half_extent_distance()), Vec3::Z);
        let extent = ProximityDetector::apparent_extent(&camera, &anchor, 1.0);
        assert!((extent - 0.5).abs() < 1e-4);

        let mut detector = ProximityDetector::default();
        assert!(detector.evaluate(PortalState::Outside, &camera, &anchor, 1.0));
        assert!(!detector.evaluate(PortalState::Outside, &camera, &anchor, 1.0));
        assert!(!detector.evaluate(PortalState::Inside, &camera, &anchor, 1.0));

        detector.rearm();
        assert!(detector.evaluate(PortalState::Outside, &camera, &anchor, 1.0));
    }

    #[test]
    fn far_portal_does_not_fire() {
        let camera = square_camera();
        let anchor = PortalAnchor::facing(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        let mut detector = ProximityDetector::default();
        assert!(!detector.evaluate(PortalState::Outside, &camera, &anchor, 1.0));
        assert!(detector.is_armed());
    }

    #[test]
    fn only_evaluates_outside() {
        let camera = square_camera();
        let anchor = PortalAnchor::facing(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);
        let mut detector = ProximityDetector::default();
        assert!(!detector.evaluate(PortalState::Entering, &camera, &anchor, 1.0));
        assert!(detector.is_armed());
    }
}
