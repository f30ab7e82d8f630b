use bevy::math::EulerRot;
use bevy::prelude::*;
use serde::Deserialize;

use constants::interaction::{
    CAMERA_START_POSITION, INSIDE_DEPTH_OFFSET, INSIDE_EYE_HEIGHT, MANUAL_PITCH_LIMIT,
    MANUAL_PITCH_SENSITIVITY, MANUAL_YAW_SENSITIVITY, ORIENTATION_BLEND,
    ORIENTATION_PITCH_SCALE, POSITION_LERP_RATE,
};
use constants::render_settings::{CAMERA_FAR, CAMERA_FOV_DEGREES, CAMERA_NEAR};

use crate::engine::systems::input::OrientationSample;
use crate::portal::placement::PortalAnchor;
use crate::portal::state_machine::PortalState;

/// Yaw-then-pitch pose with zero roll, recomputed every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub yaw: f32,
    pub pitch: f32,
    pub position: Vec3,
}

impl CameraPose {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }
}

/// The shared scene camera: world pose plus perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    position: Vec3,
    rotation: Quat,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: CAMERA_START_POSITION,
            rotation: Quat::IDENTITY,
            fov_y: CAMERA_FOV_DEGREES.to_radians(),
            aspect: 1.0,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
        }
    }
}

impl CameraState {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn set_pose(&mut self, pose: &CameraPose) {
        self.set_pose_parts(pose.position, pose.rotation());
    }

    pub fn set_pose_parts(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn set_viewport(&mut self, viewport: Vec2) {
        if viewport.x > 0.0 && viewport.y > 0.0 {
            self.aspect = viewport.x / viewport.y;
        }
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(self.rotation)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        let view = Mat4::from_rotation_translation(self.rotation, self.position).inverse();
        self.projection_matrix() * view
    }

    /// World point to normalized device coordinates.
    pub fn project(&self, world: Vec3) -> Vec3 {
        self.view_projection().project_point3(world)
    }

    /// Ray from the eye through an NDC point, `None` for degenerate input.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Option<Ray3d> {
        if !ndc.is_finite() {
            return None;
        }
        let through = self
            .view_projection()
            .inverse()
            .project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        let direction = Dir3::new(through - self.position).ok()?;
        Some(Ray3d::new(self.position, direction))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub orientation_blend: f32,
    pub pitch_scale: f32,
    pub yaw_sensitivity: f32,
    pub pitch_sensitivity: f32,
    pub pitch_limit: f32,
    pub start_position: [f32; 3],
    pub inside_depth_offset: f32,
    pub inside_eye_height: f32,
    pub position_lerp_rate: f32,
    pub fov_degrees: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            orientation_blend: ORIENTATION_BLEND,
            pitch_scale: ORIENTATION_PITCH_SCALE,
            yaw_sensitivity: MANUAL_YAW_SENSITIVITY,
            pitch_sensitivity: MANUAL_PITCH_SENSITIVITY,
            pitch_limit: MANUAL_PITCH_LIMIT,
            start_position: CAMERA_START_POSITION.to_array(),
            inside_depth_offset: INSIDE_DEPTH_OFFSET,
            inside_eye_height: INSIDE_EYE_HEIGHT,
            position_lerp_rate: POSITION_LERP_RATE,
            fov_degrees: CAMERA_FOV_DEGREES,
        }
    }
}

/// Blends device orientation or manual drag into the camera pose.
#[derive(Resource, Debug, Clone)]
pub struct CameraController {
    settings: CameraSettings,
    pose: CameraPose,
    manual_yaw: f32,
    manual_pitch: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

impl CameraController {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            pose: CameraPose {
                yaw: 0.0,
                pitch: 0.0,
                position: Vec3::from_array(settings.start_position),
            },
            settings,
            manual_yaw: 0.0,
            manual_pitch: 0.0,
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CameraSettings) {
        self.settings = settings;
        self.manual_pitch = self.manual_pitch.clamp(-settings.pitch_limit, settings.pitch_limit);
    }

    /// Accumulates a pointer drag in pixels.
    pub fn apply_drag(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        let limit = self.settings.pitch_limit;
        self.manual_yaw += delta.x * self.settings.yaw_sensitivity;
        self.manual_pitch =
            (self.manual_pitch + delta.y * self.settings.pitch_sensitivity).clamp(-limit, limit);
    }

    pub fn update(
        &mut self,
        delta_secs: f32,
        orientation: Option<&OrientationSample>,
        state: PortalState,
        anchor: &PortalAnchor,
    ) -> CameraPose {
        let (heading, pitch) = match orientation {
            Some(sample) => (
                sample.alpha.to_radians(),
                (sample.beta * self.settings.pitch_scale).to_radians(),
            ),
            None => (self.manual_yaw, self.manual_pitch),
        };

        let blend = self.settings.orientation_blend;
        self.pose.yaw += (-heading - self.pose.yaw) * blend;
        self.pose.pitch += (pitch - self.pose.pitch) * blend;

        let target = self.position_target(state, anchor);
        let factor = (delta_secs.max(0.0) * self.settings.position_lerp_rate).min(1.0);
        self.pose.position = self.pose.position.lerp(target, factor);
        self.pose
    }

    pub fn position_target(&self, state: PortalState, anchor: &PortalAnchor) -> Vec3 {
        match state {
            PortalState::Outside | PortalState::Entering => {
                Vec3::from_array(self.settings.start_position)
            }
            PortalState::Inside => {
                let mut target =
                    anchor.position + anchor.forward() * self.settings.inside_depth_offset;
                target.y = self.settings.inside_eye_height;
                target
            }
        }
    }

    /// Follows a tracked viewer so the software loop resumes without a jump.
    pub fn sync_to_viewer(&mut self, position: Vec3, rotation: Quat) {
        let (yaw, pitch, _) = rotation.to_euler(EulerRot::YXZ);
        self.pose = CameraPose { yaw, pitch, position };
    }
}
