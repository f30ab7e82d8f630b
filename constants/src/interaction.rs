use bevy::math::Vec3;

/// Exponential blend applied to yaw/pitch on every camera update.
pub const ORIENTATION_BLEND: f32 = 0.08;

/// Device tilt (beta) is dampened by this factor before becoming pitch.
pub const ORIENTATION_PITCH_SCALE: f32 = 0.3;

/// Radians per pixel of manual drag.
pub const MANUAL_YAW_SENSITIVITY: f32 = 0.003;
pub const MANUAL_PITCH_SENSITIVITY: f32 = 0.002;
pub const MANUAL_PITCH_LIMIT: f32 = 0.5;

/// Camera position target while outside or entering.
pub const CAMERA_START_POSITION: Vec3 = Vec3::new(0.0, 1.6, 0.2);

/// Inside target: offset along the anchor forward normal, at a fixed eye height.
pub const INSIDE_DEPTH_OFFSET: f32 = -2.4;
pub const INSIDE_EYE_HEIGHT: f32 = 1.65;

/// Position interpolation factor is `min(delta * rate, 1)`.
pub const POSITION_LERP_RATE: f32 = 2.4;

/// Vertical NDC extent of the portal above which the player counts as close.
pub const PROXIMITY_NDC_THRESHOLD: f32 = 0.45;

/// Dwell time of the transient entering state.
pub const ENTER_DWELL_MS: u64 = 900;
