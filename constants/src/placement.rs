use bevy::math::Vec3;

/// Distance along the camera forward vector of the pointer placement plane.
pub const PLACEMENT_STANDOFF_DISTANCE: f32 = 2.2;

/// Walkable height band (metres) the placed portal centre is clamped into.
pub const WALKABLE_MIN_HEIGHT: f32 = 1.0;
pub const WALKABLE_MAX_HEIGHT: f32 = 2.0;

/// Anchor used until the first placement event.
pub const DEFAULT_ANCHOR_POSITION: Vec3 = Vec3::new(0.0, 1.4, -PLACEMENT_STANDOFF_DISTANCE);

/// Reference vector rotated by a hit-test orientation to obtain the portal normal.
pub const HIT_TEST_BACKWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Ray/plane denominators below this are treated as parallel.
pub const PLANE_PARALLEL_EPSILON: f32 = 1e-6;
