use bevy::color::Color;

/// Stencil value written by the portal aperture and tested by the inside scene.
pub const STENCIL_REFERENCE: u32 = 1;

pub const CAMERA_FOV_DEGREES: f32 = 60.0;
pub const CAMERA_NEAR: f32 = 0.01;
pub const CAMERA_FAR: f32 = 100.0;

/// Render layers of the two scene roots.
pub const OUTSIDE_LAYER: usize = 0;
pub const INSIDE_LAYER: usize = 1;

pub const PORTAL_COLOUR: Color = Color::srgb(0.169, 0.941, 1.0);
pub const PORTAL_EMISSIVE_INTENSITY: f32 = 0.6;
pub const PORTAL_RADIUS: f32 = 0.9;
pub const PORTAL_THICKNESS: f32 = 0.12;
pub const PORTAL_SEGMENTS: u32 = 64;
pub const PORTAL_GLOW_OPACITY: f32 = 0.35;

/// Aperture sits slightly behind the ring so the ring edge stays on top.
pub const APERTURE_DEPTH_OFFSET: f32 = -0.01;

/// Outside clears to transparent so the passthrough feed shows behind the canvas.
pub const OUTSIDE_CLEAR_COLOUR: Color = Color::NONE;
pub const INSIDE_BACKGROUND: Color = Color::srgb(0.020, 0.024, 0.051);
