use bevy::color::Color;
use bevy::math::Vec3;

/// Room box extents (width, height, depth).
pub const ROOM_SIZE: Vec3 = Vec3::new(6.0, 4.0, 8.0);

/// Room centre in anchor space (the room frame faces back through the portal).
pub const ROOM_LOCAL_OFFSET: Vec3 = Vec3::new(0.0, 0.1, -0.8);

pub const ROOM_WALL_COLOUR: Color = Color::srgb(0.047, 0.059, 0.094);

pub const STRIP_HEIGHT: f32 = 0.1;
pub const STRIP_INSET: f32 = 0.3;
pub const STRIP_OPACITY: f32 = 0.45;

pub const PANEL_SIZE: (f32, f32) = (2.8, 1.4);
pub const PANEL_HEIGHT: f32 = 0.8;
pub const PANEL_COLOUR: Color = Color::srgb(0.510, 0.420, 1.0);

pub const FLOOR_RADIUS: f32 = 1.5;
pub const FLOOR_COLOUR: Color = Color::srgba(0.078, 0.122, 0.204, 0.9);
