//! Portal camera model and controller.
//!
//! The camera is plain data shared by placement, proximity and the compositor; the
//! Bevy camera entities only mirror it.

/// Camera pose, projection and the orientation/drag blending controller.
pub mod portal_camera;
