//! Dual-scene portal compositing.
//!
//! The compositor issues draw commands through a [`backend::RenderBackend`]; the
//! recorded frame is then mapped onto the outside and inside layer cameras.

/// Render backend trait, recorded frame commands and the camera mapping system.
pub mod backend;

/// Stencil compositor driving the per-state draw order and material masking.
pub mod compositor;

/// Depth-only occluder clipping the inside pass to the projected aperture.
pub mod depth_mask;

/// Unlit portal material with colour write, depth write and stencil specialisation.
pub mod portal_material;

/// Stencil configs and the per-material snapshot table.
pub mod stencil;
