//! Per-frame runtime systems.
//!
//! Input adapters fill latest-sample registers, the render driver runs exactly one frame
//! source (software ticks or tracked frames) through the shared frame step, and the
//! notification systems report state changes to the presentation shell.

/// FPS tracking and notification systems for performance monitoring.
///
/// Sends frame rate updates to frontend via RPC and updates native UI overlays.
pub mod fps_tracking;

/// The frame step shared by both loops: placement, camera, proximity, render dispatch.
pub mod frame;

/// Pointer, orientation and visibility input registers plus portal commands.
pub mod input;

/// Shell notifications for transitions, placements and placement hints.
pub mod notifications;

/// Software/tracking loop hand-off and the systems that drive frames.
pub mod render_loop;
