//! Interaction core of the portal experience.
//!
//! Holds the pieces that decide *where* the portal is and *which side* of it the
//! player is on. Rendering and camera motion live under `engine`.

/// Anchor resolution from pointer rays or world-tracking hit-tests.
///
/// Pointer mode intersects a camera-facing plane at a fixed standoff; tracked mode takes
/// the first hit of the session and ignores the rest.
pub mod placement;

/// Screen-space apparent size trigger for walking into the portal.
pub mod proximity;

/// Outside / Entering / Inside state machine with the timed entering dwell.
pub mod state_machine;

/// World-tracking session handles and the frame payloads delivered by the host.
pub mod tracking;
