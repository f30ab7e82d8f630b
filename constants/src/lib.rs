//! Shared compile-time defaults for the portal engine.
//!
//! Runtime overrides are loaded from `assets/config/default.portal.json`; every value
//! that is not overridden falls back to the constants below.

pub mod interaction;
pub mod placement;
pub mod render_settings;
pub mod room;
