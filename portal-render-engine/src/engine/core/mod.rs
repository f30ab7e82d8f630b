//! Core application setup and lifecycle.
//!
//! Handles app construction, window configuration, runtime settings loading and the
//! ordered teardown for both native and WASM targets.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Creates the app with the portal material, settings loader, RPC bridge and the
/// chained per-frame schedule.
pub mod app_setup;

/// Application states: Loading, Running, TornDown.
pub mod app_state;

/// `PortalSettings` asset, validation and application to the runtime resources.
pub mod settings;

/// Ordered, idempotent teardown of loops, tracking session and GPU resources.
pub mod teardown;

/// Platform-specific window configuration and placement-mode detection.
///
/// Configures canvas integration for web targets and vsync settings.
pub mod window_config;
