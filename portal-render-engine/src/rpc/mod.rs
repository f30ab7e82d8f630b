//! JSON-RPC 2.0 communication layer for the presentation shell.
//!
//! Implements bidirectional messaging between the Bevy engine and the host page via
//! iframe postMessage, supporting both request-response and notification patterns.
//!
//! ## Message Flow
//!
//! ```text
//! Shell (Parent Window)  <──postMessage──>  Bevy (iframe)
//!        │                                        │
//!        ├─ Request (with ID) ──────────────────> │
//!        │                                        ├─ dispatch_request()
//!        │ <───────────────── Response (with ID) ─┤
//!        │                                        │
//!        ├─ Notification (no ID) ───────────────> ├─ applied, no reply
//!        │ <────────── Notification (no ID) ─────┤
//! ```
//!
//! ## Inbound Methods
//!
//! ### Portal control
//! - `enter_portal`, `exit_portal`: user intents, ignored outside their source state
//! - `get_portal_state`: state, placement flag, placement mode, active session
//! - `teardown`: stop loops and release GPU resources
//!
//! ### Device signals
//! - `orientation_sample`: `{alpha, beta, gamma}` in degrees, or `null`
//! - `visibility_changed`: `{hidden}`; hiding while inside exits the portal
//!
//! ### World tracking
//! - `tracking_session_started` / `tracking_session_ended`: `{session_id}`
//! - `tracking_session_failed`: `{message, unsupported?}`
//! - `tracking_frame`: `{session_id, timestamp_ms, viewer?, hits}`
//!
//! ### Diagnostics
//! - `get_fps`: current smoothed frame rate
//!
//! ## Outbound Notifications
//!
//! `portal_state_changed`, `portal_placed`, `placement_hint`, `request_tracking_session`,
//! `end_tracking_session`, `tracking_session_error`, `fps_update`.
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32700`: Parse error
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error

/// JSON-RPC 2.0 bidirectional communication system for the shell.
///
/// Handles request-response patterns, notifications, and WASM message listeners.
pub mod web_rpc;
