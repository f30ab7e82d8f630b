use bevy::diagnostic::DiagnosticsStore;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::systems::fps_tracking::smoothed_fps;
use crate::engine::systems::input::{InputRegisters, OrientationSample, PortalCommand};
use crate::engine::systems::render_loop::RenderDriver;
use crate::portal::placement::{PlacementMode, PlacementResolver};
use crate::portal::state_machine::{PortalState, PortalStateMachine};
use crate::portal::tracking::{SessionId, TrackedFrameParams, TrackingError, TrackingEvent};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication between the shell and Bevy.
/// Handles both request-response patterns and notification broadcasting.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the shell without expecting response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    #[cfg(test)]
    pub fn pending_methods(&self) -> Vec<&str> {
        self.outgoing_notifications
            .iter()
            .map(|notification| notification.method.as_str())
            .collect()
    }

    /// Queue response for transmission to the shell.
    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing WebRPC communication layer for iframe-based deployment.
///
/// Inbound messages are applied in `PreUpdate` so the frame sees them; outbound
/// messages are flushed in `Last` under [`RpcFlush`], so anything queued before that set
/// (teardown on `AppExit` included) still reaches the shell this frame.
pub struct WebRpcPlugin;

/// Outbound flush. Systems that notify from `Last` run before it.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpcFlush;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                PreUpdate,
                (process_incoming_messages, handle_rpc_messages).chain(),
            )
            .add_systems(Last, send_outgoing_messages.in_set(RpcFlush));

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();
            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    if let Some(window) = window() {
        window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .expect("Failed to register message listener");
    }

    // Ownership moves to JS; the listener lives as long as the page.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Resource wrapping thread-safe message queue for WASM event handling.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

/// Event representing incoming RPC message from the shell.
#[derive(Event)]
pub struct IncomingRpcMessage {
    pub content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// Read-only snapshot of the portal used to answer queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalStatus {
    pub state: PortalState,
    pub placed: bool,
    pub mode: PlacementMode,
    pub tracking_session: Option<SessionId>,
    pub fps: Option<f32>,
}

/// Side effect of a dispatched request, applied by the calling system.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcAction {
    Command(PortalCommand),
    Orientation(Option<OrientationSample>),
    Tracking(TrackingEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub result: serde_json::Value,
    pub action: Option<RpcAction>,
}

impl Dispatched {
    fn reply(result: serde_json::Value) -> Self {
        Self {
            result,
            action: None,
        }
    }

    fn with_action(result: serde_json::Value, action: RpcAction) -> Self {
        Self {
            result,
            action: Some(action),
        }
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    diagnostics: Res<DiagnosticsStore>,
    machine: Res<PortalStateMachine>,
    resolver: Res<PlacementResolver>,
    driver: Res<RenderDriver>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut registers: ResMut<InputRegisters>,
    mut portal_commands: EventWriter<PortalCommand>,
    mut tracking_events: EventWriter<TrackingEvent>,
) {
    let status = PortalStatus {
        state: machine.state(),
        placed: resolver.is_placed(),
        mode: resolver.mode(),
        tracking_session: driver.active_session(),
        fps: smoothed_fps(&diagnostics),
    };

    for event in events.read() {
        let request = match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => request,
            Err(parse_error) => {
                warn!("Unparseable RPC message: {}", parse_error);
                rpc_interface.queue_response(RpcResponse {
                    jsonrpc: "2.0".to_string(),
                    result: None,
                    error: Some(RpcError::parse_error(&parse_error.to_string())),
                    id: None,
                });
                continue;
            }
        };
        debug!("Processing RPC method: {}", request.method);

        let outcome = dispatch_request(&request, &status);
        if let Ok(Dispatched {
            action: Some(action),
            ..
        }) = &outcome
        {
            match action.clone() {
                RpcAction::Command(command) => {
                    portal_commands.write(command);
                }
                RpcAction::Orientation(sample) => registers.orientation = sample,
                RpcAction::Tracking(tracking) => {
                    tracking_events.write(tracking);
                }
            }
        }

        // Notifications have no ID and get no response.
        if let Some(id) = request.id.clone() {
            rpc_interface.queue_response(create_response(id, outcome.map(|d| d.result)));
        } else if let Err(error) = outcome {
            warn!("RPC notification {} failed: {}", request.method, error.message);
        }
    }
}

/// Maps one request onto its reply and side effect. Pure; the caller applies the action.
pub fn dispatch_request(
    request: &RpcRequest,
    status: &PortalStatus,
) -> Result<Dispatched, RpcError> {
    let params = &request.params;
    match request.method.as_str() {
        "enter_portal" => Ok(Dispatched::with_action(
            serde_json::json!({ "accepted": status.state == PortalState::Outside }),
            RpcAction::Command(PortalCommand::Enter),
        )),
        "exit_portal" => Ok(Dispatched::with_action(
            serde_json::json!({ "accepted": status.state == PortalState::Inside }),
            RpcAction::Command(PortalCommand::Exit),
        )),
        "get_portal_state" => Ok(Dispatched::reply(serde_json::json!({
            "state": status.state,
            "placed": status.placed,
            "mode": status.mode,
            "tracking_session": status.tracking_session,
        }))),
        "orientation_sample" => handle_orientation_sample(params),
        "visibility_changed" => handle_visibility_changed(params),
        "tracking_session_started" => {
            let id = parse_session_id(params)?;
            Ok(Dispatched::with_action(
                serde_json::json!({ "success": true }),
                RpcAction::Tracking(TrackingEvent::Started(id)),
            ))
        }
        "tracking_session_failed" => handle_tracking_failed(params),
        "tracking_session_ended" => {
            let id = parse_session_id(params)?;
            Ok(Dispatched::with_action(
                serde_json::json!({ "success": true }),
                RpcAction::Tracking(TrackingEvent::Ended(id)),
            ))
        }
        "tracking_frame" => {
            let frame = serde_json::from_value::<TrackedFrameParams>(params.clone())
                .map_err(|e| RpcError::invalid_params(&format!("Invalid tracking frame: {e}")))?;
            Ok(Dispatched::with_action(
                serde_json::json!({ "success": true }),
                RpcAction::Tracking(TrackingEvent::Frame(frame.into())),
            ))
        }
        "teardown" => Ok(Dispatched::with_action(
            serde_json::json!({ "success": true }),
            RpcAction::Command(PortalCommand::Teardown),
        )),
        "get_fps" => {
            let fps = status
                .fps
                .ok_or_else(|| RpcError::internal_error("Frame diagnostics not available yet"))?;
            Ok(Dispatched::reply(serde_json::json!({ "fps": fps })))
        }
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            Err(RpcError::method_not_found(&request.method))
        }
    }
}

/// Accepts `{alpha, beta, gamma}` or `null` (sensor unavailable).
fn handle_orientation_sample(params: &serde_json::Value) -> Result<Dispatched, RpcError> {
    let sample = serde_json::from_value::<Option<OrientationSample>>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected orientation {alpha, beta, gamma} or null"))?;
    Ok(Dispatched::with_action(
        serde_json::json!({ "success": true }),
        RpcAction::Orientation(sample),
    ))
}

fn handle_visibility_changed(params: &serde_json::Value) -> Result<Dispatched, RpcError> {
    #[derive(Deserialize)]
    struct VisibilityParams {
        hidden: bool,
    }

    let visibility = serde_json::from_value::<VisibilityParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'hidden' parameter"))?;
    let result = serde_json::json!({ "success": true });
    if visibility.hidden {
        Ok(Dispatched::with_action(
            result,
            RpcAction::Command(PortalCommand::VisibilityHidden),
        ))
    } else {
        Ok(Dispatched::reply(result))
    }
}

fn handle_tracking_failed(params: &serde_json::Value) -> Result<Dispatched, RpcError> {
    #[derive(Deserialize)]
    struct FailureParams {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        unsupported: bool,
    }

    let failure = serde_json::from_value::<FailureParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'message' parameter"))?;
    let error = if failure.unsupported {
        TrackingError::Unsupported
    } else {
        TrackingError::Refused(failure.message.unwrap_or_else(|| "unknown reason".to_string()))
    };
    Ok(Dispatched::with_action(
        serde_json::json!({ "success": true }),
        RpcAction::Tracking(TrackingEvent::Failed(error)),
    ))
}

fn parse_session_id(params: &serde_json::Value) -> Result<SessionId, RpcError> {
    #[derive(Deserialize)]
    struct SessionParams {
        session_id: SessionId,
    }

    serde_json::from_value::<SessionParams>(params.clone())
        .map(|p| p.session_id)
        .map_err(|_| RpcError::invalid_params("Expected 'session_id' parameter"))
}

fn create_response(
    id: serde_json::Value,
    outcome: Result<serde_json::Value, RpcError>,
) -> RpcResponse {
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(error) => (None, Some(error)),
    };
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result,
        error,
        id: Some(id),
    }
}

/// Send queued notifications and responses to the shell.
pub fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    // Notifications first, then responses.
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }
    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn parse_error(message: &str) -> Self {
        Self {
            code: -32700,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: PortalState) -> PortalStatus {
        PortalStatus {
            state,
            placed: false,
            mode: PlacementMode::PointerPlane,
            tracking_session: None,
            fps: None,
        }
    }

    fn request(method: &str, params: serde_json::Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(serde_json::json!(1)),
        }
    }

    #[test]
    fn enter_and_exit_dispatch_portal_commands() {
        let enter = dispatch_request(
            &request("enter_portal", serde_json::Value::Null),
            &status(PortalState::Outside),
        )
        .unwrap();
        assert_eq!(enter.action, Some(RpcAction::Command(PortalCommand::Enter)));
        assert_eq!(enter.result["accepted"], true);

        let exit = dispatch_request(
            &request("exit_portal", serde_json::Value::Null),
            &status(PortalState::Entering),
        )
        .unwrap();
        assert_eq!(exit.action, Some(RpcAction::Command(PortalCommand::Exit)));
        assert_eq!(exit.result["accepted"], false);
    }

    #[test]
    fn unknown_method_is_reported() {
        let error = dispatch_request(
            &request("open_pod_bay_doors", serde_json::Value::Null),
            &status(PortalState::Outside),
        )
        .unwrap_err();
        assert_eq!(error.code, -32601);
    }

    #[test]
    fn orientation_accepts_null_and_partial_samples() {
        let cleared = dispatch_request(
            &request("orientation_sample", serde_json::Value::Null),
            &status(PortalState::Outside),
        )
        .unwrap();
        assert_eq!(cleared.action, Some(RpcAction::Orientation(None)));

        let sample = dispatch_request(
            &request("orientation_sample", serde_json::json!({ "alpha": 90.0 })),
            &status(PortalState::Outside),
        )
        .unwrap();
        assert_eq!(
            sample.action,
            Some(RpcAction::Orientation(Some(OrientationSample {
                alpha: 90.0,
                beta: 0.0,
                gamma: 0.0,
            })))
        );
    }

    #[test]
    fn malformed_params_are_invalid() {
        let error = dispatch_request(
            &request("tracking_session_started", serde_json::json!({ "id": "x" })),
            &status(PortalState::Outside),
        )
        .unwrap_err();
        assert_eq!(error.code, -32602);

        let error = dispatch_request(
            &request("get_fps", serde_json::Value::Null),
            &status(PortalState::Outside),
        )
        .unwrap_err();
        assert_eq!(error.code, -32603);
    }

    #[test]
    fn tracking_frames_become_tracking_events() {
        let dispatched = dispatch_request(
            &request(
                "tracking_frame",
                serde_json::json!({
                    "session_id": 2,
                    "timestamp_ms": 16.0,
                    "hits": [{ "position": [0.0, 0.0, -3.0] }]
                }),
            ),
            &status(PortalState::Outside),
        )
        .unwrap();
        let Some(RpcAction::Tracking(TrackingEvent::Frame(frame))) = dispatched.action else {
            panic!("expected a tracked frame");
        };
        assert_eq!(frame.session, SessionId(2));
        assert_eq!(frame.hits.len(), 1);
    }

    #[test]
    fn visible_again_has_no_side_effect() {
        let dispatched = dispatch_request(
            &request("visibility_changed", serde_json::json!({ "hidden": false })),
            &status(PortalState::Inside),
        )
        .unwrap();
        assert_eq!(dispatched.action, None);
    }

    #[test]
    fn missing_params_parse_as_null() {
        let parsed: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"teardown"}"#).unwrap();
        assert!(parsed.params.is_null());
        assert!(parsed.id.is_none());
    }
}
