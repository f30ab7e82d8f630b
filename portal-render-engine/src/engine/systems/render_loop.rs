use std::time::Duration;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::engine::camera::portal_camera::CameraController;
use crate::engine::render::backend::CompositeFrame;
use crate::engine::render::compositor::StencilCompositor;
use crate::engine::render::portal_material::PortalMaterial;
use crate::engine::scene::scene_graph::SceneGraph;
use crate::engine::systems::frame::{FrameReport, FrameStep};
use crate::engine::systems::input::InputRegisters;
use crate::portal::placement::{PlacementMode, PlacementResolver, PortalPlaced};
use crate::portal::proximity::ProximityDetector;
use crate::portal::state_machine::PortalStateMachine;
use crate::portal::tracking::{SessionId, TrackedFrame, TrackingError, TrackingEvent, TrackingSession};
use crate::rpc::web_rpc::WebRpcInterface;

#[derive(Debug, Default, Clone)]
pub struct SoftwareLoop {
    frames: u64,
}

#[derive(Debug, Clone)]
pub struct TrackedLoop {
    session: TrackingSession,
    last_timestamp_ms: Option<f64>,
    frames: u64,
}

impl TrackedLoop {
    fn new(session: TrackingSession) -> Self {
        Self {
            session,
            last_timestamp_ms: None,
            frames: 0,
        }
    }

    /// Seconds since the previous tracked frame; zero for the first or an out-of-order one.
    fn advance(&mut self, timestamp_ms: f64) -> f32 {
        let delta = self
            .last_timestamp_ms
            .map(|last| ((timestamp_ms - last) / 1000.0).max(0.0) as f32)
            .unwrap_or(0.0);
        self.last_timestamp_ms = Some(timestamp_ms);
        self.frames += 1;
        delta
    }
}

/// The single active frame source.
#[derive(Debug, Clone)]
pub enum DriverBackend {
    Software(SoftwareLoop),
    Tracking(TrackedLoop),
    Stopped,
}

#[derive(Resource, Debug, Clone)]
pub struct RenderDriver {
    backend: DriverBackend,
    handshake_pending: bool,
    clock: Duration,
}

impl Default for RenderDriver {
    fn default() -> Self {
        Self {
            backend: DriverBackend::Software(SoftwareLoop::default()),
            handshake_pending: false,
            clock: Duration::ZERO,
        }
    }
}

impl RenderDriver {
    pub fn is_software(&self) -> bool {
        matches!(self.backend, DriverBackend::Software(_))
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.backend, DriverBackend::Tracking(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.backend, DriverBackend::Stopped)
    }

    pub fn handshake_pending(&self) -> bool {
        self.handshake_pending
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn active_session(&self) -> Option<SessionId> {
        match &self.backend {
            DriverBackend::Tracking(tracked) => Some(tracked.session.id()),
            _ => None,
        }
    }

    /// Marks a session request as in flight. Returns false if one is already pending.
    pub fn begin_handshake(&mut self) -> Result<bool, TrackingError> {
        match self.backend {
            DriverBackend::Tracking(_) => Err(TrackingError::AlreadyActive),
            DriverBackend::Stopped => Err(TrackingError::Unsupported),
            DriverBackend::Software(_) if self.handshake_pending => Ok(false),
            DriverBackend::Software(_) => {
                self.handshake_pending = true;
                Ok(true)
            }
        }
    }

    pub fn handshake_failed(&mut self) -> bool {
        std::mem::take(&mut self.handshake_pending)
    }

    /// Stops the software loop, then installs the tracking loop.
    pub fn install_tracking(&mut self, session: TrackingSession) -> Result<(), TrackingError> {
        match &self.backend {
            DriverBackend::Tracking(_) => return Err(TrackingError::AlreadyActive),
            DriverBackend::Stopped => return Err(TrackingError::Unsupported),
            DriverBackend::Software(_) if !self.handshake_pending => {
                return Err(TrackingError::HandshakeNotPending);
            }
            DriverBackend::Software(_) => {}
        }
        self.handshake_pending = false;
        if let DriverBackend::Software(software) = std::mem::replace(&mut self.backend, DriverBackend::Stopped) {
            debug!("Software loop stopped after {} frames", software.frames);
        }
        info!("Tracking loop installed for {}", session.id());
        self.backend = DriverBackend::Tracking(TrackedLoop::new(session));
        Ok(())
    }

    /// Cancels the hit-test source, drops the session and resumes the software loop.
    pub fn end_tracking(&mut self, id: SessionId) -> Result<TrackingSession, TrackingError> {
        if self.active_session() != Some(id) {
            return Err(TrackingError::UnknownSession(id));
        }
        let DriverBackend::Tracking(mut tracked) =
            std::mem::replace(&mut self.backend, DriverBackend::Software(SoftwareLoop::default()))
        else {
            return Err(TrackingError::UnknownSession(id));
        };
        tracked.session.cancel_hit_test();
        info!("{} ended after {} frames, software loop resumed", id, tracked.frames);
        Ok(tracked.session)
    }

    /// Advances the software loop. `None` while another source drives frames.
    pub fn software_tick(&mut self, delta: Duration) -> Option<f32> {
        let DriverBackend::Software(software) = &mut self.backend else {
            return None;
        };
        software.frames += 1;
        self.clock += delta;
        Some(delta.as_secs_f32())
    }

    /// Advances the tracking loop for a frame of the active session.
    pub fn tracked_tick(&mut self, frame: &TrackedFrame) -> Option<f32> {
        let DriverBackend::Tracking(tracked) = &mut self.backend else {
            return None;
        };
        if tracked.session.id() != frame.session {
            return None;
        }
        let delta = tracked.advance(frame.timestamp_ms);
        self.clock += Duration::from_secs_f32(delta);
        Some(delta)
    }

    /// Stops whichever loop is active and hands back a live session, if any.
    pub fn stop(&mut self) -> Option<Option<TrackingSession>> {
        self.handshake_pending = false;
        match std::mem::replace(&mut self.backend, DriverBackend::Stopped) {
            DriverBackend::Software(_) => Some(None),
            DriverBackend::Tracking(tracked) => Some(Some(tracked.session)),
            DriverBackend::Stopped => None,
        }
    }
}

/// Everything the frame step borrows, gathered for one system.
#[derive(SystemParam)]
pub struct PortalFrame<'w> {
    scene: ResMut<'w, SceneGraph>,
    camera: ResMut<'w, CameraController>,
    proximity: ResMut<'w, ProximityDetector>,
    machine: ResMut<'w, PortalStateMachine>,
    resolver: ResMut<'w, PlacementResolver>,
    compositor: ResMut<'w, StencilCompositor>,
    materials: ResMut<'w, Assets<PortalMaterial>>,
    composite: ResMut<'w, CompositeFrame>,
}

impl PortalFrame<'_> {
    fn run_software(&mut self, delta_secs: f32, inputs: &mut InputRegisters) -> FrameReport {
        self.composite.begin();
        let mut step = FrameStep {
            scene: &mut self.scene,
            camera: &mut self.camera,
            proximity: &mut self.proximity,
            machine: &mut self.machine,
            resolver: &mut self.resolver,
            compositor: &mut self.compositor,
            materials: &mut self.materials,
        };
        step.software(delta_secs, inputs, &mut *self.composite)
    }

    fn run_tracked(&mut self, frame: &TrackedFrame) -> FrameReport {
        self.composite.begin();
        let mut step = FrameStep {
            scene: &mut self.scene,
            camera: &mut self.camera,
            proximity: &mut self.proximity,
            machine: &mut self.machine,
            resolver: &mut self.resolver,
            compositor: &mut self.compositor,
            materials: &mut self.materials,
        };
        step.tracked(frame, &mut *self.composite)
    }

    fn reset_placement_for_session(&mut self) {
        self.resolver.reset_for_session();
    }
}

fn publish_report(
    report: &FrameReport,
    resolver_mode: PlacementMode,
    driver: &mut RenderDriver,
    placed_events: &mut EventWriter<PortalPlaced>,
    rpc: &mut WebRpcInterface,
) {
    if let Some(anchor) = report.placed {
        placed_events.write(PortalPlaced {
            anchor,
            mode: resolver_mode,
        });
    }
    if report.tracking_requested {
        match driver.begin_handshake() {
            Ok(true) => {
                info!("Requesting world-tracking session");
                rpc.send_notification("request_tracking_session", serde_json::json!({}));
            }
            Ok(false) => debug!("Tracking session request already pending"),
            Err(error) => debug!("Tracking session not requested: {}", error),
        }
    }
}

pub fn drive_software_loop(
    time: Res<Time>,
    mut driver: ResMut<RenderDriver>,
    mut inputs: ResMut<InputRegisters>,
    mut frame: PortalFrame,
    mut placed_events: EventWriter<PortalPlaced>,
    mut rpc: ResMut<WebRpcInterface>,
) {
    let Some(delta_secs) = driver.software_tick(time.delta()) else {
        return;
    };
    let report = frame.run_software(delta_secs, &mut inputs);
    let mode = frame.resolver.mode();
    publish_report(&report, mode, &mut driver, &mut placed_events, &mut rpc);
}

/// Applies tracking-session messages in arrival order.
pub fn drive_tracking_loop(
    mut events: EventReader<TrackingEvent>,
    mut driver: ResMut<RenderDriver>,
    mut frame: PortalFrame,
    mut placed_events: EventWriter<PortalPlaced>,
    mut rpc: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        match event {
            TrackingEvent::Started(id) => {
                if let Err(error) = driver.install_tracking(TrackingSession::new(*id)) {
                    warn!("Rejected tracking {}: {}", id, error);
                    rpc.send_notification(
                        "tracking_session_error",
                        serde_json::json!({ "message": error.to_string() }),
                    );
                    rpc.send_notification(
                        "end_tracking_session",
                        serde_json::json!({ "session_id": id }),
                    );
                }
            }
            TrackingEvent::Failed(error) => {
                driver.handshake_failed();
                warn!("Tracking session failed to start: {}", error);
                rpc.send_notification(
                    "tracking_session_error",
                    serde_json::json!({ "message": error.to_string() }),
                );
            }
            TrackingEvent::Ended(id) => match driver.end_tracking(*id) {
                Ok(_) => frame.reset_placement_for_session(),
                Err(error) => debug!("Ignoring session end: {}", error),
            },
            TrackingEvent::Frame(tracked) => {
                let Some(_) = driver.tracked_tick(tracked) else {
                    debug!("Dropping tracked frame for inactive {}", tracked.session);
                    continue;
                };
                let report = frame.run_tracked(tracked);
                let mode = frame.resolver.mode();
                publish_report(&report, mode, &mut driver, &mut placed_events, &mut rpc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_for(id: u32, timestamp_ms: f64) -> TrackedFrame {
        TrackedFrame {
            session: SessionId(id),
            timestamp_ms,
            viewer: None,
            hits: Vec::new(),
        }
    }

    #[test]
    fn handoff_keeps_exactly_one_loop_active() {
        let mut driver = RenderDriver::default();
        assert!(driver.software_tick(Duration::from_millis(16)).is_some());

        assert_eq!(
            driver.install_tracking(TrackingSession::new(SessionId(1))),
            Err(TrackingError::HandshakeNotPending)
        );
        assert_eq!(driver.begin_handshake(), Ok(true));
        assert_eq!(driver.begin_handshake(), Ok(false));
        driver
            .install_tracking(TrackingSession::new(SessionId(1)))
            .unwrap();

        assert!(driver.is_tracking());
        assert!(driver.software_tick(Duration::from_millis(16)).is_none());
        assert_eq!(driver.clock(), Duration::from_millis(16));
        assert_eq!(driver.tracked_tick(&frame_for(1, 1000.0)), Some(0.0));
        let delta = driver.tracked_tick(&frame_for(1, 1020.0)).unwrap();
        assert!((delta - 0.02).abs() < 1e-6);
        assert!(driver.tracked_tick(&frame_for(2, 1040.0)).is_none());

        let session = driver.end_tracking(SessionId(1)).unwrap();
        assert!(!session.hit_test_active());
        assert!(driver.is_software());
        assert!(driver.software_tick(Duration::from_millis(16)).is_some());
    }

    #[test]
    fn failed_handshake_stays_on_software() {
        let mut driver = RenderDriver::default();
        driver.begin_handshake().unwrap();
        assert!(driver.handshake_failed());
        assert!(!driver.handshake_pending());
        assert!(driver.is_software());
    }

    #[test]
    fn ending_unknown_session_is_an_error() {
        let mut driver = RenderDriver::default();
        assert_eq!(
            driver.end_tracking(SessionId(4)).map(|s| s.id()),
            Err(TrackingError::UnknownSession(SessionId(4)))
        );
    }

    #[test]
    fn stop_hands_back_the_live_session_once() {
        let mut driver = RenderDriver::default();
        driver.begin_handshake().unwrap();
        driver
            .install_tracking(TrackingSession::new(SessionId(9)))
            .unwrap();

        let session = driver.stop().flatten().unwrap();
        assert_eq!(session.id(), SessionId(9));
        assert!(driver.is_stopped());
        assert!(driver.stop().is_none());
        assert_eq!(driver.begin_handshake(), Err(TrackingError::Unsupported));
    }
}
