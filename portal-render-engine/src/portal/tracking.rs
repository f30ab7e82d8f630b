use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("tracking session refused: {0}")]
    Refused(String),
    #[error("world tracking is not supported on this device")]
    Unsupported,
    #[error("no active tracking session with id {0}")]
    UnknownSession(SessionId),
    #[error("a tracking session is already active")]
    AlreadyActive,
    #[error("no tracking session handshake is pending")]
    HandshakeNotPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSpace {
    LocalFloor,
    Viewer,
}

/// Continuous hit-test subscription. Results stop once cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitTestSource {
    space: ReferenceSpace,
    cancelled: bool,
}

impl HitTestSource {
    pub fn viewer() -> Self {
        Self {
            space: ReferenceSpace::Viewer,
            cancelled: false,
        }
    }

    pub fn space(&self) -> ReferenceSpace {
        self.space
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn cancel(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSession {
    id: SessionId,
    reference_space: ReferenceSpace,
    hit_test: Option<HitTestSource>,
}

impl TrackingSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            reference_space: ReferenceSpace::LocalFloor,
            hit_test: Some(HitTestSource::viewer()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn reference_space(&self) -> ReferenceSpace {
        self.reference_space
    }

    pub fn hit_test_active(&self) -> bool {
        self.hit_test.as_ref().is_some_and(|source| !source.is_cancelled())
    }

    /// Cancels and drops the hit-test source. Returns false if there was nothing to cancel.
    pub fn cancel_hit_test(&mut self) -> bool {
        match self.hit_test.take() {
            Some(mut source) => source.cancel(),
            None => false,
        }
    }
}

/// World-space pose of a hit-test result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPose {
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPose {
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFrame {
    pub session: SessionId,
    pub timestamp_ms: f64,
    pub viewer: Option<ViewerPose>,
    pub hits: Vec<HitPose>,
}

/// Pose as it arrives over the wire: `[x, y, z]` and `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PoseParams {
    pub position: [f32; 3],
    #[serde(default = "identity_quat")]
    pub orientation: [f32; 4],
}

fn identity_quat() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl PoseParams {
    fn parts(&self) -> (Vec3, Quat) {
        let rotation = Quat::from_array(self.orientation);
        let rotation = if rotation.length_squared() > f32::EPSILON {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        (Vec3::from_array(self.position), rotation)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackedFrameParams {
    pub session_id: SessionId,
    pub timestamp_ms: f64,
    #[serde(default)]
    pub viewer: Option<PoseParams>,
    #[serde(default)]
    pub hits: Vec<PoseParams>,
}

impl From<TrackedFrameParams> for TrackedFrame {
    fn from(params: TrackedFrameParams) -> Self {
        let viewer = params.viewer.map(|pose| {
            let (position, orientation) = pose.parts();
            ViewerPose { position, orientation }
        });
        let hits = params
            .hits
            .iter()
            .map(|pose| {
                let (position, orientation) = pose.parts();
                HitPose { position, orientation }
            })
            .collect();
        Self {
            session: params.session_id,
            timestamp_ms: params.timestamp_ms,
            viewer,
            hits,
        }
    }
}

/// Messages from the host about the world-tracking session, in arrival order.
#[derive(Event, Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    Started(SessionId),
    Failed(TrackingError),
    Ended(SessionId),
    Frame(TrackedFrame),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_hit_test_is_idempotent() {
        let mut session = TrackingSession::new(SessionId(3));
        assert!(session.hit_test_active());
        assert_eq!(session.reference_space(), ReferenceSpace::LocalFloor);
        assert!(session.cancel_hit_test());
        assert!(!session.cancel_hit_test());
        assert!(!session.hit_test_active());
    }

    #[test]
    fn frame_params_parse_from_json() {
        let params: TrackedFrameParams = serde_json::from_value(serde_json::json!({
            "session_id": 7,
            "timestamp_ms": 1016.5,
            "viewer": { "position": [0.0, 1.6, 0.0], "orientation": [0.0, 0.0, 0.0, 2.0] },
            "hits": [{ "position": [0.5, 0.0, -1.5] }]
        }))
        .unwrap();
        let frame = TrackedFrame::from(params);

        assert_eq!(frame.session, SessionId(7));
        assert_eq!(frame.viewer.unwrap().orientation, Quat::IDENTITY);
        assert_eq!(frame.hits.len(), 1);
        assert_eq!(frame.hits[0].position, Vec3::new(0.5, 0.0, -1.5));
        assert_eq!(frame.hits[0].orientation, Quat::IDENTITY);
    }
}
