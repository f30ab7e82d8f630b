use bevy::prelude::*;

use crate::portal::placement::{PlacementMode, PlacementResolver, PortalPlaced};
use crate::portal::proximity::ProximityDetector;
use crate::portal::state_machine::{PortalState, PortalStateMachine, PortalTransition};
use crate::rpc::web_rpc::WebRpcInterface;

pub const POINTER_PLACEMENT_HINT: &str = "Tap to place the portal around 2m ahead.";
pub const HIT_TEST_PLACEMENT_HINT: &str = "Move your device to find a surface and anchor the portal.";
pub const ANCHORED_HINT: &str = "Portal anchored. Approach or tap Enter to step in.";

/// Hint shown before anything is placed.
pub fn initial_hint(mode: PlacementMode) -> &'static str {
    match mode {
        PlacementMode::PointerPlane => POINTER_PLACEMENT_HINT,
        PlacementMode::WorldHitTest => HIT_TEST_PLACEMENT_HINT,
    }
}

pub fn send_initial_hint(resolver: Res<PlacementResolver>, mut rpc: ResMut<WebRpcInterface>) {
    rpc.send_notification(
        "placement_hint",
        serde_json::json!({ "message": initial_hint(resolver.mode()) }),
    );
}

/// Drains queued state changes into events and shell notifications, in order.
pub fn publish_transitions(
    mut machine: ResMut<PortalStateMachine>,
    mut proximity: ResMut<ProximityDetector>,
    mut transitions: EventWriter<PortalTransition>,
    mut rpc: ResMut<WebRpcInterface>,
) {
    for transition in machine.drain_transitions() {
        info!(
            "Portal {} -> {} ({:?})",
            transition.from.as_str(),
            transition.to.as_str(),
            transition.cause
        );
        match transition.to {
            PortalState::Outside => proximity.rearm(),
            PortalState::Inside => {
                rpc.send_notification("placement_hint", serde_json::json!({ "message": null }));
            }
            PortalState::Entering => {}
        }
        rpc.send_notification(
            "portal_state_changed",
            serde_json::to_value(&transition).unwrap_or_default(),
        );
        transitions.write(transition);
    }
}

pub fn publish_placements(
    mut placements: EventReader<PortalPlaced>,
    mut rpc: ResMut<WebRpcInterface>,
) {
    for placed in placements.read() {
        let position = placed.anchor.position;
        let orientation = placed.anchor.orientation;
        info!("Portal anchored at {:?} via {:?}", position, placed.mode);
        rpc.send_notification(
            "portal_placed",
            serde_json::json!({
                "position": [position.x, position.y, position.z],
                "orientation": [orientation.x, orientation.y, orientation.z, orientation.w],
                "mode": placed.mode,
            }),
        );
        rpc.send_notification("placement_hint", serde_json::json!({ "message": ANCHORED_HINT }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::camera::portal_camera::CameraState;
    use crate::portal::placement::PortalAnchor;
    use crate::portal::state_machine::TransitionCause;
    use std::time::Duration;

    #[test]
    fn transitions_serialize_for_the_shell() {
        let transition = PortalTransition {
            from: PortalState::Outside,
            to: PortalState::Entering,
            cause: TransitionCause::Proximity,
        };
        let value = serde_json::to_value(&transition).unwrap();
        assert_eq!(value["from"], "outside");
        assert_eq!(value["to"], "entering");
    }

    #[test]
    fn hint_follows_placement_mode() {
        assert_eq!(initial_hint(PlacementMode::PointerPlane), POINTER_PLACEMENT_HINT);
        assert_eq!(initial_hint(PlacementMode::WorldHitTest), HIT_TEST_PLACEMENT_HINT);
    }

    fn portal_app() -> App {
        let mut app = App::new();
        app.init_resource::<PortalStateMachine>()
            .init_resource::<ProximityDetector>()
            .init_resource::<WebRpcInterface>()
            .add_event::<PortalTransition>()
            .add_systems(Update, publish_transitions);
        app
    }

    fn approach(app: &mut App, camera: &CameraState, anchor: &PortalAnchor) -> bool {
        let state = app.world().resource::<PortalStateMachine>().state();
        let fired = app
            .world_mut()
            .resource_mut::<ProximityDetector>()
            .evaluate(state, camera, anchor, 1.0);
        if fired {
            app.world_mut()
                .resource_mut::<PortalStateMachine>()
                .begin_entering(TransitionCause::Proximity);
        }
        app.update();
        fired
    }

    #[test]
    fn returning_outside_rearms_proximity() {
        let mut app = portal_app();
        let mut camera = CameraState::default();
        camera.set_pose_parts(Vec3::ZERO, Quat::IDENTITY);
        camera.set_viewport(Vec2::splat(512.0));
        let anchor = PortalAnchor::facing(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);

        assert!(approach(&mut app, &camera, &anchor));
        assert!(!app.world().resource::<ProximityDetector>().is_armed());

        app.world_mut()
            .resource_mut::<PortalStateMachine>()
            .tick(Duration::from_secs(1));
        app.update();
        assert!(!approach(&mut app, &camera, &anchor));

        assert!(app.world_mut().resource_mut::<PortalStateMachine>().exit());
        app.update();
        assert!(app.world().resource::<ProximityDetector>().is_armed());
        assert_eq!(
            app.world().resource::<WebRpcInterface>().pending_methods(),
            vec![
                "portal_state_changed",
                "placement_hint",
                "portal_state_changed",
                "portal_state_changed",
            ]
        );

        assert!(approach(&mut app, &camera, &anchor));
        assert_eq!(
            app.world().resource::<PortalStateMachine>().state(),
            PortalState::Entering
        );
    }
}
