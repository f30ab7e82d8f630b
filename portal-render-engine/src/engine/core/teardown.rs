use bevy::prelude::*;

use crate::engine::core::app_state::AppState;
use crate::engine::render::compositor::{DisposeReport, StencilCompositor};
use crate::engine::render::depth_mask::ApertureDepthMask;
use crate::engine::render::portal_material::PortalMaterial;
use crate::engine::scene::scene_graph::{InsideRoomRoot, PortalGroup};
use crate::engine::systems::input::PortalCommand;
use crate::engine::systems::render_loop::RenderDriver;
use crate::portal::state_machine::PortalStateMachine;
use crate::portal::tracking::SessionId;
use crate::rpc::web_rpc::WebRpcInterface;

/// One completed teardown step, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    CancelDwellTimer,
    StopLoop,
    CancelHitTest,
    EndSession(SessionId),
    ReleaseGpu(DisposeReport),
}

/// Runs every teardown step that still has work to do. A second call returns nothing.
pub fn teardown_portal(
    machine: &mut PortalStateMachine,
    driver: &mut RenderDriver,
    compositor: &mut StencilCompositor,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<PortalMaterial>,
) -> Vec<TeardownStep> {
    let mut steps = Vec::new();
    if machine.cancel() {
        steps.push(TeardownStep::CancelDwellTimer);
    }
    if let Some(session) = driver.stop() {
        steps.push(TeardownStep::StopLoop);
        if let Some(mut session) = session {
            if session.cancel_hit_test() {
                steps.push(TeardownStep::CancelHitTest);
            }
            steps.push(TeardownStep::EndSession(session.id()));
        }
    }
    if let Some(report) = compositor.dispose(meshes, materials) {
        steps.push(TeardownStep::ReleaseGpu(report));
    }
    steps
}

/// Tears the portal down on `AppExit` or an explicit teardown command.
#[allow(clippy::too_many_arguments)]
pub fn teardown_system(
    mut exits: EventReader<AppExit>,
    mut portal_commands: EventReader<PortalCommand>,
    mut commands: Commands,
    mut machine: ResMut<PortalStateMachine>,
    mut driver: ResMut<RenderDriver>,
    mut compositor: ResMut<StencilCompositor>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<PortalMaterial>>,
    mut rpc: ResMut<WebRpcInterface>,
    roots: Query<Entity, Or<(With<PortalGroup>, With<InsideRoomRoot>, With<ApertureDepthMask>)>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let exiting = exits.read().count() > 0;
    let requested = portal_commands
        .read()
        .any(|command| *command == PortalCommand::Teardown);
    if !exiting && !requested {
        return;
    }

    let steps = teardown_portal(
        &mut machine,
        &mut driver,
        &mut compositor,
        &mut meshes,
        &mut materials,
    );
    for step in &steps {
        match step {
            TeardownStep::EndSession(id) => {
                rpc.send_notification(
                    "end_tracking_session",
                    serde_json::json!({ "session_id": id }),
                );
            }
            TeardownStep::ReleaseGpu(report) => {
                info!(
                    "Released {} meshes and {} materials",
                    report.meshes, report.materials
                );
            }
            _ => debug!("Teardown: {:?}", step),
        }
    }
    for entity in &roots {
        commands.entity(entity).despawn();
    }
    println!("→ Portal torn down");
    next_state.set(AppState::TornDown);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::render::compositor::OwnedContent;
    use crate::portal::tracking::TrackingSession;
    use crate::rpc::web_rpc::{RpcFlush, send_outgoing_messages};
    use bevy::state::app::StatesPlugin;

    struct Fixture {
        machine: PortalStateMachine,
        driver: RenderDriver,
        compositor: StencilCompositor,
        meshes: Assets<Mesh>,
        materials: Assets<PortalMaterial>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut meshes = Assets::<Mesh>::default();
            let mut materials = Assets::<PortalMaterial>::default();
            let aperture = materials.add(PortalMaterial::default());
            let mesh = meshes.add(Mesh::from(Circle::new(1.0)));
            let owned = OwnedContent {
                meshes: vec![mesh],
                materials: vec![aperture.clone()],
            };
            let mut compositor = StencilCompositor::new(aperture, &[], owned);
            compositor.setup(&mut materials);
            Self {
                machine: PortalStateMachine::default(),
                driver: RenderDriver::default(),
                compositor,
                meshes,
                materials,
            }
        }

        fn teardown(&mut self) -> Vec<TeardownStep> {
            teardown_portal(
                &mut self.machine,
                &mut self.driver,
                &mut self.compositor,
                &mut self.meshes,
                &mut self.materials,
            )
        }
    }

    #[test]
    fn tracking_teardown_runs_every_step_in_order() {
        let mut f = Fixture::new();
        f.driver.begin_handshake().unwrap();
        f.driver
            .install_tracking(TrackingSession::new(SessionId(3)))
            .unwrap();

        assert_eq!(
            f.teardown(),
            vec![
                TeardownStep::CancelDwellTimer,
                TeardownStep::StopLoop,
                TeardownStep::CancelHitTest,
                TeardownStep::EndSession(SessionId(3)),
                TeardownStep::ReleaseGpu(DisposeReport {
                    meshes: 1,
                    materials: 1,
                }),
            ]
        );
        assert!(f.driver.is_stopped());
        assert!(f.meshes.is_empty());
    }

    #[test]
    fn software_teardown_skips_session_steps() {
        let mut f = Fixture::new();
        let steps = f.teardown();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1], TeardownStep::StopLoop);
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut f = Fixture::new();
        f.teardown();
        assert!(f.teardown().is_empty());
        assert!(f.machine.is_cancelled());
    }

    #[derive(Resource, Default)]
    struct QueuedBeforeFlush(Vec<String>);

    fn record_queued(rpc: Res<WebRpcInterface>, mut queued: ResMut<QueuedBeforeFlush>) {
        queued
            .0
            .extend(rpc.pending_methods().into_iter().map(str::to_string));
    }

    #[test]
    fn app_exit_ends_the_session_before_the_last_flush() {
        let Fixture {
            machine,
            mut driver,
            compositor,
            meshes,
            materials,
        } = Fixture::new();
        driver.begin_handshake().unwrap();
        driver
            .install_tracking(TrackingSession::new(SessionId(5)))
            .unwrap();

        let mut app = App::new();
        app.add_plugins(StatesPlugin)
            .init_state::<AppState>()
            .add_event::<PortalCommand>()
            .init_resource::<WebRpcInterface>()
            .init_resource::<QueuedBeforeFlush>()
            .insert_resource(machine)
            .insert_resource(driver)
            .insert_resource(compositor)
            .insert_resource(meshes)
            .insert_resource(materials)
            .add_systems(
                Last,
                (
                    teardown_system.before(RpcFlush),
                    record_queued.after(teardown_system).before(RpcFlush),
                    send_outgoing_messages.in_set(RpcFlush),
                ),
            );

        app.world_mut().send_event(AppExit::Success);
        app.update();

        let queued = &app.world().resource::<QueuedBeforeFlush>().0;
        assert_eq!(queued, &vec!["end_tracking_session".to_string()]);
        assert!(app.world().resource::<WebRpcInterface>().pending_methods().is_empty());
        assert!(app.world().resource::<RenderDriver>().is_stopped());

        app.update();
        assert_eq!(
            *app.world().resource::<State<AppState>>().get(),
            AppState::TornDown
        );
    }
}
