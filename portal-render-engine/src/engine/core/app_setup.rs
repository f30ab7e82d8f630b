use bevy::asset::AssetMetaCheck;
use bevy::core_pipeline::prepass::DepthPrepass;
use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy::render::camera::ClearColorConfig;
use bevy_common_assets::json::JsonAssetPlugin;

use constants::render_settings::{CAMERA_FAR, CAMERA_NEAR, INSIDE_BACKGROUND, OUTSIDE_CLEAR_COLOUR};

use crate::engine::camera::portal_camera::CameraController;
use crate::engine::core::app_state::{AppState, FpsText};
use crate::engine::core::settings::{
    PortalSettings, SettingsLoader, load_settings_system, start_loading_settings,
};
use crate::engine::core::teardown::teardown_system;
use crate::engine::core::window_config::{create_window_config, detect_placement_mode};
use crate::engine::render::backend::{CompositeFrame, present_composite_frame};
use crate::engine::render::compositor::StencilCompositor;
use crate::engine::render::depth_mask::update_aperture_depth_mask;
use crate::engine::render::portal_material::PortalMaterial;
use crate::engine::scene::inside_room::spawn_inside_room;
use crate::engine::scene::portal_ring::spawn_portal_ring;
use crate::engine::scene::scene_graph::{
    InsideCamera, OutsideCamera, SceneGraph, SceneLayer, sync_scene_transforms,
};
use crate::engine::systems::fps_tracking::{fps_notification_system, fps_text_update_system};
use crate::engine::systems::input::{
    InputRegisters, PortalCommand, apply_portal_commands, collect_pointer_input,
    watch_window_occlusion,
};
use crate::engine::systems::notifications::{
    publish_placements, publish_transitions, send_initial_hint,
};
use crate::engine::systems::render_loop::{RenderDriver, drive_software_loop, drive_tracking_loop};
use crate::portal::placement::{PlacementResolver, PortalPlaced};
use crate::portal::proximity::ProximityDetector;
use crate::portal::state_machine::{PortalStateMachine, PortalTransition, advance_dwell_timer};
use crate::portal::tracking::TrackingEvent;
use crate::rpc::web_rpc::{RpcFlush, WebRpcPlugin};

#[cfg(target_arch = "wasm32")]
use crate::engine::systems::input::{poll_platform_signals, setup_platform_listeners};

pub fn create_app() -> App {
    let mut app = App::new();
    let mode = detect_placement_mode();

    app.add_plugins(create_default_plugins())
        .add_plugins(MaterialPlugin::<PortalMaterial>::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(JsonAssetPlugin::<PortalSettings>::new(&["portal.json"]))
        .add_plugins(WebRpcPlugin)
        .init_state::<AppState>()
        .insert_resource(ClearColor(OUTSIDE_CLEAR_COLOUR))
        .insert_resource(PlacementResolver::new(mode))
        .init_resource::<SettingsLoader>()
        .init_resource::<SceneGraph>()
        .init_resource::<CameraController>()
        .init_resource::<ProximityDetector>()
        .init_resource::<PortalStateMachine>()
        .init_resource::<RenderDriver>()
        .init_resource::<InputRegisters>()
        .init_resource::<CompositeFrame>()
        .add_event::<PortalCommand>()
        .add_event::<TrackingEvent>()
        .add_event::<PortalTransition>()
        .add_event::<PortalPlaced>()
        .add_systems(Startup, (setup, start_loading_settings, send_initial_hint))
        .add_systems(
            Update,
            load_settings_system.run_if(in_state(AppState::Loading)),
        )
        .add_systems(
            Update,
            (
                collect_pointer_input,
                watch_window_occlusion,
                apply_portal_commands,
                advance_dwell_timer,
                drive_software_loop,
                drive_tracking_loop,
                publish_transitions,
                publish_placements,
                sync_scene_transforms,
                present_composite_frame,
                update_aperture_depth_mask,
            )
                .chain()
                .run_if(in_state(AppState::Running)),
        )
        .add_systems(
            Update,
            (fps_text_update_system, fps_notification_system)
                .run_if(not(in_state(AppState::TornDown))),
        )
        .add_systems(
            Last,
            teardown_system
                .before(RpcFlush)
                .run_if(not(in_state(AppState::TornDown))),
        );

    #[cfg(target_arch = "wasm32")]
    app.add_systems(Startup, setup_platform_listeners).add_systems(
        Update,
        poll_platform_signals
            .before(apply_portal_commands)
            .run_if(in_state(AppState::Running)),
    );

    app
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

/// Cameras, portal ring, inside room and the compositor that owns their GPU resources.
fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<PortalMaterial>>,
    scene: Res<SceneGraph>,
    resolver: Res<PlacementResolver>,
) {
    println!("=== PORTAL RENDER ENGINE ({:?}) ===", resolver.mode());

    spawn_portal_cameras(&mut commands, &scene);

    let ring = spawn_portal_ring(&mut commands, &mut meshes, &mut materials, &scene);
    let room = spawn_inside_room(&mut commands, &mut meshes, &mut materials, &scene);

    let mut owned = ring.owned;
    owned.extend(room.owned);
    let mut compositor =
        StencilCompositor::new(ring.aperture_material, &room.masked_materials, owned);
    compositor.setup(&mut materials);
    commands.insert_resource(compositor);

    #[cfg(not(target_arch = "wasm32"))]
    spawn_ui(&mut commands);
}

fn spawn_portal_cameras(commands: &mut Commands, scene: &SceneGraph) {
    let projection = Projection::Perspective(PerspectiveProjection {
        fov: scene.camera.fov_y,
        near: CAMERA_NEAR,
        far: CAMERA_FAR,
        ..default()
    });
    let transform = scene.camera.transform();

    commands.spawn((
        Camera3d::default(),
        Camera {
            order: 0,
            clear_color: ClearColorConfig::Custom(OUTSIDE_CLEAR_COLOUR),
            ..default()
        },
        projection.clone(),
        transform,
        SceneLayer::Outside.render_layers(),
        OutsideCamera,
        Name::new("OutsideCamera"),
    ));
    commands.spawn((
        Camera3d::default(),
        Camera {
            order: 1,
            clear_color: ClearColorConfig::Custom(INSIDE_BACKGROUND),
            ..default()
        },
        projection,
        transform,
        DepthPrepass,
        SceneLayer::Inside.render_layers(),
        InsideCamera,
        Name::new("InsideCamera"),
    ));
}

/// Native FPS overlay on its own UI camera above both layers.
#[cfg(not(target_arch = "wasm32"))]
fn spawn_ui(commands: &mut Commands) {
    commands.spawn((
        Camera2d,
        Camera {
            order: 2,
            clear_color: ClearColorConfig::None,
            ..default()
        },
        IsDefaultUiCamera,
    ));
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0., 0.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));
        });
}
