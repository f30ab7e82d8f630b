use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    /// Waiting for `config/default.portal.json`.
    #[default]
    Loading,
    Running,
    /// Loops stopped and GPU resources released. Terminal.
    TornDown,
}

#[derive(Component)]
pub struct FpsText;

pub fn transition_to_running(mut next_state: ResMut<NextState<AppState>>) {
    println!("→ Settings applied, transitioning to Running state");
    next_state.set(AppState::Running);
}
