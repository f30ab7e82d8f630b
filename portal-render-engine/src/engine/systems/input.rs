use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowOccluded};
use serde::{Deserialize, Serialize};

use crate::portal::state_machine::{PortalStateMachine, TransitionCause};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Device orientation in degrees. Missing angles read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

/// Pointer input consumed by one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerFrame {
    pub press: Option<Vec2>,
    pub drag: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct PointerRegister {
    pressed: bool,
    last: Vec2,
    pending_press: Option<Vec2>,
    drag: Vec2,
}

impl PointerRegister {
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn down(&mut self, position: Vec2) {
        self.pressed = true;
        self.last = position;
        self.pending_press = Some(position);
    }

    pub fn moved(&mut self, position: Vec2) {
        if !self.pressed {
            return;
        }
        self.drag += position - self.last;
        self.last = position;
    }

    pub fn up(&mut self) {
        self.pressed = false;
    }

    pub fn take_frame(&mut self) -> PointerFrame {
        PointerFrame {
            press: self.pending_press.take(),
            drag: std::mem::take(&mut self.drag),
        }
    }
}

/// Latest-sample registers written by the input adapters and read once per frame.
#[derive(Resource, Debug, Default)]
pub struct InputRegisters {
    pub orientation: Option<OrientationSample>,
    pub pointer: PointerRegister,
    pub viewport: Option<Vec2>,
}

/// Intents from the user or the host shell.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalCommand {
    Enter,
    Exit,
    VisibilityHidden,
    Teardown,
}

/// Mouse and touch into the pointer register; window size into the viewport register.
pub fn collect_pointer_input(
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut registers: ResMut<InputRegisters>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    registers.viewport = Some(Vec2::new(window.width(), window.height()));

    if let Some(cursor) = window.cursor_position() {
        if mouse.just_pressed(MouseButton::Left) {
            registers.pointer.down(cursor);
        } else if mouse.pressed(MouseButton::Left) {
            registers.pointer.moved(cursor);
        }
    }
    if mouse.just_released(MouseButton::Left) {
        registers.pointer.up();
    }

    for touch in touches.iter_just_pressed() {
        registers.pointer.down(touch.position());
    }
    if let Some(touch) = touches.iter().next() {
        registers.pointer.moved(touch.position());
    }
    if touches.any_just_released() || touches.any_just_canceled() {
        registers.pointer.up();
    }
}

pub fn watch_window_occlusion(
    mut occlusions: EventReader<WindowOccluded>,
    mut commands: EventWriter<PortalCommand>,
) {
    for occlusion in occlusions.read() {
        if occlusion.occluded {
            commands.write(PortalCommand::VisibilityHidden);
        }
    }
}

pub fn apply_portal_commands(
    mut commands: EventReader<PortalCommand>,
    mut machine: ResMut<PortalStateMachine>,
) {
    for command in commands.read() {
        let applied = match command {
            PortalCommand::Enter => machine.begin_entering(TransitionCause::UserEnter),
            PortalCommand::Exit => machine.exit(),
            PortalCommand::VisibilityHidden => machine.visibility_hidden(),
            PortalCommand::Teardown => continue,
        };
        if !applied {
            debug!("{:?} ignored in state {:?}", command, machine.state());
        }
    }
}

/// Samples pushed by browser listeners outside the schedule.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
struct PlatformSamples {
    orientation: Option<OrientationSample>,
    hidden: bool,
}

#[cfg(target_arch = "wasm32")]
#[derive(Resource)]
pub struct PlatformSignals(std::sync::Arc<std::sync::Mutex<PlatformSamples>>);

#[cfg(target_arch = "wasm32")]
pub fn setup_platform_listeners(mut commands: Commands) {
    use std::sync::{Arc, Mutex};
    use web_sys::{window, DeviceOrientationEvent, VisibilityState};

    let samples: Arc<Mutex<PlatformSamples>> = Arc::new(Mutex::new(PlatformSamples::default()));
    let Some(window) = window() else {
        warn!("Window object not available, device listeners skipped");
        return;
    };

    let orientation_samples = samples.clone();
    let on_orientation = Closure::wrap(Box::new(move |event: DeviceOrientationEvent| {
        let sample = OrientationSample {
            alpha: event.alpha().unwrap_or(0.0) as f32,
            beta: event.beta().unwrap_or(0.0) as f32,
            gamma: event.gamma().unwrap_or(0.0) as f32,
        };
        if let Ok(mut samples) = orientation_samples.lock() {
            samples.orientation = Some(sample);
        }
    }) as Box<dyn FnMut(DeviceOrientationEvent)>);
    window
        .add_event_listener_with_callback("deviceorientation", on_orientation.as_ref().unchecked_ref())
        .expect("Failed to register deviceorientation listener");
    on_orientation.forget();

    if let Some(document) = window.document() {
        let visibility_samples = samples.clone();
        let watched = document.clone();
        let on_visibility = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            if watched.visibility_state() == VisibilityState::Hidden {
                if let Ok(mut samples) = visibility_samples.lock() {
                    samples.hidden = true;
                }
            }
        }) as Box<dyn FnMut(web_sys::Event)>);
        document
            .add_event_listener_with_callback("visibilitychange", on_visibility.as_ref().unchecked_ref())
            .expect("Failed to register visibilitychange listener");
        on_visibility.forget();
    }

    commands.insert_resource(PlatformSignals(samples));
}

#[cfg(target_arch = "wasm32")]
pub fn poll_platform_signals(
    signals: Option<Res<PlatformSignals>>,
    mut registers: ResMut<InputRegisters>,
    mut commands: EventWriter<PortalCommand>,
) {
    let Some(signals) = signals else {
        return;
    };
    let Ok(mut samples) = signals.0.lock() else {
        return;
    };
    if let Some(sample) = samples.orientation.take() {
        registers.orientation = Some(sample);
    }
    if std::mem::take(&mut samples.hidden) {
        commands.write(PortalCommand::VisibilityHidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_accumulates_only_while_pressed() {
        let mut pointer = PointerRegister::default();
        pointer.moved(Vec2::new(50.0, 50.0));
        assert_eq!(pointer.take_frame(), PointerFrame::default());

        pointer.down(Vec2::new(10.0, 10.0));
        pointer.moved(Vec2::new(20.0, 5.0));
        pointer.moved(Vec2::new(25.0, 0.0));
        pointer.up();
        pointer.moved(Vec2::new(100.0, 100.0));

        let frame = pointer.take_frame();
        assert_eq!(frame.press, Some(Vec2::new(10.0, 10.0)));
        assert_eq!(frame.drag, Vec2::new(15.0, -10.0));
        assert_eq!(pointer.take_frame(), PointerFrame::default());
    }

    #[test]
    fn orientation_sample_defaults_missing_angles() {
        let sample: OrientationSample =
            serde_json::from_value(serde_json::json!({ "alpha": 90.0 })).unwrap();
        assert_eq!(
            sample,
            OrientationSample {
                alpha: 90.0,
                beta: 0.0,
                gamma: 0.0,
            }
        );
    }
}
