use bevy::prelude::*;
use bevy::window::{CompositeAlphaMode, PresentMode};

use crate::portal::placement::PlacementMode;

pub fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            transparent: true,
            composite_alpha_mode: CompositeAlphaMode::PreMultiplied,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            title: "Portal".into(),
            present_mode: PresentMode::AutoVsync,
            composite_alpha_mode: CompositeAlphaMode::Auto,
            ..default()
        }
    }
}

/// World hit-testing when the host page advertises tracking support, pointer placement otherwise.
pub fn detect_placement_mode() -> PlacementMode {
    #[cfg(target_arch = "wasm32")]
    {
        let search = web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default();
        placement_mode_from_query(&search)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        PlacementMode::PointerPlane
    }
}

pub fn placement_mode_from_query(search: &str) -> PlacementMode {
    let tracking = search
        .trim_start_matches('?')
        .split('&')
        .any(|pair| pair == "tracking=available");
    if tracking {
        PlacementMode::WorldHitTest
    } else {
        PlacementMode::PointerPlane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_flag_selects_hit_testing() {
        assert_eq!(
            placement_mode_from_query("?lang=en&tracking=available"),
            PlacementMode::WorldHitTest
        );
        assert_eq!(
            placement_mode_from_query("?tracking=unavailable"),
            PlacementMode::PointerPlane
        );
        assert_eq!(placement_mode_from_query(""), PlacementMode::PointerPlane);
    }
}
