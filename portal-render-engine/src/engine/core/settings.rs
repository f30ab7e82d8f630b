use std::time::Duration;

use bevy::asset::LoadState;
use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use constants::interaction::ENTER_DWELL_MS;

use crate::engine::camera::portal_camera::{CameraController, CameraSettings};
use crate::engine::core::app_state::AppState;
use crate::engine::scene::scene_graph::SceneGraph;
use crate::portal::placement::{PlacementResolver, PlacementSettings};
use crate::portal::proximity::{ProximityDetector, ProximitySettings};
use crate::portal::state_machine::PortalStateMachine;

pub const SETTINGS_PATH: &str = "config/default.portal.json";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub dwell_ms: u64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            dwell_ms: ENTER_DWELL_MS,
        }
    }
}

/// Runtime overrides for the compile-time defaults in `constants`.
#[derive(Asset, TypePath, Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub placement: PlacementSettings,
    pub camera: CameraSettings,
    pub proximity: ProximitySettings,
    pub transition: TransitionSettings,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("walkable band is empty: min height {min} > max height {max}")]
    EmptyHeightBand { min: f32, max: f32 },
    #[error("standoff distance must be positive, got {0}")]
    NonPositiveStandoff(f32),
    #[error("proximity threshold must be in (0, 2], got {0}")]
    ThresholdOutOfRange(f32),
    #[error("field of view must be in (0, 180) degrees, got {0}")]
    FieldOfViewOutOfRange(f32),
}

impl PortalSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let placement = &self.placement;
        if placement.min_height > placement.max_height {
            return Err(SettingsError::EmptyHeightBand {
                min: placement.min_height,
                max: placement.max_height,
            });
        }
        if placement.standoff_distance <= 0.0 {
            return Err(SettingsError::NonPositiveStandoff(placement.standoff_distance));
        }
        let threshold = self.proximity.ndc_threshold;
        if !(threshold > 0.0 && threshold <= 2.0) {
            return Err(SettingsError::ThresholdOutOfRange(threshold));
        }
        let fov = self.camera.fov_degrees;
        if !(fov > 0.0 && fov < 180.0) {
            return Err(SettingsError::FieldOfViewOutOfRange(fov));
        }
        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.transition.dwell_ms)
    }
}

#[derive(Resource, Default)]
pub struct SettingsLoader {
    handle: Option<Handle<PortalSettings>>,
}

pub fn start_loading_settings(mut loader: ResMut<SettingsLoader>, asset_server: Res<AssetServer>) {
    loader.handle = Some(asset_server.load(SETTINGS_PATH));
}

/// Waits for the settings file, applies it (or the defaults on failure) and starts running.
pub fn load_settings_system(
    loader: Res<SettingsLoader>,
    asset_server: Res<AssetServer>,
    settings_assets: Res<Assets<PortalSettings>>,
    mut targets: SettingsTargets,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let Some(handle) = loader.handle.as_ref() else {
        return;
    };

    let settings = if let Some(settings) = settings_assets.get(handle) {
        match settings.validate() {
            Ok(()) => {
                println!("✓ Portal settings loaded from {}", SETTINGS_PATH);
                settings.clone()
            }
            Err(error) => {
                warn!("Invalid portal settings ({}), using defaults", error);
                PortalSettings::default()
            }
        }
    } else if let Some(LoadState::Failed(error)) = asset_server.get_load_state(handle) {
        warn!("Portal settings failed to load ({}), using defaults", error);
        PortalSettings::default()
    } else {
        return;
    };

    targets.apply(&settings);
    next_state.set(AppState::Running);
}

#[derive(bevy::ecs::system::SystemParam)]
pub struct SettingsTargets<'w, 's> {
    resolver: ResMut<'w, PlacementResolver>,
    camera: ResMut<'w, CameraController>,
    proximity: ResMut<'w, ProximityDetector>,
    machine: ResMut<'w, PortalStateMachine>,
    scene: ResMut<'w, SceneGraph>,
    projections: Query<'w, 's, &'static mut Projection>,
}

impl SettingsTargets<'_, '_> {
    fn apply(&mut self, settings: &PortalSettings) {
        self.resolver.set_settings(settings.placement);
        self.camera.set_settings(settings.camera);
        self.proximity.set_settings(settings.proximity);
        self.machine.set_dwell(settings.dwell());

        let fov = settings.camera.fov_degrees.to_radians();
        self.scene.camera.fov_y = fov;
        for mut projection in &mut self.projections {
            if let Projection::Perspective(perspective) = projection.as_mut() {
                perspective.fov = fov;
            }
        }
        info!(
            "Settings applied: standoff {}m, proximity {}, dwell {}ms",
            settings.placement.standoff_distance,
            settings.proximity.ndc_threshold,
            settings.transition.dwell_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_settings_match_defaults() {
        let settings: PortalSettings =
            serde_json::from_str(include_str!("../../../assets/config/default.portal.json")).unwrap();
        assert_eq!(settings, PortalSettings::default());
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let settings: PortalSettings = serde_json::from_value(serde_json::json!({
            "proximity": { "ndc_threshold": 0.6 },
            "transition": {}
        }))
        .unwrap();
        assert_eq!(settings.proximity.ndc_threshold, 0.6);
        assert_eq!(settings.placement, PlacementSettings::default());
        assert_eq!(settings.dwell(), Duration::from_millis(ENTER_DWELL_MS));
    }

    #[test]
    fn inverted_height_band_is_rejected() {
        let settings: PortalSettings = serde_json::from_value(serde_json::json!({
            "placement": { "min_height": 2.5, "max_height": 1.0 }
        }))
        .unwrap();
        assert_eq!(
            settings.validate(),
            Err(SettingsError::EmptyHeightBand { min: 2.5, max: 1.0 })
        );
    }

    #[test]
    fn threshold_must_stay_in_ndc_range() {
        let mut settings = PortalSettings::default();
        settings.proximity.ndc_threshold = 0.0;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::ThresholdOutOfRange(0.0))
        );
    }
}
