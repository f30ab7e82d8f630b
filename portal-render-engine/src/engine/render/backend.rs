use bevy::prelude::*;
use bevy::ecs::query::Has;
use bevy::render::camera::ClearColorConfig;

use constants::render_settings::{INSIDE_BACKGROUND, OUTSIDE_CLEAR_COLOUR};

use crate::engine::scene::scene_graph::{
    InsideCamera, OutsideCamera, PortalAperture, SceneGraph, SceneLayer,
};

/// Immediate-mode surface the compositor draws through.
pub trait RenderBackend {
    /// Clears colour, depth and stencil.
    fn clear(&mut self);
    fn clear_depth(&mut self);
    fn set_stencil_test(&mut self, enabled: bool);
    fn render_scene(&mut self, layer: SceneLayer, scene: &SceneGraph);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    Clear,
    ClearDepth,
    StencilTest(bool),
    RenderScene {
        layer: SceneLayer,
        aperture_visible: bool,
    },
}

/// Commands issued for the frame in flight.
#[derive(Resource, Debug, Default, Clone)]
pub struct CompositeFrame {
    commands: Vec<RenderCommand>,
    frame_index: u64,
}

impl CompositeFrame {
    pub fn begin(&mut self) {
        self.commands.clear();
        self.frame_index += 1;
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn plan(&self) -> FramePlan {
        FramePlan::from_commands(&self.commands)
    }
}

impl RenderBackend for CompositeFrame {
    fn clear(&mut self) {
        self.commands.push(RenderCommand::Clear);
    }

    fn clear_depth(&mut self) {
        self.commands.push(RenderCommand::ClearDepth);
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.commands.push(RenderCommand::StencilTest(enabled));
    }

    fn render_scene(&mut self, layer: SceneLayer, scene: &SceneGraph) {
        self.commands.push(RenderCommand::RenderScene {
            layer,
            aperture_visible: scene.aperture_visible,
        });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenePass {
    pub stencil_test: bool,
    pub aperture_visible: bool,
    /// Colour from earlier passes survives under this one.
    pub over_previous: bool,
}

/// What the Bevy cameras should do to reproduce a recorded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramePlan {
    pub outside: Option<ScenePass>,
    pub inside: Option<ScenePass>,
}

impl FramePlan {
    pub fn from_commands(commands: &[RenderCommand]) -> Self {
        let mut plan = FramePlan::default();
        let mut stencil_test = false;
        let mut drawn_since_clear = false;
        for command in commands {
            match *command {
                RenderCommand::Clear => drawn_since_clear = false,
                RenderCommand::ClearDepth => {}
                RenderCommand::StencilTest(enabled) => stencil_test = enabled,
                RenderCommand::RenderScene {
                    layer,
                    aperture_visible,
                } => {
                    let pass = ScenePass {
                        stencil_test,
                        aperture_visible,
                        over_previous: drawn_since_clear,
                    };
                    match layer {
                        SceneLayer::Outside => plan.outside = Some(pass),
                        SceneLayer::Inside => plan.inside = Some(pass),
                    }
                    drawn_since_clear = true;
                }
            }
        }
        plan
    }

    /// True when the inside scene is only visible through the aperture.
    pub fn is_composited(&self) -> bool {
        self.inside.is_some_and(|pass| pass.over_previous && pass.stencil_test)
    }
}

/// Maps the recorded frame onto the two layer cameras and the aperture visibility.
pub fn present_composite_frame(
    frame: Res<CompositeFrame>,
    mut cameras: Query<(&mut Camera, Has<OutsideCamera>, Has<InsideCamera>)>,
    mut apertures: Query<&mut Visibility, With<PortalAperture>>,
) {
    if !frame.is_changed() {
        return;
    }
    let plan = frame.plan();

    for (mut camera, is_outside, is_inside) in cameras.iter_mut() {
        if is_outside {
            camera.is_active = plan.outside.is_some();
            camera.clear_color = ClearColorConfig::Custom(OUTSIDE_CLEAR_COLOUR);
        } else if is_inside {
            camera.is_active = plan.inside.is_some();
            camera.clear_color = if plan.inside.is_some_and(|pass| pass.over_previous) {
                ClearColorConfig::None
            } else {
                ClearColorConfig::Custom(INSIDE_BACKGROUND)
            };
        }
    }

    let aperture_visible = plan.outside.is_some_and(|pass| pass.aperture_visible);
    for mut visibility in apertures.iter_mut() {
        *visibility = if aperture_visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composited_plan_draws_inside_over_outside() {
        let commands = [
            RenderCommand::Clear,
            RenderCommand::StencilTest(true),
            RenderCommand::RenderScene {
                layer: SceneLayer::Outside,
                aperture_visible: true,
            },
            RenderCommand::ClearDepth,
            RenderCommand::RenderScene {
                layer: SceneLayer::Inside,
                aperture_visible: true,
            },
            RenderCommand::StencilTest(false),
        ];
        let plan = FramePlan::from_commands(&commands);
        assert!(plan.is_composited());
        assert_eq!(
            plan.outside,
            Some(ScenePass {
                stencil_test: true,
                aperture_visible: true,
                over_previous: false,
            })
        );
    }

    #[test]
    fn inside_only_plan_is_not_composited() {
        let commands = [
            RenderCommand::StencilTest(false),
            RenderCommand::Clear,
            RenderCommand::RenderScene {
                layer: SceneLayer::Inside,
                aperture_visible: false,
            },
        ];
        let plan = FramePlan::from_commands(&commands);
        assert!(plan.outside.is_none());
        assert!(!plan.is_composited());
        assert!(!plan.inside.unwrap().over_previous);
    }
}
