use bevy::prelude::*;

use crate::engine::camera::portal_camera::CameraController;
use crate::engine::render::backend::RenderBackend;
use crate::engine::render::compositor::StencilCompositor;
use crate::engine::render::portal_material::PortalMaterial;
use crate::engine::scene::scene_graph::SceneGraph;
use crate::engine::systems::input::InputRegisters;
use crate::portal::placement::{PlacementMode, PlacementResolver, PortalAnchor};
use crate::portal::proximity::ProximityDetector;
use crate::portal::state_machine::{PortalStateMachine, TransitionCause};
use crate::portal::tracking::TrackedFrame;

/// What a frame did besides drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub placed: Option<PortalAnchor>,
    pub proximity_fired: bool,
    pub tracking_requested: bool,
    pub rendered: bool,
}

/// Borrowed view of everything one portal frame touches.
pub struct FrameStep<'a> {
    pub scene: &'a mut SceneGraph,
    pub camera: &'a mut CameraController,
    pub proximity: &'a mut ProximityDetector,
    pub machine: &'a mut PortalStateMachine,
    pub resolver: &'a mut PlacementResolver,
    pub compositor: &'a mut StencilCompositor,
    pub materials: &'a mut Assets<PortalMaterial>,
}

impl FrameStep<'_> {
    /// Pointer placement and drag, camera blend, proximity, then render.
    pub fn software<B: RenderBackend>(
        &mut self,
        delta_secs: f32,
        inputs: &mut InputRegisters,
        backend: &mut B,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        if let Some(viewport) = inputs.viewport {
            self.scene.set_viewport(viewport);
        }

        let pointer = inputs.pointer.take_frame();
        match self.resolver.mode() {
            PlacementMode::PointerPlane => {
                if let Some(press) = pointer.press {
                    report.placed = self.place_from_pointer(press);
                }
                self.camera.apply_drag(pointer.drag);
            }
            PlacementMode::WorldHitTest => {
                report.tracking_requested = pointer.press.is_some();
            }
        }

        let pose = self.camera.update(
            delta_secs,
            inputs.orientation.as_ref(),
            self.machine.state(),
            self.scene.anchor(),
        );
        self.scene.camera.set_pose(&pose);

        self.finish(backend, &mut report);
        report
    }

    /// Viewer pose sync, hit-test placement, proximity, then render.
    pub fn tracked<B: RenderBackend>(&mut self, frame: &TrackedFrame, backend: &mut B) -> FrameReport {
        let mut report = FrameReport::default();
        if let Some(viewer) = frame.viewer {
            self.scene
                .camera
                .set_pose_parts(viewer.position, viewer.orientation);
            self.camera.sync_to_viewer(viewer.position, viewer.orientation);
        }

        if let Some(anchor) = self.resolver.accept_hit_results(&frame.hits) {
            self.scene.set_anchor(anchor);
            report.placed = Some(anchor);
        }

        self.finish(backend, &mut report);
        report
    }

    fn place_from_pointer(&mut self, press: Vec2) -> Option<PortalAnchor> {
        let Some(viewport) = self.scene.viewport() else {
            debug!("Pointer press before the viewport is known, placement skipped");
            return None;
        };
        let anchor = self
            .resolver
            .place_from_pointer(press, viewport, &self.scene.camera)?;
        self.scene.set_anchor(anchor);
        Some(anchor)
    }

    fn finish<B: RenderBackend>(&mut self, backend: &mut B, report: &mut FrameReport) {
        let scale_y = self.scene.portal_scale.y;
        if self.proximity.evaluate(
            self.machine.state(),
            &self.scene.camera,
            self.scene.anchor(),
            scale_y,
        ) {
            report.proximity_fired = self.machine.begin_entering(TransitionCause::Proximity);
        }
        report.rendered =
            self.compositor
                .render(self.machine.state(), backend, self.scene, self.materials);
    }
}
