use bevy::prelude::*;

use constants::render_settings::STENCIL_REFERENCE;

use crate::engine::render::backend::RenderBackend;
use crate::engine::render::portal_material::PortalMaterial;
use crate::engine::render::stencil::{StencilConfig, StencilSnapshots};
use crate::engine::scene::scene_graph::{SceneGraph, SceneLayer};
use crate::portal::state_machine::PortalState;

/// Asset handles the compositor keeps alive and releases on dispose.
#[derive(Debug, Default, Clone)]
pub struct OwnedContent {
    pub meshes: Vec<Handle<Mesh>>,
    pub materials: Vec<Handle<PortalMaterial>>,
}

impl OwnedContent {
    pub fn extend(&mut self, other: OwnedContent) {
        self.meshes.extend(other.meshes);
        self.materials.extend(other.materials);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub meshes: usize,
    pub materials: usize,
}

/// Composites the inside scene through the portal aperture.
#[derive(Resource, Debug)]
pub struct StencilCompositor {
    aperture: Handle<PortalMaterial>,
    inside: Vec<AssetId<PortalMaterial>>,
    owned: OwnedContent,
    snapshots: StencilSnapshots,
    reference: u32,
    disposed: bool,
}

impl StencilCompositor {
    pub fn new(
        aperture: Handle<PortalMaterial>,
        inside_materials: &[Handle<PortalMaterial>],
        owned: OwnedContent,
    ) -> Self {
        Self {
            aperture,
            inside: inside_materials.iter().map(Handle::id).collect(),
            owned,
            snapshots: StencilSnapshots::default(),
            reference: STENCIL_REFERENCE,
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn aperture(&self) -> &Handle<PortalMaterial> {
        &self.aperture
    }

    pub fn snapshots(&self) -> &StencilSnapshots {
        &self.snapshots
    }

    /// One-time material configuration: the aperture only writes the stencil and the inside
    /// scene is masked to it.
    pub fn setup(&mut self, materials: &mut Assets<PortalMaterial>) {
        match materials.get_mut(&self.aperture) {
            Some(aperture) => {
                aperture.colour_write = false;
                aperture.depth_write = false;
                aperture.stencil = StencilConfig::aperture_writer(self.reference);
            }
            None => warn!("Portal aperture material missing during compositor setup"),
        }
        self.apply_portal_stencil(materials);
        info!(
            "Stencil compositor ready: {} inside materials masked with ref {}",
            self.inside.len(),
            self.reference
        );
    }

    pub fn apply_portal_stencil(&mut self, materials: &mut Assets<PortalMaterial>) -> usize {
        let mask = StencilConfig::masked_by(self.reference);
        self.snapshots.apply(materials, &self.inside, mask)
    }

    pub fn clear_portal_stencil(&mut self, materials: &mut Assets<PortalMaterial>) -> usize {
        self.snapshots.clear(materials)
    }

    /// Outside view with the inside scene revealed through the aperture.
    pub fn render_outside<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        scene: &mut SceneGraph,
        materials: &mut Assets<PortalMaterial>,
    ) {
        self.apply_portal_stencil(materials);
        backend.clear();
        scene.aperture_visible = true;
        backend.set_stencil_test(true);
        backend.render_scene(SceneLayer::Outside, scene);
        backend.clear_depth();
        backend.render_scene(SceneLayer::Inside, scene);
        backend.set_stencil_test(false);
        scene.aperture_visible = false;
    }

    pub fn render_inside<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        scene: &mut SceneGraph,
        materials: &mut Assets<PortalMaterial>,
    ) {
        self.clear_portal_stencil(materials);
        backend.set_stencil_test(false);
        backend.clear();
        backend.render_scene(SceneLayer::Inside, scene);
    }

    /// Dispatches on state. Returns false once disposed.
    pub fn render<B: RenderBackend>(
        &mut self,
        state: PortalState,
        backend: &mut B,
        scene: &mut SceneGraph,
        materials: &mut Assets<PortalMaterial>,
    ) -> bool {
        if self.disposed {
            return false;
        }
        match state {
            PortalState::Outside | PortalState::Entering => {
                self.render_outside(backend, scene, materials)
            }
            PortalState::Inside => self.render_inside(backend, scene, materials),
        }
        true
    }

    /// Restores materials and releases every owned asset. Safe to call more than once.
    pub fn dispose(
        &mut self,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<PortalMaterial>,
    ) -> Option<DisposeReport> {
        if self.disposed {
            return None;
        }
        self.clear_portal_stencil(materials);

        let mut report = DisposeReport::default();
        for handle in self.owned.meshes.drain(..) {
            if meshes.remove(&handle).is_some() {
                report.meshes += 1;
            }
        }
        for handle in self.owned.materials.drain(..) {
            if materials.remove(&handle).is_some() {
                report.materials += 1;
            }
        }
        self.inside.clear();
        self.disposed = true;
        Some(report)
    }
}
