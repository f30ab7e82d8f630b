use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::render_resource::{
    CompareFunction, StencilFaceState, StencilOperation, StencilState,
};

use crate::engine::render::portal_material::PortalMaterial;

/// Per-material stencil behaviour, mirrored into the pipeline when the depth target has a
/// stencil aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilConfig {
    pub write: bool,
    pub reference: u32,
    pub compare: CompareFunction,
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            write: false,
            reference: 0,
            compare: CompareFunction::Always,
            fail: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
        }
    }
}

impl StencilConfig {
    /// Marks every covered pixel with `reference`.
    pub fn aperture_writer(reference: u32) -> Self {
        Self {
            write: true,
            reference,
            compare: CompareFunction::Always,
            fail: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            pass: StencilOperation::Replace,
        }
    }

    /// Draws only where the buffer already holds `reference`.
    pub fn masked_by(reference: u32) -> Self {
        Self {
            write: true,
            reference,
            compare: CompareFunction::Equal,
            fail: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
        }
    }

    pub fn to_stencil_state(&self) -> StencilState {
        let face = StencilFaceState {
            compare: self.compare,
            fail_op: self.fail,
            depth_fail_op: self.depth_fail,
            pass_op: self.pass,
        };
        StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask: if self.write { 0xff } else { 0x00 },
        }
    }
}

/// Original stencil configs of masked materials, captured at most once each.
#[derive(Debug, Default, Clone)]
pub struct StencilSnapshots {
    saved: HashMap<AssetId<PortalMaterial>, StencilConfig>,
}

impl StencilSnapshots {
    pub fn saved(&self, id: AssetId<PortalMaterial>) -> Option<&StencilConfig> {
        self.saved.get(&id)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Overrides every target with `mask`. Materials already carrying the mask are left
    /// untouched so repeated calls do not mark assets as changed.
    pub fn apply(
        &mut self,
        materials: &mut Assets<PortalMaterial>,
        targets: &[AssetId<PortalMaterial>],
        mask: StencilConfig,
    ) -> usize {
        let mut changed = 0;
        for &id in targets {
            let Some(current) = materials.get(id).map(|m| m.stencil) else {
                warn!("Stencil mask target {:?} is missing", id);
                continue;
            };
            self.saved.entry(id).or_insert(current);
            if current == mask {
                continue;
            }
            if let Some(material) = materials.get_mut(id) {
                material.stencil = mask;
                changed += 1;
            }
        }
        changed
    }

    /// Restores every captured original. A no-op when nothing is overridden.
    pub fn clear(&self, materials: &mut Assets<PortalMaterial>) -> usize {
        let mut changed = 0;
        for (&id, original) in &self.saved {
            let needs_restore = materials.get(id).is_some_and(|m| m.stencil != *original);
            if !needs_restore {
                continue;
            }
            if let Some(material) = materials.get_mut(id) {
                material.stencil = *original;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::render_resource::{CompareFunction as Cf, StencilOperation as Op};
    use proptest::prelude::*;

    fn compare() -> impl Strategy<Value = CompareFunction> {
        prop_oneof![
            Just(Cf::Never),
            Just(Cf::Less),
            Just(Cf::Equal),
            Just(Cf::LessEqual),
            Just(Cf::Greater),
            Just(Cf::NotEqual),
            Just(Cf::GreaterEqual),
            Just(Cf::Always),
        ]
    }

    fn operation() -> impl Strategy<Value = StencilOperation> {
        prop_oneof![
            Just(Op::Keep),
            Just(Op::Zero),
            Just(Op::Replace),
            Just(Op::Invert),
            Just(Op::IncrementClamp),
            Just(Op::DecrementClamp),
            Just(Op::IncrementWrap),
            Just(Op::DecrementWrap),
        ]
    }

    fn config() -> impl Strategy<Value = StencilConfig> {
        (any::<bool>(), 0u32..4, compare(), operation(), operation(), operation()).prop_map(
            |(write, reference, compare, fail, depth_fail, pass)| StencilConfig {
                write,
                reference,
                compare,
                fail,
                depth_fail,
                pass,
            },
        )
    }

    fn material_with(stencil: StencilConfig) -> PortalMaterial {
        PortalMaterial {
            stencil,
            ..default()
        }
    }

    proptest! {
        #[test]
        fn apply_then_clear_restores_originals(
            originals in prop::collection::vec(config(), 1..8),
            applies in 1usize..4,
        ) {
            let mut materials = Assets::<PortalMaterial>::default();
            let handles: Vec<_> = originals
                .iter()
                .map(|config| materials.add(material_with(*config)))
                .collect();
            let ids: Vec<_> = handles.iter().map(|h| h.id()).collect();

            let mut snapshots = StencilSnapshots::default();
            let mask = StencilConfig::masked_by(1);
            for _ in 0..applies {
                snapshots.apply(&mut materials, &ids, mask);
            }
            for id in &ids {
                prop_assert_eq!(materials.get(*id).unwrap().stencil, mask);
            }

            snapshots.clear(&mut materials);
            for (id, original) in ids.iter().zip(&originals) {
                prop_assert_eq!(materials.get(*id).unwrap().stencil, *original);
                prop_assert_eq!(snapshots.saved(*id), Some(original));
            }
        }
    }

    #[test]
    fn second_apply_changes_nothing() {
        let mut materials = Assets::<PortalMaterial>::default();
        let handle = materials.add(material_with(StencilConfig::default()));
        let ids = [handle.id()];
        let mut snapshots = StencilSnapshots::default();

        assert_eq!(snapshots.apply(&mut materials, &ids, StencilConfig::masked_by(1)), 1);
        assert_eq!(snapshots.apply(&mut materials, &ids, StencilConfig::masked_by(1)), 0);
        assert_eq!(snapshots.saved(handle.id()), Some(&StencilConfig::default()));
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn clear_without_apply_is_noop() {
        let mut materials = Assets::<PortalMaterial>::default();
        materials.add(material_with(StencilConfig::aperture_writer(1)));
        let snapshots = StencilSnapshots::default();
        assert_eq!(snapshots.clear(&mut materials), 0);
        assert!(snapshots.is_empty());
    }

    #[test]
    fn stencil_state_mirrors_write_flag() {
        let state = StencilConfig::aperture_writer(1).to_stencil_state();
        assert_eq!(state.front.pass_op, StencilOperation::Replace);
        assert_eq!(state.write_mask, 0xff);
        assert_eq!(StencilConfig::default().to_stencil_state().write_mask, 0);
    }
}
