use std::f32::consts::TAU;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use constants::render_settings::{PORTAL_RADIUS, PORTAL_SEGMENTS, PORTAL_THICKNESS};

use crate::engine::render::backend::CompositeFrame;
use crate::engine::scene::scene_graph::SceneGraph;

/// Depth-only occluder in the inside layer with a hole where the aperture projects.
///
/// The core 3D depth target carries no stencil aspect, so the inside pass is clipped to
/// the aperture by this sheet sitting just past the near plane instead. The inside camera
/// runs a depth prepass, so the sheet occludes the room whatever the draw order.
#[derive(Component, Debug, Clone)]
pub struct ApertureDepthMask {
    pub mesh: Handle<Mesh>,
}

/// Fraction of the near distance past the near plane where the sheet sits.
const SHEET_NEAR_FACTOR: f32 = 2.0;
const SHEET_COVER_FACTOR: f32 = 100.0;
/// Holes flatter than this area to squared perimeter ratio are closed.
const MIN_HOLE_ROUNDNESS: f32 = 1e-4;

/// Empty mask mesh with fixed ring indices; positions are rewritten every frame.
pub fn create_mask_mesh() -> Mesh {
    let segments = PORTAL_SEGMENTS;
    let mut indices = Vec::with_capacity(segments as usize * 6);
    for i in 0..segments {
        let inner = i * 2;
        let outer = inner + 1;
        let next_inner = ((i + 1) % segments) * 2;
        let next_outer = next_inner + 1;
        indices.extend_from_slice(&[inner, outer, next_inner, next_inner, outer, next_outer]);
    }

    let positions = vec![[0.0f32; 3]; segments as usize * 2];
    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_indices(Indices::U32(indices))
}

/// Interleaved inner/outer vertices of the mask sheet.
///
/// The rim is clipped to the half-space in front of the sheet before it is projected, so a
/// portal the viewer stands in still leaves a hole for its visible part. When nothing of
/// the aperture survives, or it is seen edge-on, the hole closes and the whole view is
/// covered.
pub fn mask_vertices(scene: &SceneGraph, segments: u32) -> Vec<[f32; 3]> {
    let camera = &scene.camera;
    let eye = camera.position();
    let forward = camera.forward();
    let sheet = camera.near * SHEET_NEAR_FACTOR;
    let sheet_centre = eye + forward * sheet;
    let segments = segments.max(3);

    let portal = scene.portal_transform();
    let hole_radius = PORTAL_RADIUS - PORTAL_THICKNESS;
    let rim: Vec<Vec3> = (0..segments)
        .map(|i| {
            let angle = i as f32 / segments as f32 * TAU;
            portal.transform_point(Vec3::new(angle.cos(), angle.sin(), 0.0) * hole_radius)
        })
        .collect();

    let hole: Vec<Vec3> = clip_in_front(&rim, |p| (p - eye).dot(forward) - sheet)
        .into_iter()
        .map(|p| eye + (p - eye) * (sheet / (p - eye).dot(forward)))
        .collect();
    if polygon_area(&hole, forward) <= perimeter(&hole).powi(2) * MIN_HOLE_ROUNDNESS {
        return full_cover(camera.rotation(), sheet_centre, sheet, segments);
    }

    let hole = if hole.len() == segments as usize {
        hole
    } else {
        resample_outline(&hole, segments as usize)
    };
    let hole_centre = hole.iter().copied().sum::<Vec3>() / hole.len() as f32;
    let cover = (hole_centre - sheet_centre).length() + sheet * SHEET_COVER_FACTOR;

    hole.iter()
        .flat_map(|&inner| {
            let outward = (inner - hole_centre).try_normalize().unwrap_or(Vec3::X);
            [inner.to_array(), (hole_centre + outward * cover).to_array()]
        })
        .collect()
}

/// Keeps the part of a closed outline where `signed_depth >= 0`.
fn clip_in_front(outline: &[Vec3], signed_depth: impl Fn(Vec3) -> f32) -> Vec<Vec3> {
    let mut clipped = Vec::with_capacity(outline.len() + 2);
    for (i, &current) in outline.iter().enumerate() {
        let next = outline[(i + 1) % outline.len()];
        let (d_current, d_next) = (signed_depth(current), signed_depth(next));
        if d_current >= 0.0 {
            clipped.push(current);
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            let t = d_current / (d_current - d_next);
            clipped.push(current.lerp(next, t));
        }
    }
    clipped
}

fn polygon_area(outline: &[Vec3], normal: Vec3) -> f32 {
    let Some(&origin) = outline.first() else {
        return 0.0;
    };
    let twice_area: Vec3 = outline
        .windows(2)
        .map(|pair| (pair[0] - origin).cross(pair[1] - origin))
        .sum();
    twice_area.dot(normal).abs() * 0.5
}

fn perimeter(outline: &[Vec3]) -> f32 {
    outline
        .iter()
        .zip(outline.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(*b))
        .sum()
}

/// Redistributes a closed outline into `count` points evenly spaced along its perimeter.
fn resample_outline(outline: &[Vec3], count: usize) -> Vec<Vec3> {
    let edges: Vec<(Vec3, Vec3, f32)> = outline
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = outline[(i + 1) % outline.len()];
            (start, end, start.distance(end))
        })
        .filter(|&(_, _, length)| length > 0.0)
        .collect();
    let perimeter: f32 = edges.iter().map(|&(_, _, length)| length).sum();

    let mut points = Vec::with_capacity(count);
    let mut edge = 0;
    let mut walked = 0.0;
    for k in 0..count {
        let target = k as f32 / count as f32 * perimeter;
        while edge + 1 < edges.len() && walked + edges[edge].2 < target {
            walked += edges[edge].2;
            edge += 1;
        }
        let (start, end, length) = edges[edge];
        points.push(start.lerp(end, ((target - walked) / length).clamp(0.0, 1.0)));
    }
    points
}

fn full_cover(rotation: Quat, centre: Vec3, sheet: f32, segments: u32) -> Vec<[f32; 3]> {
    let right = rotation * Vec3::X;
    let up = rotation * Vec3::Y;
    let cover = sheet * SHEET_COVER_FACTOR;
    (0..segments)
        .flat_map(|i| {
            let angle = i as f32 / segments as f32 * TAU;
            let outer = centre + (right * angle.cos() + up * angle.sin()) * cover;
            [centre.to_array(), outer.to_array()]
        })
        .collect()
}

/// Rebuilds the mask each composited frame and hides it otherwise.
pub fn update_aperture_depth_mask(
    frame: Res<CompositeFrame>,
    scene: Res<SceneGraph>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut masks: Query<(&ApertureDepthMask, &mut Visibility)>,
) {
    if !frame.is_changed() {
        return;
    }
    let composited = frame.plan().is_composited();

    for (mask, mut visibility) in masks.iter_mut() {
        if !composited {
            *visibility = Visibility::Hidden;
            continue;
        }
        let Some(mesh) = meshes.get_mut(&mask.mesh) else {
            continue;
        };
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, mask_vertices(&scene, PORTAL_SEGMENTS));
        *visibility = Visibility::Inherited;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::placement::PortalAnchor;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn on_sheet(scene: &SceneGraph, point: [f32; 3]) -> bool {
        let camera = &scene.camera;
        let depth = (Vec3::from_array(point) - camera.position()).dot(camera.forward());
        (depth - camera.near * SHEET_NEAR_FACTOR).abs() < 1e-5
    }

    fn is_full_cover(vertices: &[[f32; 3]]) -> bool {
        let centre = vertices[0];
        vertices.chunks(2).all(|pair| pair[0] == centre)
    }

    #[test]
    fn hole_surrounds_the_projected_aperture_centre() {
        let mut scene = SceneGraph::default();
        scene.camera.set_pose_parts(Vec3::new(0.0, 1.4, 0.0), Quat::IDENTITY);
        scene.set_anchor(PortalAnchor::default());

        let vertices = mask_vertices(&scene, 16);
        assert_eq!(vertices.len(), 32);

        let sheet = scene.camera.near * SHEET_NEAR_FACTOR;
        for pair in vertices.chunks(2) {
            let inner = Vec3::from_array(pair[0]);
            let outer = Vec3::from_array(pair[1]);
            assert!((inner.z + sheet).abs() < 1e-5);
            assert!((outer.z + sheet).abs() < 1e-5);
            let centre = Vec3::new(0.0, 1.4, -sheet);
            assert!(outer.distance(centre) > inner.distance(centre));
        }
    }

    #[test]
    fn portal_behind_camera_covers_everything() {
        let mut scene = SceneGraph::default();
        scene.camera.set_pose_parts(Vec3::ZERO, Quat::from_rotation_y(PI));
        scene.set_anchor(PortalAnchor::default());

        assert!(is_full_cover(&mask_vertices(&scene, 16)));
    }

    #[test]
    fn standing_in_the_portal_plane_still_covers_the_view() {
        let mut scene = SceneGraph::default();
        scene.set_anchor(PortalAnchor::facing(Vec3::new(0.0, 1.4, -1.0), Vec3::NEG_Z));
        scene.camera.set_pose_parts(Vec3::new(0.5, 1.4, -1.0), Quat::from_rotation_y(FRAC_PI_2));

        let vertices = mask_vertices(&scene, 16);
        assert_eq!(vertices.len(), 32);
        assert!(is_full_cover(&vertices));
        assert!(vertices.iter().all(|&v| on_sheet(&scene, v)));
    }

    #[test]
    fn straddling_rim_keeps_a_hole_for_the_part_in_front() {
        let mut scene = SceneGraph::default();
        scene.set_anchor(PortalAnchor::facing(Vec3::new(0.0, 1.4, -2.0), Vec3::Z));
        scene.camera.set_pose_parts(Vec3::new(0.0, 1.4, -1.5), Quat::from_rotation_y(FRAC_PI_4));

        let vertices = mask_vertices(&scene, 16);
        assert_eq!(vertices.len(), 32);
        assert!(!is_full_cover(&vertices));
        assert!(vertices.iter().all(|&v| on_sheet(&scene, v)));

        let inner: Vec<Vec3> = vertices.chunks(2).map(|pair| Vec3::from_array(pair[0])).collect();
        let centre = inner.iter().copied().sum::<Vec3>() / inner.len() as f32;
        for pair in vertices.chunks(2) {
            let inner = Vec3::from_array(pair[0]);
            let outer = Vec3::from_array(pair[1]);
            assert!(outer.distance(centre) > inner.distance(centre));
        }
    }

    #[test]
    fn resampled_outline_keeps_its_corners_on_the_perimeter() {
        let square = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        let points = resample_outline(&square, 8);
        assert_eq!(points.len(), 8);
        assert!(points[0].abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(points[2].abs_diff_eq(Vec3::X, 1e-6));
        assert!(points[5].abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn mask_mesh_has_two_triangles_per_segment() {
        let mesh = create_mask_mesh();
        assert_eq!(mesh.indices().map(|i| i.len()), Some(PORTAL_SEGMENTS as usize * 6));
    }
}
