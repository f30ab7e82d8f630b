//! Portal scene content and the shared scene graph.
//!
//! Two layers: the outside layer holds the ring over the passthrough view, the inside
//! layer holds the themed room seen through it.

/// Camera, anchor and layer markers shared by the portal systems.
pub mod scene_graph;

/// Luminous ring, glow and stencil aperture meshes.
pub mod portal_ring;

/// Room geometry shown through the aperture and its depth mask.
pub mod inside_room;
