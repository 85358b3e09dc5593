//! Depth layers within a ship's slot and the projections that place them.

use crate::render::{ProgramKind, ProgramParameter, RenderDevice, set_parameter_on};
use crate::view::{ProjectionMatrix, ViewModel};

use super::PlaneId;

/// Start of the depth range shared by all ships (far plane).
pub const SHIP_REGION_Z_START: f32 = 1.0;
/// Width of the shared depth range, towards the viewer.
pub const SHIP_REGION_Z_WIDTH: f32 = -1.0;

/// Depth layers of one plane, far to near.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    Ropes,
    SpringsAndTriangles,
    StressedSprings,
    Points,
    GenericTextures,
    Vectors,
}

impl RenderLayer {
    pub const COUNT: usize = 6;

    pub const ALL: [RenderLayer; Self::COUNT] = [
        RenderLayer::Ropes,
        RenderLayer::SpringsAndTriangles,
        RenderLayer::StressedSprings,
        RenderLayer::Points,
        RenderLayer::GenericTextures,
        RenderLayer::Vectors,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Programs whose draws belong to this layer.
    pub const fn programs(self) -> &'static [ProgramKind] {
        match self {
            RenderLayer::Ropes => &[ProgramKind::ShipRopes],
            RenderLayer::SpringsAndTriangles => {
                &[ProgramKind::ShipTrianglesColor, ProgramKind::ShipTrianglesTexture]
            }
            RenderLayer::StressedSprings => &[ProgramKind::ShipStressedSprings],
            RenderLayer::Points => &[ProgramKind::ShipPointsColor],
            RenderLayer::GenericTextures => &[ProgramKind::ShipGenericTextures],
            RenderLayer::Vectors => &[ProgramKind::ShipVectors],
        }
    }
}

/// The six layer matrices of one ship.
#[derive(Debug, Clone)]
pub(crate) struct LayerProjections {
    matrices: [ProjectionMatrix; RenderLayer::COUNT],
    recompute_count: u64,
}

impl LayerProjections {
    pub(crate) fn new(view: &ViewModel, ship_index: usize, ship_count: usize, max_max_plane_id: PlaneId) -> Self {
        let mut p = Self {
            matrices: [[[0.0; 4]; 4]; RenderLayer::COUNT],
            recompute_count: 0,
        };
        p.recompute(view, ship_index, ship_count, max_max_plane_id);
        p
    }

    pub(crate) fn recompute(
        &mut self,
        view: &ViewModel,
        ship_index: usize,
        ship_count: usize,
        max_max_plane_id: PlaneId,
    ) {
        for layer in RenderLayer::ALL {
            self.matrices[layer.index()] = view.calculate_ship_ortho_matrix(
                SHIP_REGION_Z_START,
                SHIP_REGION_Z_WIDTH,
                ship_index,
                ship_count,
                max_max_plane_id,
                layer.index(),
                RenderLayer::COUNT,
            );
        }
        self.recompute_count += 1;
        log::trace!(
            "ship {ship_index}/{ship_count}: layer projections recomputed (max plane {max_max_plane_id})"
        );
    }

    #[inline]
    pub(crate) fn matrix(&self, layer: RenderLayer) -> &ProjectionMatrix {
        &self.matrices[layer.index()]
    }

    #[inline]
    pub(crate) fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// Sets each layer's matrix on every program drawing that layer.
    pub(crate) fn push<D: RenderDevice + ?Sized>(&self, device: &mut D) {
        for layer in RenderLayer::ALL {
            set_parameter_on(
                device,
                layer.programs(),
                ProgramParameter::OrthoMatrix(self.matrices[layer.index()]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(m: &ProjectionMatrix, plane: f32) -> f32 {
        m[2][2] * plane + m[3][2]
    }

    // ── ordering ─────────────────────────────────────────────────────────

    #[test]
    fn layers_get_nearer_from_ropes_to_vectors() {
        let p = LayerProjections::new(&ViewModel::default(), 0, 1, 0);
        for pair in RenderLayer::ALL.windows(2) {
            let far = depth(p.matrix(pair[0]), 0.0);
            let near = depth(p.matrix(pair[1]), 0.0);
            assert!(near < far, "{:?} not nearer than {:?}", pair[1], pair[0]);
        }
    }

    #[test]
    fn higher_planes_are_nearer_than_every_lower_layer() {
        let p = LayerProjections::new(&ViewModel::default(), 0, 1, 3);
        let top_of_plane_0 = depth(p.matrix(RenderLayer::Vectors), 0.0);
        let bottom_of_plane_1 = depth(p.matrix(RenderLayer::Ropes), 1.0);
        assert!(bottom_of_plane_1 < top_of_plane_0);
    }

    #[test]
    fn every_layer_matrix_is_distinct() {
        let p = LayerProjections::new(&ViewModel::default(), 0, 2, 1);
        for a in RenderLayer::ALL {
            for b in RenderLayer::ALL {
                if a != b {
                    assert_ne!(p.matrix(a), p.matrix(b));
                }
            }
        }
    }

    #[test]
    fn springs_and_triangles_share_a_layer() {
        assert_eq!(
            RenderLayer::SpringsAndTriangles.programs(),
            &[ProgramKind::ShipTrianglesColor, ProgramKind::ShipTrianglesTexture]
        );
    }
}
