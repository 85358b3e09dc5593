use crate::coords::{Vec2, Viewport};
use crate::ship::PlaneId;

/// Column-major 4×4 matrix (`m[column][row]`), matching WGSL `mat4x4<f32>`.
pub type ProjectionMatrix = [[f32; 4]; 4];

/// Camera + canvas description used to build the per-layer ortho matrices.
///
/// World space is metres with +Y up. The visible world height follows the zoom
/// (`140 / zoom`); the visible width follows the canvas aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    zoom: f32,
    camera_world_position: Vec2,
    canvas: Viewport,

    // derived
    visible_world_width: f32,
    visible_world_height: f32,
    canvas_to_visible_world_height_ratio: f32,
    kernel_ortho_matrix: ProjectionMatrix,
}

impl ViewModel {
    /// Visible world height at zoom `1.0`.
    pub const BASE_VISIBLE_WORLD_HEIGHT: f32 = 140.0;

    pub const MIN_ZOOM: f32 = 0.001;
    pub const MAX_ZOOM: f32 = 1000.0;

    pub fn new(zoom: f32, camera_world_position: Vec2, canvas: Viewport) -> Self {
        let mut vm = Self {
            zoom: zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM),
            camera_world_position,
            canvas,
            visible_world_width: 0.0,
            visible_world_height: 0.0,
            canvas_to_visible_world_height_ratio: 0.0,
            kernel_ortho_matrix: [[0.0; 4]; 4],
        };
        vm.recalculate();
        vm
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        self.recalculate();
    }

    #[inline]
    pub fn camera_world_position(&self) -> Vec2 {
        self.camera_world_position
    }

    pub fn set_camera_world_position(&mut self, position: Vec2) {
        self.camera_world_position = position;
        self.recalculate();
    }

    #[inline]
    pub fn canvas_size(&self) -> Viewport {
        self.canvas
    }

    pub fn set_canvas_size(&mut self, canvas: Viewport) {
        self.canvas = canvas;
        self.recalculate();
    }

    #[inline]
    pub fn visible_world_width(&self) -> f32 {
        self.visible_world_width
    }

    #[inline]
    pub fn visible_world_height(&self) -> f32 {
        self.visible_world_height
    }

    /// Canvas pixels per world unit, vertically.
    ///
    /// Line widths and point sizes are expressed in world units and scaled by this.
    #[inline]
    pub fn canvas_to_visible_world_height_ratio(&self) -> f32 {
        self.canvas_to_visible_world_height_ratio
    }

    /// Computes the ortho matrix for one layer of one ship.
    ///
    /// The depth range `[z_start, z_start + z_width)` is split evenly among
    /// `ship_count` ships; each ship's share is split into
    /// `(max_max_plane_id + 1) * layer_count` equal slots. The matrix maps a
    /// vertex whose `z` is its plane id `p` to the centre of slot
    /// `p * layer_count + layer`.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_ship_ortho_matrix(
        &self,
        z_start: f32,
        z_width: f32,
        ship_index: usize,
        ship_count: usize,
        max_max_plane_id: PlaneId,
        layer: usize,
        layer_count: usize,
    ) -> ProjectionMatrix {
        debug_assert!(ship_count > 0, "ship_count must be positive");
        debug_assert!(ship_index < ship_count.max(1), "ship index {ship_index} out of {ship_count}");
        debug_assert!(layer < layer_count, "layer {layer} out of {layer_count}");

        let ship_count = ship_count.max(1) as f32;
        let layer_count = layer_count.max(1) as f32;
        let plane_count = max_max_plane_id as f32 + 1.0;

        let ship_z_width = z_width / ship_count;
        let ship_z_start = z_start + ship_z_width * ship_index as f32;
        let slot_width = ship_z_width / (plane_count * layer_count);

        let mut m = self.kernel_ortho_matrix;
        m[2][2] = slot_width * layer_count;
        m[3][2] = ship_z_start + slot_width * (layer as f32 + 0.5);
        m
    }

    fn recalculate(&mut self) {
        self.visible_world_height = Self::BASE_VISIBLE_WORLD_HEIGHT / self.zoom;
        self.visible_world_width = self.visible_world_height * self.canvas.aspect_ratio();
        self.canvas_to_visible_world_height_ratio = if self.canvas.is_valid() {
            self.canvas.height / self.visible_world_height
        } else {
            1.0
        };

        let sx = 2.0 / self.visible_world_width;
        let sy = 2.0 / self.visible_world_height;
        self.kernel_ortho_matrix = [
            [sx, 0.0, 0.0, 0.0],
            [0.0, sy, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [
                -self.camera_world_position.x * sx,
                -self.camera_world_position.y * sy,
                0.0,
                1.0,
            ],
        ];
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new(1.0, Vec2::zero(), Viewport::new(1280.0, 720.0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn transform(m: &ProjectionMatrix, x: f32, y: f32, z: f32) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (row, o) in out.iter_mut().enumerate() {
            *o = m[0][row] * x + m[1][row] * y + m[2][row] * z + m[3][row];
        }
        out
    }

    // ── kernel ───────────────────────────────────────────────────────────

    #[test]
    fn camera_centre_maps_to_ndc_origin() {
        let vm = ViewModel::new(2.0, Vec2::new(10.0, -5.0), Viewport::new(800.0, 600.0));
        let m = vm.calculate_ship_ortho_matrix(1.0, -1.0, 0, 1, 0, 0, 6);
        let p = transform(&m, 10.0, -5.0, 0.0);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn visible_edges_map_to_ndc_edges() {
        let vm = ViewModel::new(1.0, Vec2::zero(), Viewport::new(1000.0, 500.0));
        let m = vm.calculate_ship_ortho_matrix(1.0, -1.0, 0, 1, 0, 0, 6);
        let half_w = vm.visible_world_width() / 2.0;
        let half_h = vm.visible_world_height() / 2.0;
        let p = transform(&m, half_w, half_h, 0.0);
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn ratio_follows_zoom() {
        let mut vm = ViewModel::new(1.0, Vec2::zero(), Viewport::new(1400.0, 700.0));
        assert_relative_eq!(vm.canvas_to_visible_world_height_ratio(), 5.0, epsilon = 1e-5);
        vm.set_zoom(2.0);
        assert_relative_eq!(vm.canvas_to_visible_world_height_ratio(), 10.0, epsilon = 1e-5);
    }

    // ── depth slots ──────────────────────────────────────────────────────

    #[test]
    fn ships_partition_depth_range_without_overlap() {
        let vm = ViewModel::default();
        let ship_count = 3;
        let max_plane = 4;

        // Nearest point of ship s must still be farther than the farthest of ship s + 1.
        for s in 0..ship_count - 1 {
            let near = vm.calculate_ship_ortho_matrix(1.0, -1.0, s, ship_count, max_plane, 5, 6);
            let far_next = vm.calculate_ship_ortho_matrix(1.0, -1.0, s + 1, ship_count, max_plane, 0, 6);
            let z_near = transform(&near, 0.0, 0.0, max_plane as f32)[2];
            let z_far_next = transform(&far_next, 0.0, 0.0, 0.0)[2];
            assert!(z_near > z_far_next, "ship {s}: {z_near} <= {z_far_next}");
        }
    }

    #[test]
    fn slots_stay_inside_depth_range() {
        let vm = ViewModel::default();
        for s in 0..2 {
            for layer in 0..6 {
                let m = vm.calculate_ship_ortho_matrix(1.0, -1.0, s, 2, 3, layer, 6);
                for plane in 0..=3 {
                    let z = transform(&m, 0.0, 0.0, plane as f32)[2];
                    assert!(z > 0.0 && z < 1.0, "z = {z}");
                }
            }
        }
    }
}
