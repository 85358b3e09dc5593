//! Per-frame rendering counters.

/// Counts of what was drawn since the owner last reset.
///
/// Ship contexts only ever add to these; the scene resets them at frame start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    pub last_rendered_ship_springs: u64,
    pub last_rendered_ship_ropes: u64,
    pub last_rendered_ship_triangles: u64,
    pub last_rendered_ship_generic_textures: u64,
    pub last_rendered_ship_ephemeral_points: u64,
    pub last_rendered_ship_planes: u64,
}

impl RenderStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
