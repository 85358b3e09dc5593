//! Per-ship render context and the pieces it is built from.

mod context;
mod elements;
mod generic_textures;
mod layers;
mod modes;
mod plan;
mod point_buffers;
mod settings;
mod vectors;

pub use context::ShipRenderContext;
pub use elements::{
    ElementsUpload, EphemeralPointsUpload, LineElement, PointElement, RopeElement, SpringElement,
    StressedSpringElement, StressedSpringsUpload, TriangleElement,
};
pub use generic_textures::{
    GenericTexturePlacement, MAX_GENERIC_TEXTURE_COMPONENTS, TextureRenderPolygonVertex,
    VERTICES_PER_QUAD, build_quad,
};
pub use layers::{RenderLayer, SHIP_REGION_Z_START, SHIP_REGION_Z_WIDTH};
pub use modes::{DebugShipRenderMode, RenderModes, ShipRenderMode, VectorFieldRenderMode};
pub use plan::{DrawOp, DrawPlan};
pub use settings::ShipRenderSettings;
pub use vectors::{ARROWHEAD_LENGTH, POINTS_PER_ARROW, build_vector_arrows};

/// Depth plane a point belongs to; higher planes draw nearer.
pub type PlaneId = u32;

pub type ShipId = u32;

/// Index of a point within its ship.
pub type ElementIndex = u32;

pub const MAX_SPRINGS_PER_POINT: usize = 8;
pub const MAX_TRIANGLES_PER_POINT: usize = 8;
pub const STRESSED_SPRINGS_RESERVE: usize = 1000;
pub const MAX_EPHEMERAL_PARTICLES: usize = 2048;
