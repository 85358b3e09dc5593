/// How the ship's structure is shown.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ShipRenderMode {
    /// Per-point colors.
    Structure,
    /// The ship texture.
    #[default]
    Texture,
}

/// Diagnostic overlays that replace part of the normal ship rendering.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum DebugShipRenderMode {
    #[default]
    None,
    Wireframe,
    Points,
    Springs,
    EdgeSprings,
}

/// Per-point quantity drawn as arrows, if any.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum VectorFieldRenderMode {
    #[default]
    None,
    PointVelocity,
    PointForce,
    PointWaterVelocity,
    PointWaterMomentum,
}

impl ShipRenderMode {
    pub fn next(self) -> Self {
        match self {
            ShipRenderMode::Structure => ShipRenderMode::Texture,
            ShipRenderMode::Texture => ShipRenderMode::Structure,
        }
    }
}

impl DebugShipRenderMode {
    pub fn next(self) -> Self {
        match self {
            DebugShipRenderMode::None => DebugShipRenderMode::Wireframe,
            DebugShipRenderMode::Wireframe => DebugShipRenderMode::Points,
            DebugShipRenderMode::Points => DebugShipRenderMode::Springs,
            DebugShipRenderMode::Springs => DebugShipRenderMode::EdgeSprings,
            DebugShipRenderMode::EdgeSprings => DebugShipRenderMode::None,
        }
    }
}

impl VectorFieldRenderMode {
    pub fn next(self) -> Self {
        match self {
            VectorFieldRenderMode::None => VectorFieldRenderMode::PointVelocity,
            VectorFieldRenderMode::PointVelocity => VectorFieldRenderMode::PointForce,
            VectorFieldRenderMode::PointForce => VectorFieldRenderMode::PointWaterVelocity,
            VectorFieldRenderMode::PointWaterVelocity => VectorFieldRenderMode::PointWaterMomentum,
            VectorFieldRenderMode::PointWaterMomentum => VectorFieldRenderMode::None,
        }
    }
}

/// Everything the draw plan depends on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct RenderModes {
    pub ship: ShipRenderMode,
    pub debug: DebugShipRenderMode,
    pub vector_field: VectorFieldRenderMode,
    pub show_stressed_springs: bool,
}
