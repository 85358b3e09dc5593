//! Which geometry a frame draws, and in what order.

use super::modes::{DebugShipRenderMode, RenderModes, ShipRenderMode, VectorFieldRenderMode};

/// One step of a ship's frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DrawOp {
    PointElements,
    Triangles { textured: bool, wireframe: bool },
    Ropes,
    Springs { textured: bool },
    StressedSprings,
    EphemeralPoints,
    GenericTextures,
    Vectors,
}

/// Ordered draw steps for a set of render modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawPlan {
    ops: [Option<DrawOp>; Self::MAX_OPS],
    len: usize,
}

impl DrawPlan {
    pub const MAX_OPS: usize = 9;

    pub fn for_modes(modes: RenderModes) -> Self {
        use DebugShipRenderMode as Debug;

        let mut plan = Self {
            ops: [None; Self::MAX_OPS],
            len: 0,
        };

        let structure_or_texture =
            matches!(modes.ship, ShipRenderMode::Structure | ShipRenderMode::Texture);
        let textured = modes.ship == ShipRenderMode::Texture;
        let structure_plain = modes.debug == Debug::None && modes.ship == ShipRenderMode::Structure;

        if modes.debug == Debug::Points {
            plan.push(DrawOp::PointElements);
        }

        if modes.debug == Debug::Wireframe || (modes.debug == Debug::None && structure_or_texture) {
            plan.push(DrawOp::Triangles {
                textured,
                wireframe: modes.debug == Debug::Wireframe,
            });
        }

        // With plain structure, ropes go on top so their endpoints stay visible.
        if !structure_plain {
            plan.push(DrawOp::Ropes);
        }

        if matches!(modes.debug, Debug::Springs | Debug::EdgeSprings)
            || (modes.debug == Debug::None && structure_or_texture)
        {
            plan.push(DrawOp::Springs {
                textured: modes.debug == Debug::None && textured,
            });
        }

        if structure_plain {
            plan.push(DrawOp::Ropes);
        }

        if modes.debug == Debug::None && modes.show_stressed_springs {
            plan.push(DrawOp::StressedSprings);
        }

        plan.push(DrawOp::EphemeralPoints);
        plan.push(DrawOp::GenericTextures);

        if modes.vector_field != VectorFieldRenderMode::None {
            plan.push(DrawOp::Vectors);
        }

        plan
    }

    fn push(&mut self, op: DrawOp) {
        debug_assert!(self.len < Self::MAX_OPS);
        self.ops[self.len] = Some(op);
        self.len += 1;
    }

    pub fn ops(&self) -> impl Iterator<Item = DrawOp> + '_ {
        self.ops[..self.len].iter().flatten().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, op: DrawOp) -> bool {
        self.ops().any(|o| o == op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes(ship: ShipRenderMode, debug: DebugShipRenderMode) -> RenderModes {
        RenderModes {
            ship,
            debug,
            vector_field: VectorFieldRenderMode::None,
            show_stressed_springs: false,
        }
    }

    fn ops(m: RenderModes) -> Vec<DrawOp> {
        DrawPlan::for_modes(m).ops().collect()
    }

    // ── ship modes ───────────────────────────────────────────────────────

    #[test]
    fn structure_draws_ropes_after_springs() {
        assert_eq!(
            ops(modes(ShipRenderMode::Structure, DebugShipRenderMode::None)),
            vec![
                DrawOp::Triangles { textured: false, wireframe: false },
                DrawOp::Springs { textured: false },
                DrawOp::Ropes,
                DrawOp::EphemeralPoints,
                DrawOp::GenericTextures,
            ]
        );
    }

    #[test]
    fn texture_draws_ropes_before_springs() {
        assert_eq!(
            ops(modes(ShipRenderMode::Texture, DebugShipRenderMode::None)),
            vec![
                DrawOp::Triangles { textured: true, wireframe: false },
                DrawOp::Ropes,
                DrawOp::Springs { textured: true },
                DrawOp::EphemeralPoints,
                DrawOp::GenericTextures,
            ]
        );
    }

    #[test]
    fn ropes_drawn_exactly_once_in_every_mode() {
        for ship in [ShipRenderMode::Structure, ShipRenderMode::Texture] {
            for debug in [
                DebugShipRenderMode::None,
                DebugShipRenderMode::Wireframe,
                DebugShipRenderMode::Points,
                DebugShipRenderMode::Springs,
                DebugShipRenderMode::EdgeSprings,
            ] {
                let n = ops(modes(ship, debug)).into_iter().filter(|o| *o == DrawOp::Ropes).count();
                assert_eq!(n, 1, "{ship:?}/{debug:?}");
            }
        }
    }

    // ── debug modes ──────────────────────────────────────────────────────

    #[test]
    fn wireframe_triangles_keep_ship_texturing() {
        for ship in [ShipRenderMode::Structure, ShipRenderMode::Texture] {
            let plan = DrawPlan::for_modes(modes(ship, DebugShipRenderMode::Wireframe));
            assert!(plan.contains(DrawOp::Triangles {
                textured: ship == ShipRenderMode::Texture,
                wireframe: true,
            }));
            assert!(!plan.ops().any(|o| matches!(o, DrawOp::Springs { .. })));
        }
    }

    #[test]
    fn points_mode_draws_points_first_and_no_structure() {
        let plan = ops(modes(ShipRenderMode::Texture, DebugShipRenderMode::Points));
        assert_eq!(plan[0], DrawOp::PointElements);
        assert!(!plan.iter().any(|o| matches!(o, DrawOp::Triangles { .. } | DrawOp::Springs { .. })));
    }

    #[test]
    fn spring_debug_modes_use_colored_springs() {
        for debug in [DebugShipRenderMode::Springs, DebugShipRenderMode::EdgeSprings] {
            let plan = DrawPlan::for_modes(modes(ShipRenderMode::Texture, debug));
            assert!(plan.contains(DrawOp::Springs { textured: false }));
            assert!(!plan.ops().any(|o| matches!(o, DrawOp::Triangles { .. })));
        }
    }

    // ── overlays ─────────────────────────────────────────────────────────

    #[test]
    fn stressed_springs_need_toggle_and_no_debug() {
        let mut m = modes(ShipRenderMode::Texture, DebugShipRenderMode::None);
        m.show_stressed_springs = true;
        assert!(DrawPlan::for_modes(m).contains(DrawOp::StressedSprings));

        m.debug = DebugShipRenderMode::Springs;
        assert!(!DrawPlan::for_modes(m).contains(DrawOp::StressedSprings));
    }

    #[test]
    fn vectors_come_last() {
        let mut m = modes(ShipRenderMode::Texture, DebugShipRenderMode::Points);
        m.vector_field = VectorFieldRenderMode::PointForce;
        m.show_stressed_springs = true;
        let plan = ops(m);
        assert_eq!(plan.last(), Some(&DrawOp::Vectors));
        assert!(plan.len() <= DrawPlan::MAX_OPS);
    }
}
