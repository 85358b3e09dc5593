//! Flotilla ship renderer.
//!
//! Draws physics-simulated ships (points, springs, ropes, triangles, overlays)
//! through a `RenderDevice`, with one `ShipRenderContext` per ship and a
//! `ShipScene` driving all of them.

pub mod device;

pub mod atlas;
pub mod coords;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
pub mod ship;
pub mod stats;
pub mod view;
