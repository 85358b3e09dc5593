//! Coordinate and geometry types shared by the ship renderers.
//!
//! Canonical CPU space:
//! - World units (simulation metres)
//! - Origin at the world centre
//! - +X right, +Y up
//!
//! Canvas sizes are physical pixels; world-to-NDC conversion happens in the
//! per-layer ortho matrices produced by [`crate::view::ViewModel`].

mod vec2;
mod viewport;

pub use vec2::Vec2;
pub use viewport::Viewport;
