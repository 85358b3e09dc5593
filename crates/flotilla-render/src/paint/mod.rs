//! Color model shared between the simulation-facing API and the renderers.
//!
//! Point colors arrive from the simulation as straight-alpha RGBA in `[0, 1]`.
//! Shaders premultiply before blending.

pub mod color;

pub use color::Color;
