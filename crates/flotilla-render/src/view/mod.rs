//! World-to-canvas projection shared by every ship in a scene.

mod model;

pub use model::{ProjectionMatrix, ViewModel};
