//! Window-bound wgpu device, surface and depth attachment.

mod gpu;
mod init;
mod surface;

pub use gpu::{Gpu, GpuFrame};
pub use init::GpuInit;
pub use surface::{DEPTH_FORMAT, SurfaceErrorAction};
