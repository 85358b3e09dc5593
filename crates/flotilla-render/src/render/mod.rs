//! Rendering device abstraction and its backends.
//!
//! Ship contexts talk to a `RenderDevice`: buffers, textures, program
//! parameters and draws. `WgpuRenderDevice` draws for real; `RecordingDevice`
//! keeps a call log for tests and tools.
//!
//! Convention:
//! - World coordinates are ship units, +Y up.
//! - Line widths and point sizes are canvas pixels.

mod arena;
mod ctx;
mod device;
mod gpu;
mod program;
mod recording;

pub use arena::{FixedArena, GrowOnlyArena};
pub use ctx::{RenderCtx, RenderTarget};
pub use device::{
    ArrayDraw, AttributeSetId, BindingCursor, BufferId, BufferUsage, ElementDraw,
    PointAttributeBuffers, PolygonMode, Primitive, RenderDevice, TextureFilter, TextureId,
    TextureSampling, TextureWrap, VertexLayout, set_parameter_on,
};
pub use gpu::WgpuRenderDevice;
pub use program::{ProgramKind, ProgramParameter, ProgramParameters, TextureSlot};
pub use recording::{DeviceCall, DrawRecord, DrawSource, RecordingDevice};
