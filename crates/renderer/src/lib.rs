//! Renderer: backend trait, GPU meshes and the wgpu backend.
//! wgpu = 23.x, winit = 0.30.x

pub mod backend;
pub mod gpu;
pub mod headless;
pub mod layout;
pub mod mesh;

pub use backend::{
    Backend, BackendError, BackendResult, DrawCall, IndexBufferHandle, ProgramHandle,
    RenderState, VertexBufferHandle, ViewId, ViewSettings,
};
pub use gpu::{GpuState, WgpuBackend};
pub use headless::HeadlessBackend;
pub use layout::VertexLayout;
pub use mesh::{Group, MESH_STATE, Mesh};
