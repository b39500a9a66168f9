//! Rendering backend boundary: buffer/program lifetimes and draw submission.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use asset::ProgramData;
use asset::mesh::VertexDecl;
use glam::Mat4;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("shader '{name}' failed to compile: {message}")]
    ShaderCompile { name: String, message: String },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// View (render pass) identifier. Views are drawn in ascending order.
pub type ViewId = u16;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Backend vertex buffer.
    VertexBufferHandle
);
handle!(
    /// Backend 16-bit index buffer.
    IndexBufferHandle
);
handle!(
    /// Linked vertex + fragment program.
    ProgramHandle
);

/// Render-state bitmask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderState(pub u64);

impl RenderState {
    pub const NONE: RenderState = RenderState(0);
    pub const WRITE_RGB: RenderState = RenderState(1 << 0);
    pub const WRITE_A: RenderState = RenderState(1 << 1);
    pub const WRITE_Z: RenderState = RenderState(1 << 2);
    pub const DEPTH_TEST_LESS: RenderState = RenderState(1 << 3);
    /// Cull clockwise faces.
    pub const CULL_CW: RenderState = RenderState(1 << 4);
    /// Cull counter-clockwise faces.
    pub const CULL_CCW: RenderState = RenderState(1 << 5);
    pub const MSAA: RenderState = RenderState(1 << 6);

    pub const DEFAULT: RenderState = RenderState(
        Self::WRITE_RGB.0
            | Self::WRITE_A.0
            | Self::WRITE_Z.0
            | Self::DEPTH_TEST_LESS.0
            | Self::CULL_CW.0
            | Self::MSAA.0,
    );

    #[inline]
    pub fn contains(self, other: RenderState) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for RenderState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        RenderState(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RenderState {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        RenderState(self.0 & rhs.0)
    }
}

impl Not for RenderState {
    type Output = Self;
    fn not(self) -> Self {
        RenderState(!self.0)
    }
}

/// One indexed draw of a whole vertex/index buffer pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub view: ViewId,
    pub program: ProgramHandle,
    pub transform: Mat4,
    pub state: RenderState,
    pub vertex_buffer: VertexBufferHandle,
    pub index_buffer: IndexBufferHandle,
}

/// Per-view clear and camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewSettings {
    /// `0xRRGGBBAA`, `None` to keep the previous contents.
    pub clear_rgba: Option<u32>,
    pub clear_depth: f32,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            clear_rgba: None,
            clear_depth: 1.0,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// What the examples need from a GPU API.
///
/// Destroying a handle twice is a caller bug; backends log it and ignore
/// the second call.
pub trait Backend {
    fn create_vertex_buffer(&mut self, data: &[u8], decl: &VertexDecl) -> VertexBufferHandle;
    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle);

    fn create_index_buffer(&mut self, indices: &[u16]) -> IndexBufferHandle;
    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle);

    fn create_program(&mut self, program: &ProgramData) -> BackendResult<ProgramHandle>;
    fn destroy_program(&mut self, handle: ProgramHandle);

    fn set_view_clear(&mut self, view: ViewId, rgba: u32, depth: f32);
    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4);

    /// Queue a draw for the current frame.
    fn submit(&mut self, draw: DrawCall);
}

/// Append-only slot table. Indices are never reused, so a stale handle
/// cannot alias a newer resource.
#[derive(Clone, Debug)]
pub(crate) struct Slots<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Slots<T> {
    pub(crate) fn insert(&mut self, item: T) -> u32 {
        self.items.push(Some(item));
        (self.items.len() - 1) as u32
    }

    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize).and_then(Option::as_ref)
    }

    pub(crate) fn remove(&mut self, index: u32) -> Option<T> {
        self.items.get_mut(index as usize).and_then(Option::take)
    }

    pub(crate) fn live(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }
}
