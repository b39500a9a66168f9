//! Backend that keeps everything in memory. Used for tests and for
//! inspecting meshes without a window.

use std::collections::BTreeMap;

use asset::ProgramData;
use asset::mesh::VertexDecl;
use glam::Mat4;

use crate::backend::{
    Backend, BackendError, BackendResult, DrawCall, IndexBufferHandle, ProgramHandle, Slots,
    VertexBufferHandle, ViewId, ViewSettings,
};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedVertexBuffer {
    pub data: Vec<u8>,
    pub decl: VertexDecl,
}

#[derive(Clone, Debug, Default)]
pub struct HeadlessBackend {
    vertex_buffers: Slots<RecordedVertexBuffer>,
    index_buffers: Slots<Vec<u16>>,
    programs: Slots<String>,
    views: BTreeMap<ViewId, ViewSettings>,
    draws: Vec<DrawCall>,
    frames: u64,
    invalid_destroys: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_buffer(&self, handle: VertexBufferHandle) -> Option<&RecordedVertexBuffer> {
        self.vertex_buffers.get(handle.0)
    }

    pub fn index_buffer(&self, handle: IndexBufferHandle) -> Option<&[u16]> {
        self.index_buffers.get(handle.0).map(Vec::as_slice)
    }

    pub fn live_vertex_buffers(&self) -> usize {
        self.vertex_buffers.live()
    }

    pub fn live_index_buffers(&self) -> usize {
        self.index_buffers.live()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.live()
    }

    /// Destroy calls that named a handle which was not alive.
    pub fn invalid_destroys(&self) -> usize {
        self.invalid_destroys
    }

    pub fn view(&self, view: ViewId) -> Option<&ViewSettings> {
        self.views.get(&view)
    }

    /// Draws queued since the last [`frame`](Self::frame).
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// End the frame: drop queued draws and return how many there were.
    pub fn frame(&mut self) -> usize {
        self.frames += 1;
        let n = self.draws.len();
        self.draws.clear();
        n
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn note_invalid(&mut self, what: &str, index: usize) {
        log::error!("Destroying {what} {index} which is not alive");
        self.invalid_destroys += 1;
    }
}

impl Backend for HeadlessBackend {
    fn create_vertex_buffer(&mut self, data: &[u8], decl: &VertexDecl) -> VertexBufferHandle {
        VertexBufferHandle(self.vertex_buffers.insert(RecordedVertexBuffer {
            data: data.to_vec(),
            decl: decl.clone(),
        }))
    }

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        if self.vertex_buffers.remove(handle.0).is_none() {
            self.note_invalid("vertex buffer", handle.index());
        }
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> IndexBufferHandle {
        IndexBufferHandle(self.index_buffers.insert(indices.to_vec()))
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        if self.index_buffers.remove(handle.0).is_none() {
            self.note_invalid("index buffer", handle.index());
        }
    }

    fn create_program(&mut self, program: &ProgramData) -> BackendResult<ProgramHandle> {
        for stage in [&program.vertex, &program.fragment] {
            if stage.code.is_empty() {
                return Err(BackendError::ShaderCompile {
                    name: stage.name.clone(),
                    message: "empty shader".into(),
                });
            }
        }
        let name = format!("{}+{}", program.vertex.name, program.fragment.name);
        Ok(ProgramHandle(self.programs.insert(name)))
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if self.programs.remove(handle.0).is_none() {
            self.note_invalid("program", handle.index());
        }
    }

    fn set_view_clear(&mut self, view: ViewId, rgba: u32, depth: f32) {
        let v = self.views.entry(view).or_default();
        v.clear_rgba = Some(rgba);
        v.clear_depth = depth;
    }

    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        let v = self.views.entry(view).or_default();
        v.view = view_mtx;
        v.proj = proj;
    }

    fn submit(&mut self, draw: DrawCall) {
        self.draws.push(draw);
    }
}

#[cfg(test)]
mod tests {
    use asset::ShaderData;
    use asset::mesh::{Attrib, AttribType};

    use super::*;
    use crate::backend::RenderState;

    fn program(vs: &str, fs: &[u8]) -> ProgramData {
        ProgramData {
            vertex: ShaderData {
                name: vs.into(),
                code: b"vs".to_vec(),
            },
            fragment: ShaderData {
                name: "fs".into(),
                code: fs.to_vec(),
            },
        }
    }

    #[test]
    fn buffers_are_recorded_and_released() {
        let mut be = HeadlessBackend::new();
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .build();
        let vb = be.create_vertex_buffer(&[0; 24], &decl);
        let ib = be.create_index_buffer(&[0, 1, 0]);
        assert_eq!(be.vertex_buffer(vb).unwrap().decl, decl);
        assert_eq!(be.index_buffer(ib), Some(&[0u16, 1, 0][..]));

        be.destroy_vertex_buffer(vb);
        be.destroy_index_buffer(ib);
        assert_eq!(be.live_vertex_buffers(), 0);
        assert_eq!(be.live_index_buffers(), 0);
        assert_eq!(be.invalid_destroys(), 0);

        be.destroy_vertex_buffer(vb);
        assert_eq!(be.invalid_destroys(), 1);
    }

    #[test]
    fn frame_drains_draws() {
        let mut be = HeadlessBackend::new();
        let prog = be.create_program(&program("vs", b"fs")).unwrap();
        let vb = be.create_vertex_buffer(&[], &VertexDecl::default());
        let ib = be.create_index_buffer(&[]);
        be.set_view_clear(0, 0x3030_30ff, 1.0);
        be.submit(DrawCall {
            view: 0,
            program: prog,
            transform: Mat4::IDENTITY,
            state: RenderState::DEFAULT,
            vertex_buffer: vb,
            index_buffer: ib,
        });
        assert_eq!(be.draws().len(), 1);
        assert_eq!(be.frame(), 1);
        assert!(be.draws().is_empty());
        assert_eq!(be.view(0).unwrap().clear_rgba, Some(0x3030_30ff));
    }

    #[test]
    fn empty_shader_is_rejected() {
        let mut be = HeadlessBackend::new();
        assert!(be.create_program(&program("vs", b"")).is_err());
        assert_eq!(be.live_programs(), 0);
    }
}
