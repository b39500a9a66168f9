//! GPU-side mesh: one vertex/index buffer pair per decoded group.

use anyhow::Result;
use asset::AssetRoots;
use asset::mesh::{Bounds, FormatRevision, MeshData, Primitive, load_mesh};
use glam::Mat4;

use crate::backend::{
    Backend, DrawCall, IndexBufferHandle, ProgramHandle, RenderState, VertexBufferHandle, ViewId,
};

/// State used by [`Mesh::submit`]: the default with counter-clockwise culling.
pub const MESH_STATE: RenderState = RenderState(
    (RenderState::DEFAULT.0 | RenderState::CULL_CCW.0) & !RenderState::CULL_CW.0,
);

#[derive(Debug)]
pub struct Group {
    pub vertex_buffer: VertexBufferHandle,
    pub index_buffer: IndexBufferHandle,
    pub bounds: Bounds,
    pub primitives: Vec<Primitive>,
    pub num_vertices: usize,
    pub num_indices: usize,
}

/// Uploaded mesh. Release with [`Mesh::unload`].
#[derive(Debug, Default)]
pub struct Mesh {
    groups: Vec<Group>,
}

impl Mesh {
    /// Create backend buffers for every group of `data`.
    pub fn upload(backend: &mut dyn Backend, data: &MeshData) -> Self {
        let groups = data
            .groups
            .iter()
            .map(|g| Group {
                vertex_buffer: backend.create_vertex_buffer(&g.vertices, &g.decl),
                index_buffer: backend.create_index_buffer(&g.indices),
                bounds: g.bounds,
                primitives: g.primitives.clone(),
                num_vertices: g.num_vertices(),
                num_indices: g.indices.len(),
            })
            .collect();
        Self { groups }
    }

    /// Decode `meshes/<name>.bin` and upload it.
    pub fn load(
        backend: &mut dyn Backend,
        roots: &AssetRoots,
        name: &str,
        revision: FormatRevision,
    ) -> Result<Self> {
        let data = load_mesh(roots, name, revision)?;
        Ok(Self::upload(backend, &data))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Submit every group with [`MESH_STATE`].
    pub fn submit(
        &self,
        backend: &mut dyn Backend,
        view: ViewId,
        program: ProgramHandle,
        transform: Mat4,
    ) {
        self.submit_with_state(backend, view, program, transform, MESH_STATE);
    }

    pub fn submit_with_state(
        &self,
        backend: &mut dyn Backend,
        view: ViewId,
        program: ProgramHandle,
        transform: Mat4,
        state: RenderState,
    ) {
        for g in &self.groups {
            backend.submit(DrawCall {
                view,
                program,
                transform,
                state,
                vertex_buffer: g.vertex_buffer,
                index_buffer: g.index_buffer,
            });
        }
    }

    /// Destroy every group's buffers.
    pub fn unload(mut self, backend: &mut dyn Backend) {
        for g in std::mem::take(&mut self.groups) {
            backend.destroy_vertex_buffer(g.vertex_buffer);
            backend.destroy_index_buffer(g.index_buffer);
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if !self.groups.is_empty() {
            log::warn!(
                "Mesh dropped with {} groups still uploaded; call Mesh::unload",
                self.groups.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use asset::mesh::{
        Attrib, AttribType, GroupData, MeshWriter, VertexDecl, decode_mesh,
    };
    use asset::{ProgramData, ShaderData};

    use super::*;
    use crate::headless::HeadlessBackend;

    fn mesh_data(groups: usize) -> MeshData {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Normal, 4, AttribType::Uint8, true, true)
            .build();
        let groups = (0..groups)
            .map(|i| GroupData {
                decl: decl.clone(),
                vertices: vec![i as u8; 3 * usize::from(decl.stride())],
                indices: vec![0, 1, 2],
                ..Default::default()
            })
            .collect();
        MeshData {
            groups,
            ..Default::default()
        }
    }

    fn program(be: &mut HeadlessBackend) -> ProgramHandle {
        let stage = |name: &str| ShaderData {
            name: name.into(),
            code: b"//".to_vec(),
        };
        be.create_program(&ProgramData {
            vertex: stage("vs_mesh"),
            fragment: stage("fs_mesh"),
        })
        .unwrap()
    }

    #[test]
    fn upload_submit_unload() {
        let mut be = HeadlessBackend::new();
        let prog = program(&mut be);
        let data = mesh_data(2);
        let mesh = Mesh::upload(&mut be, &data);
        assert_eq!(be.live_vertex_buffers(), 2);
        assert_eq!(be.live_index_buffers(), 2);

        let g = &mesh.groups()[1];
        assert_eq!(be.vertex_buffer(g.vertex_buffer).unwrap().data, data.groups[1].vertices);
        assert_eq!(be.index_buffer(g.index_buffer), Some(&[0u16, 1, 2][..]));

        let mtx = Mat4::from_rotation_y(0.5);
        mesh.submit(&mut be, 0, prog, mtx);
        let draws = be.draws();
        assert_eq!(draws.len(), 2);
        for d in draws {
            assert_eq!(d.state, MESH_STATE);
            assert_eq!(d.transform, mtx);
            assert!(d.state.contains(RenderState::CULL_CCW));
            assert!(!d.state.contains(RenderState::CULL_CW));
        }

        mesh.unload(&mut be);
        assert_eq!(be.live_vertex_buffers(), 0);
        assert_eq!(be.live_index_buffers(), 0);
        assert_eq!(be.invalid_destroys(), 0);
    }

    #[test]
    fn decoded_file_uploads_every_group() {
        let bytes = MeshWriter::new(FormatRevision::Legacy)
            .to_bytes(&mesh_data(3))
            .unwrap();
        let data = decode_mesh(Cursor::new(bytes), FormatRevision::Legacy).unwrap();

        let mut be = HeadlessBackend::new();
        let mesh = Mesh::upload(&mut be, &data);
        assert_eq!(mesh.groups().len(), 3);
        assert!(mesh.groups().iter().all(|g| g.num_vertices == 3));
        mesh.unload(&mut be);
    }

    #[test]
    fn empty_mesh_submits_nothing() {
        let mut be = HeadlessBackend::new();
        let prog = program(&mut be);
        let mesh = Mesh::upload(&mut be, &MeshData::default());
        mesh.submit(&mut be, 0, prog, Mat4::IDENTITY);
        assert!(be.draws().is_empty());
        mesh.unload(&mut be);
    }
}
