//! Mesh viewer: one mesh, one program, rotating about Y.

use anyhow::{Context, Result};
use asset::{AssetRoots, FormatRevision, ShaderProfile, load_program};
use corelib::camera::Camera;
use corelib::transform::Transform;
use corelib::vec3;
use platform::{Example, FrameContext};
use renderer::{Backend, Mesh, ProgramHandle, ViewId};

const VIEW: ViewId = 0;
const CLEAR_RGBA: u32 = 0x3030_30ff;
/// Radians per second.
const SPIN_RATE: f32 = 0.37;

pub struct MeshViewer {
    roots: AssetRoots,
    mesh_name: String,
    revision: FormatRevision,
    vs: String,
    fs: String,
    camera: Camera,
    mesh: Option<Mesh>,
    program: Option<ProgramHandle>,
}

impl MeshViewer {
    pub fn new(
        roots: AssetRoots,
        mesh_name: impl Into<String>,
        revision: FormatRevision,
        vs: impl Into<String>,
        fs: impl Into<String>,
    ) -> Self {
        Self {
            roots,
            mesh_name: mesh_name.into(),
            revision,
            vs: vs.into(),
            fs: fs.into(),
            camera: Camera::look_at(vec3(0.0, 1.0, -2.5), vec3(0.0, 1.0, 0.0), 60.0),
            mesh: None,
            program: None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Model matrix at `time` seconds.
    pub fn model(time: f32) -> corelib::Mat4 {
        Transform::yaw(time * SPIN_RATE).matrix()
    }
}

impl Example for MeshViewer {
    fn init(&mut self, backend: &mut dyn Backend) -> Result<()> {
        let program = load_program(&self.roots, ShaderProfile::WGSL, &self.vs, &self.fs)?;
        let program = backend
            .create_program(&program)
            .context("Failed to create mesh program")?;
        self.program = Some(program);

        self.mesh = Some(Mesh::load(
            backend,
            &self.roots,
            &self.mesh_name,
            self.revision,
        )?);
        backend.set_view_clear(VIEW, CLEAR_RGBA, 1.0);
        Ok(())
    }

    fn update(&mut self, backend: &mut dyn Backend, ctx: &FrameContext) {
        let camera = self.camera.with_viewport(ctx.width, ctx.height);
        backend.set_view_transform(VIEW, camera.view(), camera.proj());

        if let (Some(mesh), Some(program)) = (&self.mesh, self.program) {
            mesh.submit(backend, VIEW, program, Self::model(ctx.time));
        }
    }

    fn shutdown(&mut self, backend: &mut dyn Backend) {
        if let Some(mesh) = self.mesh.take() {
            mesh.unload(backend);
        }
        if let Some(program) = self.program.take() {
            backend.destroy_program(program);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use asset::mesh::{Attrib, AttribType, GroupData, MeshData, MeshWriter, VertexDecl};
    use corelib::Vec3;
    use renderer::{HeadlessBackend, MESH_STATE};

    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "svarog3d-app-{}-{}-{}",
            tag,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_assets(root: &Path, revision: FormatRevision, groups: usize) {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Normal, 4, AttribType::Uint8, true, true)
            .build();
        let mesh = MeshData {
            groups: (0..groups)
                .map(|_| GroupData {
                    decl: decl.clone(),
                    vertices: vec![0; 3 * usize::from(decl.stride())],
                    indices: vec![0, 1, 2],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        fs::create_dir_all(root.join("meshes")).unwrap();
        fs::create_dir_all(root.join("shaders/wgsl")).unwrap();
        let bytes = MeshWriter::new(revision).to_bytes(&mesh).unwrap();
        fs::write(root.join("meshes/tri.bin"), bytes).unwrap();
        fs::write(root.join("shaders/wgsl/vs_mesh.wgsl"), "// vs").unwrap();
        fs::write(root.join("shaders/wgsl/fs_mesh.wgsl"), "// fs").unwrap();
    }

    #[test]
    fn viewer_draws_every_group_each_frame() {
        let root = scratch_dir("draws");
        write_assets(&root, FormatRevision::Legacy, 2);
        let mut viewer = MeshViewer::new(
            AssetRoots::new([&root]),
            "tri",
            FormatRevision::Legacy,
            "vs_mesh",
            "fs_mesh",
        );
        let mut be = HeadlessBackend::new();
        viewer.init(&mut be).unwrap();
        assert_eq!(be.view(VIEW).unwrap().clear_rgba, Some(CLEAR_RGBA));

        let ctx = FrameContext {
            time: 2.0,
            delta: 0.016,
            frame: 1,
            width: 1280,
            height: 720,
        };
        viewer.update(&mut be, &ctx);
        assert_eq!(be.draws().len(), 2);
        assert!(be.draws().iter().all(|d| d.state == MESH_STATE));
        assert_eq!(be.draws()[0].transform, MeshViewer::model(2.0));

        viewer.shutdown(&mut be);
        assert_eq!(be.live_vertex_buffers(), 0);
        assert_eq!(be.live_programs(), 0);
        assert_eq!(be.invalid_destroys(), 0);
    }

    #[test]
    fn wrong_revision_fails_init() {
        let root = scratch_dir("revision");
        write_assets(&root, FormatRevision::Legacy, 1);
        let mut viewer = MeshViewer::new(
            AssetRoots::new([&root]),
            "tri",
            FormatRevision::Revised,
            "vs_mesh",
            "fs_mesh",
        );
        let mut be = HeadlessBackend::new();
        assert!(viewer.init(&mut be).is_err());
        assert!(viewer.mesh().is_none());
        viewer.shutdown(&mut be);
        assert_eq!(be.live_programs(), 0);
    }

    #[test]
    fn scratch_dirs_do_not_collide() {
        let a = scratch_dir("same");
        let b = scratch_dir("same");
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        let _ = fs::remove_dir_all(a);
        let _ = fs::remove_dir_all(b);
    }

    #[test]
    fn spin_is_about_y() {
        let m = MeshViewer::model(std::f32::consts::PI / SPIN_RATE);
        let p = m.transform_point3(Vec3::X);
        assert!((p - vec3(-1.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(MeshViewer::model(0.0), corelib::Mat4::IDENTITY);
    }
}
