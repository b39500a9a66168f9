//! `.bin` mesh files: a little-endian stream of `VB`, `IB` and `PRI` chunks.
//!
//! Each `VB`→`IB`→`PRI` cycle produces one [`GroupData`]: an interleaved
//! vertex buffer described by a [`VertexDecl`], 16-bit indices, bounds and
//! the primitive ranges drawn from them. Decoding is CPU-only; handing the
//! buffers to a GPU is the renderer's job.

pub mod decl;
mod error;
pub mod reader;
pub mod tangents;
pub mod vertex;
pub mod writer;

use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use crate::roots::AssetRoots;

pub use decl::{Attrib, AttribDesc, AttribType, VertexDecl, VertexDeclBuilder};
pub use error::{MeshError, MeshResult, UnsupportedAttribute};
pub use reader::{ChunkKind, FormatRevision, GroupState, decode_mesh};
pub use writer::MeshWriter;

/// Bounding sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

/// Oriented box as a unit-cube transform.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Obb {
    pub matrix: Mat4,
}

/// Bounding volumes stored with every group and primitive (104 bytes on disk).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub sphere: Sphere,
    pub aabb: Aabb,
    pub obb: Obb,
}

impl Bounds {
    /// Size of the on-disk record.
    pub const ENCODED_SIZE: usize = 104;

    /// Sphere, box and identity-oriented box enclosing `points`.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let points: Vec<Vec3> = points.into_iter().collect();
        if points.is_empty() {
            return Self::default();
        }
        let (min, max) = points.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), p| (min.min(*p), max.max(*p)),
        );
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Self {
            sphere: Sphere { center, radius },
            aabb: Aabb { min, max },
            obb: Obb {
                matrix: Mat4::from_scale_rotation_translation(
                    (max - min) * 0.5,
                    glam::Quat::IDENTITY,
                    center,
                ),
            },
        }
    }
}

/// Named sub-range of a group. The name is not retained.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Primitive {
    pub start_index: u32,
    pub num_indices: u32,
    pub start_vertex: u32,
    pub num_vertices: u32,
    pub bounds: Bounds,
}

/// One vertex/index buffer pair with its primitives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupData {
    pub bounds: Bounds,
    pub decl: VertexDecl,
    /// `num_vertices() * decl.stride()` bytes, interleaved per `decl`.
    pub vertices: Vec<u8>,
    pub indices: Vec<u16>,
    pub primitives: Vec<Primitive>,
}

impl GroupData {
    pub fn num_vertices(&self) -> usize {
        match self.decl.stride() {
            0 => 0,
            stride => self.vertices.len() / usize::from(stride),
        }
    }
}

/// Decoded mesh: groups in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub groups: Vec<GroupData>,
    /// Attributes dropped while decoding declarations.
    pub diagnostics: Vec<UnsupportedAttribute>,
}

impl MeshData {
    pub fn num_vertices(&self) -> usize {
        self.groups.iter().map(GroupData::num_vertices).sum()
    }

    pub fn num_indices(&self) -> usize {
        self.groups.iter().map(|g| g.indices.len()).sum()
    }

    pub fn num_primitives(&self) -> usize {
        self.groups.iter().map(|g| g.primitives.len()).sum()
    }
}

/// Relative path of a named mesh inside an asset root.
pub fn mesh_path(name: &str) -> std::path::PathBuf {
    Path::new("meshes").join(format!("{name}.bin"))
}

/// Resolve `meshes/<name>.bin` against `roots` and decode it.
pub fn load_mesh(roots: &AssetRoots, name: &str, revision: FormatRevision) -> Result<MeshData> {
    let rel = mesh_path(name);
    let (file, path) = roots.open(&rel)?;
    log::info!("Loading mesh {:?} ({:?})", path, revision);

    let mesh = decode_mesh(BufReader::new(file), revision)
        .with_context(|| format!("Failed to decode mesh {}", path.display()))?;

    for d in &mesh.diagnostics {
        log::warn!("{}: {}", path.display(), d);
    }
    log::info!(
        "Loaded mesh '{}': {} groups, {} primitives, {} vertices, {} indices",
        name,
        mesh.groups.len(),
        mesh.num_primitives(),
        mesh.num_vertices(),
        mesh.num_indices()
    );
    Ok(mesh)
}
