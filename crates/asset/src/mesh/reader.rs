//! Chunk reader: single forward scan over a `.bin` mesh stream.

use std::fmt;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

use glam::{Mat4, Vec3};

use super::decl::{self, VertexDecl};
use super::error::{MeshError, MeshResult, UnsupportedAttribute};
use super::{Aabb, Bounds, GroupData, MeshData, Obb, Primitive, Sphere};

/// fourcc `"VB \0"`.
pub const CHUNK_MAGIC_VB_LEGACY: u32 = 0x0020_4256;
/// fourcc `"VB \x01"`.
pub const CHUNK_MAGIC_VB: u32 = 0x0120_4256;
/// fourcc `"IB \0"`.
pub const CHUNK_MAGIC_IB: u32 = 0x0020_4249;
/// fourcc `"PRI\0"`.
pub const CHUNK_MAGIC_PRI: u32 = 0x0049_5250;

/// Mesh format revision. Chosen by the caller, never sniffed from content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormatRevision {
    /// `VB \0` chunks carrying the fixed 56-byte declaration.
    Legacy,
    /// `VB \x01` chunks carrying the compact declaration table.
    #[default]
    Revised,
}

impl FormatRevision {
    pub fn vb_magic(self) -> u32 {
        match self {
            FormatRevision::Legacy => CHUNK_MAGIC_VB_LEGACY,
            FormatRevision::Revised => CHUNK_MAGIC_VB,
        }
    }
}

impl std::str::FromStr for FormatRevision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "v0" => Ok(FormatRevision::Legacy),
            "revised" | "v1" => Ok(FormatRevision::Revised),
            other => Err(format!("unknown mesh format revision '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    VertexBuffer,
    IndexBuffer,
    Primitives,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChunkKind::VertexBuffer => "VB",
            ChunkKind::IndexBuffer => "IB",
            ChunkKind::Primitives => "PRI",
        })
    }
}

/// Progress of the group currently being assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupState {
    AwaitingChunk,
    HaveVertexBuffer,
    HaveBoth,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupState::AwaitingChunk => "awaiting a vertex buffer",
            GroupState::HaveVertexBuffer => "awaiting an index buffer",
            GroupState::HaveBoth => "awaiting primitives",
        })
    }
}

/// Little-endian field reader that tracks its stream offset for diagnostics.
pub(crate) struct ByteReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read + Seek> ByteReader<R> {
    pub(crate) fn new(mut inner: R) -> io::Result<Self> {
        let offset = inner.stream_position()?;
        Ok(Self { inner, offset })
    }

    #[inline]
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> MeshResult<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(source) => Err(MeshError::TruncatedInput {
                offset: self.offset,
                source,
            }),
        }
    }

    /// Read `len` bytes. The buffer grows with the data actually present,
    /// so a count larger than the stream fails as truncated input.
    pub(crate) fn read_bytes(&mut self, len: u64) -> MeshResult<Vec<u8>> {
        let start = self.offset;
        let mut buf = Vec::new();
        let got = (&mut self.inner)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(|source| MeshError::TruncatedInput {
                offset: start,
                source,
            })? as u64;
        self.offset += got;
        if got < len {
            return Err(MeshError::TruncatedInput {
                offset: self.offset,
                source: io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("expected {len} bytes, stream ended after {got}"),
                ),
            });
        }
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> MeshResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn read_u8(&mut self) -> MeshResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> MeshResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> MeshResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_f32(&mut self) -> MeshResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    fn read_vec3(&mut self) -> MeshResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Next chunk tag, or `None` on a clean end of stream.
    fn read_tag(&mut self) -> MeshResult<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(MeshError::TruncatedInput {
                        offset: self.offset + filled as u64,
                        source,
                    });
                }
            }
        }
        self.offset += filled as u64;
        match filled {
            0 => Ok(None),
            4 => Ok(Some(u32::from_le_bytes(buf))),
            _ => Err(MeshError::TruncatedInput {
                offset: self.offset,
                source: io::Error::new(ErrorKind::UnexpectedEof, "partial chunk tag"),
            }),
        }
    }

    /// Skip a length-prefixed name.
    fn skip_name(&mut self) -> MeshResult<()> {
        let len = self.read_u16()?;
        self.offset = self.inner.seek(SeekFrom::Current(i64::from(len)))?;
        Ok(())
    }

    fn read_bounds(&mut self) -> MeshResult<Bounds> {
        let sphere = Sphere {
            center: self.read_vec3()?,
            radius: self.read_f32()?,
        };
        let aabb = Aabb {
            min: self.read_vec3()?,
            max: self.read_vec3()?,
        };
        let mut cols = [0f32; 16];
        for c in &mut cols {
            *c = self.read_f32()?;
        }
        Ok(Bounds {
            sphere,
            aabb,
            obb: Obb {
                matrix: Mat4::from_cols_array(&cols),
            },
        })
    }
}

/// Group under construction.
#[derive(Default)]
struct PendingGroup {
    bounds: Bounds,
    decl: VertexDecl,
    vertices: Vec<u8>,
    indices: Vec<u16>,
}

/// Decode a whole mesh stream.
///
/// Runs until a clean end of stream. Any fatal error discards everything
/// decoded so far.
pub fn decode_mesh<R: Read + Seek>(reader: R, revision: FormatRevision) -> MeshResult<MeshData> {
    let mut r = ByteReader::new(reader)?;
    let vb_magic = revision.vb_magic();

    let mut groups: Vec<GroupData> = Vec::new();
    let mut diagnostics: Vec<UnsupportedAttribute> = Vec::new();
    let mut state = GroupState::AwaitingChunk;
    let mut pending = PendingGroup::default();

    while let Some(tag) = r.read_tag()? {
        let chunk = match tag {
            t if t == vb_magic => ChunkKind::VertexBuffer,
            CHUNK_MAGIC_IB => ChunkKind::IndexBuffer,
            CHUNK_MAGIC_PRI => ChunkKind::Primitives,
            _ => {
                return Err(MeshError::MalformedFormat {
                    tag,
                    offset: r.offset(),
                });
            }
        };
        log::debug!("chunk {chunk} at {} ({state})", r.offset() - 4);

        state = match (state, chunk) {
            (GroupState::AwaitingChunk, ChunkKind::VertexBuffer) => {
                pending.bounds = r.read_bounds()?;
                pending.decl = match revision {
                    FormatRevision::Legacy => decl::decode_legacy(&mut r)?,
                    FormatRevision::Revised => {
                        let (decl, skipped) = decl::decode_revised(&mut r, groups.len())?;
                        diagnostics.extend(skipped);
                        decl
                    }
                };
                let num_vertices = r.read_u16()?;
                let len = u64::from(num_vertices) * u64::from(pending.decl.stride());
                pending.vertices = r.read_bytes(len)?;
                GroupState::HaveVertexBuffer
            }
            (GroupState::HaveVertexBuffer, ChunkKind::IndexBuffer) => {
                let num_indices = r.read_u32()?;
                let raw = r.read_bytes(u64::from(num_indices) * 2)?;
                pending.indices = raw
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();
                GroupState::HaveBoth
            }
            (GroupState::HaveBoth, ChunkKind::Primitives) => {
                r.skip_name()?;
                let num_prims = r.read_u16()?;
                let mut primitives = Vec::with_capacity(usize::from(num_prims));
                for _ in 0..num_prims {
                    r.skip_name()?;
                    primitives.push(Primitive {
                        start_index: r.read_u32()?,
                        num_indices: r.read_u32()?,
                        start_vertex: r.read_u32()?,
                        num_vertices: r.read_u32()?,
                        bounds: r.read_bounds()?,
                    });
                }
                let PendingGroup {
                    bounds,
                    decl,
                    vertices,
                    indices,
                } = std::mem::take(&mut pending);
                groups.push(GroupData {
                    bounds,
                    decl,
                    vertices,
                    indices,
                    primitives,
                });
                GroupState::AwaitingChunk
            }
            (state, chunk) => {
                return Err(MeshError::UnexpectedChunk {
                    chunk,
                    state,
                    offset: r.offset() - 4,
                });
            }
        };
    }

    if state != GroupState::AwaitingChunk {
        return Err(MeshError::IncompleteGroup { offset: r.offset() });
    }

    Ok(MeshData {
        groups,
        diagnostics,
    })
}
