//! Encoder for `.bin` mesh streams, the inverse of [`decode_mesh`].
//!
//! [`decode_mesh`]: super::decode_mesh

use std::io::{self, ErrorKind, Write};

use super::decl;
use super::reader::{CHUNK_MAGIC_IB, CHUNK_MAGIC_PRI, FormatRevision};
use super::{Bounds, GroupData, MeshData};

/// Writes [`MeshData`] in either format revision.
///
/// Names are not part of [`MeshData`]; groups are written with the writer's
/// name and primitives with `<name>_<index>`.
#[derive(Clone, Debug, Default)]
pub struct MeshWriter {
    revision: FormatRevision,
    name: String,
}

impl MeshWriter {
    pub fn new(revision: FormatRevision) -> Self {
        Self {
            revision,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn write<W: Write>(&self, out: &mut W, mesh: &MeshData) -> io::Result<()> {
        let mut buf = Vec::new();
        for group in &mesh.groups {
            self.encode_group(group, &mut buf)?;
        }
        out.write_all(&buf)
    }

    pub fn to_bytes(&self, mesh: &MeshData) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, mesh)?;
        Ok(out)
    }

    fn encode_group(&self, group: &GroupData, out: &mut Vec<u8>) -> io::Result<()> {
        let stride = usize::from(group.decl.stride());
        if stride == 0 || group.vertices.len() % stride != 0 {
            return Err(invalid(format!(
                "vertex payload of {} bytes is not a multiple of stride {}",
                group.vertices.len(),
                stride
            )));
        }
        let num_vertices = u16::try_from(group.vertices.len() / stride)
            .map_err(|_| invalid("more than 65535 vertices in one group".into()))?;

        out.extend_from_slice(&self.revision.vb_magic().to_le_bytes());
        write_bounds(&group.bounds, out);
        match self.revision {
            FormatRevision::Legacy => {
                if !group.decl.is_slot_packed() {
                    return Err(invalid(
                        "legacy declarations need attributes packed in slot order".into(),
                    ));
                }
                decl::encode_legacy(&group.decl, out);
            }
            FormatRevision::Revised => {
                if group.decl.attributes().len() > usize::from(u8::MAX) {
                    return Err(invalid("more than 255 vertex attributes".into()));
                }
                decl::encode_revised(&group.decl, out);
            }
        }
        out.extend_from_slice(&num_vertices.to_le_bytes());
        out.extend_from_slice(&group.vertices);

        let num_indices = u32::try_from(group.indices.len())
            .map_err(|_| invalid("index count exceeds u32".into()))?;
        out.extend_from_slice(&CHUNK_MAGIC_IB.to_le_bytes());
        out.extend_from_slice(&num_indices.to_le_bytes());
        for index in &group.indices {
            out.extend_from_slice(&index.to_le_bytes());
        }

        let num_prims = u16::try_from(group.primitives.len())
            .map_err(|_| invalid("more than 65535 primitives in one group".into()))?;
        out.extend_from_slice(&CHUNK_MAGIC_PRI.to_le_bytes());
        write_name(&self.name, out)?;
        out.extend_from_slice(&num_prims.to_le_bytes());
        for (i, prim) in group.primitives.iter().enumerate() {
            write_name(&format!("{}_{}", self.name, i), out)?;
            for field in [
                prim.start_index,
                prim.num_indices,
                prim.start_vertex,
                prim.num_vertices,
            ] {
                out.extend_from_slice(&field.to_le_bytes());
            }
            write_bounds(&prim.bounds, out);
        }
        Ok(())
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, msg)
}

fn write_name(name: &str, out: &mut Vec<u8>) -> io::Result<()> {
    let len = u16::try_from(name.len()).map_err(|_| invalid(format!("name too long: {name}")))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn write_bounds(bounds: &Bounds, out: &mut Vec<u8>) {
    let floats = bounds
        .sphere
        .center
        .to_array()
        .into_iter()
        .chain([bounds.sphere.radius])
        .chain(bounds.aabb.min.to_array())
        .chain(bounds.aabb.max.to_array())
        .chain(bounds.obb.matrix.to_cols_array());
    for f in floats {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Attrib, AttribType, VertexDecl};

    fn group(decl: VertexDecl, num_vertices: usize) -> GroupData {
        GroupData {
            vertices: vec![0; num_vertices * usize::from(decl.stride())],
            decl,
            ..Default::default()
        }
    }

    #[test]
    fn bounds_record_is_104_bytes() {
        let mut out = Vec::new();
        write_bounds(&Bounds::default(), &mut out);
        assert_eq!(out.len(), Bounds::ENCODED_SIZE);
    }

    #[test]
    fn rejects_ragged_vertex_payload() {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .build();
        let mut g = group(decl, 2);
        g.vertices.pop();
        let mesh = MeshData {
            groups: vec![g],
            ..Default::default()
        };
        let err = MeshWriter::new(FormatRevision::Revised)
            .to_bytes(&mesh)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn legacy_rejects_out_of_slot_order() {
        let decl = VertexDecl::builder()
            .add(Attrib::TexCoord0, 2, AttribType::Float, false, false)
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .build();
        let mesh = MeshData {
            groups: vec![group(decl, 1)],
            ..Default::default()
        };
        assert!(MeshWriter::new(FormatRevision::Legacy).to_bytes(&mesh).is_err());
        assert!(MeshWriter::new(FormatRevision::Revised).to_bytes(&mesh).is_ok());
    }
}
