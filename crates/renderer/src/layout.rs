//! Vertex declaration -> wgpu vertex buffer layout.

use asset::mesh::{Attrib, AttribDesc, AttribType, VertexDecl};
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// wgpu form of a [`VertexDecl`]. Shader location is the attribute slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
    /// Attributes with no matching wgpu format.
    pub skipped: Vec<Attrib>,
}

impl VertexLayout {
    pub fn from_decl(decl: &VertexDecl) -> Self {
        let mut attributes = Vec::with_capacity(decl.attributes().len());
        let mut skipped = Vec::new();
        for desc in decl.attributes() {
            match vertex_format(desc) {
                Some(format) => attributes.push(VertexAttribute {
                    format,
                    offset: u64::from(desc.offset),
                    shader_location: desc.attrib.slot() as u32,
                }),
                None => skipped.push(desc.attrib),
            }
        }
        Self {
            stride: u64::from(decl.stride()),
            attributes,
            skipped,
        }
    }

    /// wgpu wants a non-zero stride that is a multiple of 4.
    pub fn is_valid(&self) -> bool {
        self.stride > 0 && self.stride % 4 == 0
    }

    pub fn as_wgpu(&self) -> VertexBufferLayout<'_> {
        VertexBufferLayout {
            array_stride: self.stride,
            step_mode: VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Closest wgpu format for one attribute. Three-component small types are
/// stored padded to four, so they map to the four-wide format.
pub fn vertex_format(desc: &AttribDesc) -> Option<VertexFormat> {
    use VertexFormat::*;
    Some(match (desc.ty, desc.num, desc.normalized) {
        (AttribType::Uint8, 2, true) => Unorm8x2,
        (AttribType::Uint8, 2, false) => Uint8x2,
        (AttribType::Uint8, 3 | 4, true) => Unorm8x4,
        (AttribType::Uint8, 3 | 4, false) => Uint8x4,
        (AttribType::Int16, 2, true) => Snorm16x2,
        (AttribType::Int16, 2, false) => Sint16x2,
        (AttribType::Int16, 3 | 4, true) => Snorm16x4,
        (AttribType::Int16, 3 | 4, false) => Sint16x4,
        (AttribType::Half, 2, _) => Float16x2,
        (AttribType::Half, 3 | 4, _) => Float16x4,
        (AttribType::Float, 1, _) => Float32,
        (AttribType::Float, 2, _) => Float32x2,
        (AttribType::Float, 3, _) => Float32x3,
        (AttribType::Float, 4, _) => Float32x4,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_normal_uv_layout() {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Normal, 4, AttribType::Uint8, true, true)
            .add(Attrib::TexCoord0, 2, AttribType::Half, false, false)
            .build();
        let layout = VertexLayout::from_decl(&decl);

        assert_eq!(layout.stride, 20);
        assert!(layout.is_valid());
        assert!(layout.skipped.is_empty());
        let locs: Vec<_> = layout
            .attributes
            .iter()
            .map(|a| (a.shader_location, a.offset, a.format))
            .collect();
        assert_eq!(
            locs,
            vec![
                (0, 0, VertexFormat::Float32x3),
                (1, 12, VertexFormat::Unorm8x4),
                (8, 16, VertexFormat::Float16x2),
            ]
        );
    }

    #[test]
    fn single_byte_attribute_is_skipped() {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Indices, 1, AttribType::Uint8, false, true)
            .build();
        let layout = VertexLayout::from_decl(&decl);
        assert_eq!(layout.skipped, vec![Attrib::Indices]);
        assert_eq!(layout.attributes.len(), 1);
        assert!(!layout.is_valid());
    }
}
