//! Vertex declarations: per-attribute layout of one interleaved vertex.
//!
//! Two wire encodings exist. The legacy one is a fixed 56-byte structure
//! dumped straight from the native renderer; the revised one is a compact
//! table with explicit stride and numeric ids.

use std::io::{Read, Seek};

use super::error::{MeshError, MeshResult, UnsupportedAttribute};
use super::reader::ByteReader;

/// Attribute semantic. Declaration order is the legacy slot order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attrib {
    Position,
    Normal,
    Tangent,
    Bitangent,
    Color0,
    Color1,
    Indices,
    Weight,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
    TexCoord4,
    TexCoord5,
    TexCoord6,
    TexCoord7,
}

impl Attrib {
    pub const COUNT: usize = 16;

    pub const ALL: [Attrib; Self::COUNT] = [
        Attrib::Position,
        Attrib::Normal,
        Attrib::Tangent,
        Attrib::Bitangent,
        Attrib::Color0,
        Attrib::Color1,
        Attrib::Indices,
        Attrib::Weight,
        Attrib::TexCoord0,
        Attrib::TexCoord1,
        Attrib::TexCoord2,
        Attrib::TexCoord3,
        Attrib::TexCoord4,
        Attrib::TexCoord5,
        Attrib::TexCoord6,
        Attrib::TexCoord7,
    ];

    /// Translate a revised-format semantic id.
    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            0x01 => Attrib::Position,
            0x02 => Attrib::Normal,
            0x03 => Attrib::Tangent,
            0x04 => Attrib::Bitangent,
            0x05 => Attrib::Color0,
            0x06 => Attrib::Color1,
            0x0e => Attrib::Indices,
            0x0f => Attrib::Weight,
            0x10..=0x17 => Self::ALL[Attrib::TexCoord0.slot() + usize::from(id - 0x10)],
            _ => return None,
        })
    }

    /// Revised-format semantic id.
    pub fn id(self) -> u16 {
        match self {
            Attrib::Position => 0x01,
            Attrib::Normal => 0x02,
            Attrib::Tangent => 0x03,
            Attrib::Bitangent => 0x04,
            Attrib::Color0 => 0x05,
            Attrib::Color1 => 0x06,
            Attrib::Indices => 0x0e,
            Attrib::Weight => 0x0f,
            texcoord => 0x10 + (texcoord.slot() - Attrib::TexCoord0.slot()) as u16,
        }
    }

    /// Index into the legacy per-slot tables.
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Numeric component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttribType {
    Uint8,
    Int16,
    Half,
    Float,
}

impl AttribType {
    /// Translate a revised-format type id.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x01 => Some(AttribType::Uint8),
            0x02 => Some(AttribType::Int16),
            0x03 => Some(AttribType::Half),
            0x04 => Some(AttribType::Float),
            _ => None,
        }
    }

    pub fn id(self) -> u16 {
        match self {
            AttribType::Uint8 => 0x01,
            AttribType::Int16 => 0x02,
            AttribType::Half => 0x03,
            AttribType::Float => 0x04,
        }
    }

    fn from_legacy_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => AttribType::Uint8,
            1 => AttribType::Int16,
            2 => AttribType::Half,
            _ => AttribType::Float,
        }
    }

    fn legacy_bits(self) -> u8 {
        match self {
            AttribType::Uint8 => 0,
            AttribType::Int16 => 1,
            AttribType::Half => 2,
            AttribType::Float => 3,
        }
    }

    /// Byte size of one component.
    pub fn component_size(self) -> usize {
        match self {
            AttribType::Uint8 => 1,
            AttribType::Int16 | AttribType::Half => 2,
            AttribType::Float => 4,
        }
    }

    /// Packed byte size of an attribute with `num` components (1..=4).
    /// Three-component small types are padded to four.
    pub fn packed_size(self, num: u8) -> u16 {
        const SIZES: [[u16; 4]; 4] = [
            [1, 2, 4, 4],
            [2, 4, 8, 8],
            [2, 4, 8, 8],
            [4, 8, 12, 16],
        ];
        let row = match self {
            AttribType::Uint8 => 0,
            AttribType::Int16 => 1,
            AttribType::Half => 2,
            AttribType::Float => 3,
        };
        SIZES[row][usize::from(num.clamp(1, 4) - 1)]
    }
}

/// One attribute of a vertex declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttribDesc {
    pub attrib: Attrib,
    /// Component count, 1..=4.
    pub num: u8,
    pub ty: AttribType,
    pub normalized: bool,
    pub as_int: bool,
    /// Byte offset inside the vertex.
    pub offset: u16,
}

impl AttribDesc {
    #[inline]
    pub fn packed_size(&self) -> u16 {
        self.ty.packed_size(self.num)
    }
}

/// Ordered attribute layout plus the byte stride of one vertex.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexDecl {
    attributes: Vec<AttribDesc>,
    stride: u16,
}

impl VertexDecl {
    pub fn builder() -> VertexDeclBuilder {
        VertexDeclBuilder::default()
    }

    /// Build from already placed attributes and an explicit stride.
    pub fn from_parts(attributes: Vec<AttribDesc>, stride: u16) -> Self {
        Self { attributes, stride }
    }

    #[inline]
    pub fn stride(&self) -> u16 {
        self.stride
    }

    pub fn attributes(&self) -> &[AttribDesc] {
        &self.attributes
    }

    pub fn get(&self, attrib: Attrib) -> Option<&AttribDesc> {
        self.attributes.iter().find(|a| a.attrib == attrib)
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.get(attrib).is_some()
    }

    /// Sum of attribute sizes under the packing table.
    pub fn packed_stride(&self) -> u16 {
        self.attributes.iter().map(AttribDesc::packed_size).sum()
    }

    /// `true` if attributes appear in legacy slot order at packed offsets,
    /// the only layout the legacy encoding can express.
    pub fn is_slot_packed(&self) -> bool {
        let mut offset = 0u16;
        let mut last: Option<Attrib> = None;
        for a in &self.attributes {
            if last.is_some_and(|l| l >= a.attrib) || a.offset != offset {
                return false;
            }
            offset += a.packed_size();
            last = Some(a.attrib);
        }
        offset == self.stride
    }
}

/// Incremental builder that assigns packed offsets in insertion order.
#[derive(Clone, Debug, Default)]
pub struct VertexDeclBuilder {
    attributes: Vec<AttribDesc>,
    offset: u16,
}

impl VertexDeclBuilder {
    pub fn add(mut self, attrib: Attrib, num: u8, ty: AttribType, normalized: bool, as_int: bool) -> Self {
        let num = num.clamp(1, 4);
        let desc = AttribDesc {
            attrib,
            num,
            ty,
            normalized,
            as_int,
            offset: self.offset,
        };
        self.offset += desc.packed_size();
        self.attributes.push(desc);
        self
    }

    pub fn build(self) -> VertexDecl {
        VertexDecl {
            attributes: self.attributes,
            stride: self.offset,
        }
    }
}

/// Size of the legacy on-disk declaration, tail padding included.
pub const LEGACY_DECL_SIZE: usize = 56;

const LEGACY_UNUSED: u8 = 0xff;

/// Decode the legacy 56-byte declaration.
///
/// Offsets and stride are recomputed from the attribute types in slot order;
/// the stored stride must agree with the result.
pub(crate) fn decode_legacy<R: Read + Seek>(r: &mut ByteReader<R>) -> MeshResult<VertexDecl> {
    let mut raw = [0u8; LEGACY_DECL_SIZE];
    r.read_exact(&mut raw)?;

    let stored = u16::from_le_bytes([raw[4], raw[5]]);
    let packed = &raw[6 + 2 * Attrib::COUNT..6 + 3 * Attrib::COUNT];

    let mut builder = VertexDecl::builder();
    for (attrib, &bits) in Attrib::ALL.iter().zip(packed) {
        if bits == LEGACY_UNUSED {
            continue;
        }
        builder = builder.add(
            *attrib,
            (bits & 3) + 1,
            AttribType::from_legacy_bits(bits >> 3),
            bits & 0x40 != 0,
            bits & 0x80 != 0,
        );
    }
    let decl = builder.build();

    if decl.stride() != stored {
        return Err(MeshError::StrideMismatch {
            stored,
            computed: decl.stride(),
        });
    }
    Ok(decl)
}

/// Decode the revised declaration. Attributes with unknown ids or an
/// out-of-range component count are dropped and reported.
///
/// Stored offsets are not applied: kept attributes are packed in stream
/// order and the stored stride is taken as is.
pub(crate) fn decode_revised<R: Read + Seek>(
    r: &mut ByteReader<R>,
    group: usize,
) -> MeshResult<(VertexDecl, Vec<UnsupportedAttribute>)> {
    let num_attrs = r.read_u8()?;
    let stride = r.read_u16()?;

    let mut builder = VertexDecl::builder();
    let mut skipped = Vec::new();
    for _ in 0..num_attrs {
        let _offset = r.read_u16()?;
        let attrib_id = r.read_u16()?;
        let num = r.read_u8()?;
        let type_id = r.read_u16()?;
        let normalized = r.read_u8()? != 0;
        let as_int = r.read_u8()? != 0;

        match (Attrib::from_id(attrib_id), AttribType::from_id(type_id)) {
            (Some(attrib), Some(ty)) if (1..=4).contains(&num) => {
                builder = builder.add(attrib, num, ty, normalized, as_int);
            }
            _ => {
                let unsupported = UnsupportedAttribute {
                    group,
                    attrib_id,
                    type_id,
                    num,
                };
                log::warn!("Skipping vertex attribute: {unsupported}");
                skipped.push(unsupported);
            }
        }
    }

    let packed = builder.build();
    Ok((
        VertexDecl::from_parts(packed.attributes().to_vec(), stride),
        skipped,
    ))
}

/// Encode as the legacy 56-byte structure.
pub(crate) fn encode_legacy(decl: &VertexDecl, out: &mut Vec<u8>) {
    let mut offsets = [0u16; Attrib::COUNT];
    let mut packed = [LEGACY_UNUSED; Attrib::COUNT];
    for a in decl.attributes() {
        let slot = a.attrib.slot();
        offsets[slot] = a.offset;
        packed[slot] = (u8::from(a.as_int) << 7)
            | (u8::from(a.normalized) << 6)
            | (a.ty.legacy_bits() << 3)
            | (a.num - 1);
    }

    out.extend_from_slice(&legacy_hash(&packed).to_le_bytes());
    out.extend_from_slice(&decl.stride().to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&packed);
    out.extend_from_slice(&[0, 0]);
}

/// Encode as the revised table.
pub(crate) fn encode_revised(decl: &VertexDecl, out: &mut Vec<u8>) {
    out.push(decl.attributes().len() as u8);
    out.extend_from_slice(&decl.stride().to_le_bytes());
    for a in decl.attributes() {
        out.extend_from_slice(&a.offset.to_le_bytes());
        out.extend_from_slice(&a.attrib.id().to_le_bytes());
        out.push(a.num);
        out.extend_from_slice(&a.ty.id().to_le_bytes());
        out.push(u8::from(a.normalized));
        out.push(u8::from(a.as_int));
    }
}

/// FNV-1a over the packed attribute bytes. Readers ignore it.
fn legacy_hash(packed: &[u8]) -> u32 {
    packed.iter().fold(0x811c_9dc5u32, |h, &b| {
        (h ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}
