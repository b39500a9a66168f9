//! Read and write single attributes inside an interleaved vertex buffer.
//!
//! Values travel as `[f32; 4]`; missing components read as `0.0`. For
//! normalized small types `as_int` selects the signed encoding: uint8 maps
//! `[-1, 1]` around 128, int16 maps `[-1, 1]` around zero. Without it uint8
//! maps `[0, 1]` and int16 maps `[0, 1]` over the full range.

use half::f16;

use super::decl::{Attrib, AttribDesc, AttribType, VertexDecl};

fn attribute_range(desc: &AttribDesc, stride: u16, index: usize, len: usize) -> Option<usize> {
    let start = index * usize::from(stride) + usize::from(desc.offset);
    let end = start + desc.ty.component_size() * usize::from(desc.num);
    (end <= len).then_some(start)
}

/// Read attribute `attrib` of vertex `index`. `None` if the declaration
/// lacks the attribute or the vertex is out of range.
pub fn unpack(attrib: Attrib, decl: &VertexDecl, data: &[u8], index: usize) -> Option<[f32; 4]> {
    let desc = decl.get(attrib)?;
    let start = attribute_range(desc, decl.stride(), index, data.len())?;
    let size = desc.ty.component_size();

    let mut out = [0f32; 4];
    for (i, value) in out.iter_mut().take(usize::from(desc.num)).enumerate() {
        let b = &data[start + i * size..start + (i + 1) * size];
        *value = match desc.ty {
            AttribType::Uint8 => {
                let v = f32::from(b[0]);
                match (desc.normalized, desc.as_int) {
                    (false, _) => v,
                    (true, true) => v / 127.0 - 1.0,
                    (true, false) => v / 255.0,
                }
            }
            AttribType::Int16 => {
                let v = f32::from(i16::from_le_bytes([b[0], b[1]]));
                match (desc.normalized, desc.as_int) {
                    (false, _) => v,
                    (true, true) => v / 32767.0,
                    (true, false) => (v + 32768.0) / 65535.0,
                }
            }
            AttribType::Half => f16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32(),
            AttribType::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        };
    }
    Some(out)
}

/// Write attribute `attrib` of vertex `index`.
///
/// `input_normalized` marks `input` as already in the normalized range, in
/// which case normalized small types are rescaled; otherwise values are
/// stored as-is with saturation. Returns `false` when nothing was written.
pub fn pack(
    input: [f32; 4],
    input_normalized: bool,
    attrib: Attrib,
    decl: &VertexDecl,
    data: &mut [u8],
    index: usize,
) -> bool {
    let Some(desc) = decl.get(attrib) else {
        return false;
    };
    let Some(start) = attribute_range(desc, decl.stride(), index, data.len()) else {
        return false;
    };
    let size = desc.ty.component_size();
    let rescale = input_normalized && desc.normalized;

    for (i, &v) in input.iter().take(usize::from(desc.num)).enumerate() {
        let dst = &mut data[start + i * size..start + (i + 1) * size];
        match desc.ty {
            AttribType::Uint8 => {
                let v = match (rescale, desc.as_int) {
                    (false, _) => v,
                    (true, true) => v * 127.0 + 128.0,
                    (true, false) => v * 255.0,
                };
                dst[0] = v.round() as u8;
            }
            AttribType::Int16 => {
                let v = match (rescale, desc.as_int) {
                    (false, _) => v,
                    (true, true) => v * 32767.0,
                    (true, false) => v * 65535.0 - 32768.0,
                };
                dst.copy_from_slice(&(v.round() as i16).to_le_bytes());
            }
            AttribType::Half => dst.copy_from_slice(&f16::from_f32(v).to_bits().to_le_bytes()),
            AttribType::Float => dst.copy_from_slice(&v.to_le_bytes()),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl() -> VertexDecl {
        VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Normal, 4, AttribType::Uint8, true, true)
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .add(Attrib::TexCoord0, 2, AttribType::Half, false, false)
            .add(Attrib::TexCoord1, 2, AttribType::Int16, true, true)
            .build()
    }

    fn close(a: [f32; 4], b: [f32; 4], eps: f32) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() <= eps)
    }

    #[test]
    fn float_position_is_exact() {
        let decl = decl();
        let mut data = vec![0u8; usize::from(decl.stride()) * 3];
        assert!(pack([1.5, -2.0, 3.25, 9.0], false, Attrib::Position, &decl, &mut data, 2));
        let p = unpack(Attrib::Position, &decl, &data, 2).unwrap();
        assert_eq!(p, [1.5, -2.0, 3.25, 0.0]);
    }

    #[test]
    fn signed_uint8_normal_is_close() {
        let decl = decl();
        let mut data = vec![0u8; usize::from(decl.stride())];
        let n = [0.0, 1.0, -1.0, 0.5];
        assert!(pack(n, true, Attrib::Normal, &decl, &mut data, 0));
        let back = unpack(Attrib::Normal, &decl, &data, 0).unwrap();
        assert!(close(back, n, 1.0 / 64.0), "{back:?}");
    }

    #[test]
    fn unsigned_color_and_half_uv() {
        let decl = decl();
        let mut data = vec![0u8; usize::from(decl.stride())];
        pack([1.0, 0.0, 0.5, 1.0], true, Attrib::Color0, &decl, &mut data, 0);
        pack([0.25, 0.75, 0.0, 0.0], false, Attrib::TexCoord0, &decl, &mut data, 0);
        pack([-0.5, 0.5, 0.0, 0.0], true, Attrib::TexCoord1, &decl, &mut data, 0);

        let c = unpack(Attrib::Color0, &decl, &data, 0).unwrap();
        assert!(close(c, [1.0, 0.0, 0.5, 1.0], 1.0 / 255.0));
        let uv = unpack(Attrib::TexCoord0, &decl, &data, 0).unwrap();
        assert_eq!(uv, [0.25, 0.75, 0.0, 0.0]);
        let uv1 = unpack(Attrib::TexCoord1, &decl, &data, 0).unwrap();
        assert!(close(uv1, [-0.5, 0.5, 0.0, 0.0], 1e-4));
    }

    #[test]
    fn missing_attribute_or_vertex() {
        let decl = decl();
        let mut data = vec![0u8; usize::from(decl.stride())];
        assert!(unpack(Attrib::Tangent, &decl, &data, 0).is_none());
        assert!(unpack(Attrib::Position, &decl, &data, 1).is_none());
        assert!(!pack([0.0; 4], false, Attrib::Weight, &decl, &mut data, 0));
    }
}
