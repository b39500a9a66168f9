//! Per-vertex tangent generation for normal mapping.

use glam::{Vec3, Vec4};
use thiserror::Error;

use super::decl::{Attrib, VertexDecl};
use super::vertex::{pack, unpack};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TangentError {
    #[error("vertex declaration has no {0:?} attribute")]
    MissingAttribute(Attrib),
    #[error("index {index} out of range for {num_vertices} vertices")]
    IndexOutOfRange { index: u16, num_vertices: usize },
}

/// Accumulate triangle tangents from positions and `TexCoord0`, orthogonalize
/// against the normal and pack them into the `Tangent` attribute. The `w`
/// component holds the bitangent handedness (`1.0` or `-1.0`).
///
/// Triangles with degenerate texture coordinates contribute nothing.
pub fn calc_tangents(
    vertices: &mut [u8],
    decl: &VertexDecl,
    indices: &[u16],
) -> Result<(), TangentError> {
    for attrib in [Attrib::Position, Attrib::TexCoord0, Attrib::Normal, Attrib::Tangent] {
        if !decl.has(attrib) {
            return Err(TangentError::MissingAttribute(attrib));
        }
    }
    let num_vertices = match decl.stride() {
        0 => 0,
        stride => vertices.len() / usize::from(stride),
    };
    if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= num_vertices) {
        return Err(TangentError::IndexOutOfRange {
            index,
            num_vertices,
        });
    }

    let read = |attrib: Attrib, data: &[u8], i: usize| {
        unpack(attrib, decl, data, i).map_or(Vec4::ZERO, Vec4::from_array)
    };

    let mut tangents = vec![(Vec3::ZERO, Vec3::ZERO); num_vertices];
    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0], tri[1], tri[2]].map(usize::from);
        let (p0, p1, p2) = (
            read(Attrib::Position, vertices, i0).truncate(),
            read(Attrib::Position, vertices, i1).truncate(),
            read(Attrib::Position, vertices, i2).truncate(),
        );
        let (uv0, uv1, uv2) = (
            read(Attrib::TexCoord0, vertices, i0),
            read(Attrib::TexCoord0, vertices, i1),
            read(Attrib::TexCoord0, vertices, i2),
        );

        let ba = p1 - p0;
        let ca = p2 - p0;
        let (bau, bav) = (uv1.x - uv0.x, uv1.y - uv0.y);
        let (cau, cav) = (uv2.x - uv0.x, uv2.y - uv0.y);

        let det = bau * cav - bav * cau;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let inv_det = det.recip();
        let t = (ba * cav - ca * bav) * inv_det;
        let b = (ca * bau - ba * cau) * inv_det;

        for i in [i0, i1, i2] {
            tangents[i].0 += t;
            tangents[i].1 += b;
        }
    }

    for (i, (tanu, tanv)) in tangents.into_iter().enumerate() {
        let normal = read(Attrib::Normal, vertices, i).truncate();
        let ndt = normal.dot(tanu);
        let nxt = normal.cross(tanu);

        let tangent = (tanu - normal * ndt).normalize_or_zero();
        let w = if nxt.dot(tanv) < 0.0 { -1.0 } else { 1.0 };
        pack(tangent.extend(w).to_array(), true, Attrib::Tangent, decl, vertices, i);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::AttribType;

    fn quad() -> (VertexDecl, Vec<u8>, Vec<u16>) {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Normal, 3, AttribType::Float, false, false)
            .add(Attrib::Tangent, 4, AttribType::Float, false, false)
            .add(Attrib::TexCoord0, 2, AttribType::Float, false, false)
            .build();
        let corners = [
            ([0.0, 0.0, 0.0], [0.0, 0.0]),
            ([1.0, 0.0, 0.0], [1.0, 0.0]),
            ([1.0, 1.0, 0.0], [1.0, 1.0]),
            ([0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        let mut data = vec![0u8; usize::from(decl.stride()) * corners.len()];
        for (i, (p, uv)) in corners.iter().enumerate() {
            pack([p[0], p[1], p[2], 0.0], false, Attrib::Position, &decl, &mut data, i);
            pack([0.0, 0.0, 1.0, 0.0], false, Attrib::Normal, &decl, &mut data, i);
            pack([uv[0], uv[1], 0.0, 0.0], false, Attrib::TexCoord0, &decl, &mut data, i);
        }
        (decl, data, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn planar_quad_tangent_follows_u() {
        let (decl, mut data, indices) = quad();
        calc_tangents(&mut data, &decl, &indices).unwrap();
        for i in 0..4 {
            let t = unpack(Attrib::Tangent, &decl, &data, i).unwrap();
            assert!((t[0] - 1.0).abs() < 1e-5, "vertex {i}: {t:?}");
            assert!(t[1].abs() < 1e-5 && t[2].abs() < 1e-5);
            assert_eq!(t[3], 1.0);
        }
    }

    #[test]
    fn mirrored_uv_flips_handedness() {
        let (decl, mut data, indices) = quad();
        for i in 0..4 {
            let uv = unpack(Attrib::TexCoord0, &decl, &data, i).unwrap();
            pack([uv[0], 1.0 - uv[1], 0.0, 0.0], false, Attrib::TexCoord0, &decl, &mut data, i);
        }
        calc_tangents(&mut data, &decl, &indices).unwrap();
        let t = unpack(Attrib::Tangent, &decl, &data, 0).unwrap();
        assert_eq!(t[3], -1.0);
    }

    #[test]
    fn requires_tangent_slot() {
        let decl = VertexDecl::builder()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .build();
        let err = calc_tangents(&mut [], &decl, &[]).unwrap_err();
        assert_eq!(err, TangentError::MissingAttribute(Attrib::TexCoord0));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let (decl, mut data, _) = quad();
        let err = calc_tangents(&mut data, &decl, &[0, 1, 9]).unwrap_err();
        assert_eq!(
            err,
            TangentError::IndexOutOfRange {
                index: 9,
                num_vertices: 4
            }
        );
    }
}
