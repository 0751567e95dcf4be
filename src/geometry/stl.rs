//! STL mesh decoding for fetched model buffers.
//!
//! Both encodings are accepted. A buffer is binary when its length matches
//! the face count declared after the 80-byte header; otherwise it must
//! start with `solid` and parse as ASCII.
//!
//! ```text
//! UINT8[80]    header
//! UINT32       triangle count
//! per triangle
//!     REAL32[3] normal
//!     REAL32[3] vertex 1..3
//!     UINT16    attribute byte count
//! ```

use glam::Vec3;

use super::GeometryError;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// One decoded mesh: a flat triangle soup in model units (mm).
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGeometry {
    /// Model name the mesh was fetched as.
    pub name: String,
    /// Three positions per triangle.
    pub positions: Vec<Vec3>,
    /// One face normal per triangle.
    pub normals: Vec<Vec3>,
    /// Minimum corner of the positions.
    pub min: Vec3,
    /// Maximum corner of the positions.
    pub max: Vec3,
}

impl MeshGeometry {
    /// Decode an STL buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::MeshParse`] on truncated or malformed input
    /// and on meshes without a single triangle.
    pub fn from_stl(name: &str, bytes: &[u8]) -> Result<Self, GeometryError> {
        let positions = if is_binary(bytes) {
            decode_binary(name, bytes)?
        } else if starts_with_solid(bytes) {
            decode_ascii(name, bytes)?
        } else {
            return Err(GeometryError::mesh_parse(
                name,
                format!("{} bytes is neither binary nor ASCII STL", bytes.len()),
            ));
        };

        if positions.is_empty() {
            return Err(GeometryError::mesh_parse(name, "mesh has no triangles"));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(GeometryError::mesh_parse(name, "non-finite vertex"));
        }

        let normals = positions
            .chunks_exact(3)
            .map(|t| (t[1] - t[0]).cross(t[2] - t[0]).normalize_or_zero())
            .collect();
        let (min, max) = positions.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );

        Ok(Self {
            name: name.to_owned(),
            positions,
            normals,
            min,
            max,
        })
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Extent of the bounding box.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

fn declared_faces(bytes: &[u8]) -> Option<usize> {
    let count = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?;
    let faces = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);
    usize::try_from(faces).ok()
}

fn is_binary(bytes: &[u8]) -> bool {
    declared_faces(bytes).is_some_and(|faces| {
        faces
            .checked_mul(TRIANGLE_SIZE)
            .and_then(|body| body.checked_add(HEADER_SIZE + 4))
            == Some(bytes.len())
    })
}

fn starts_with_solid(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SIZE)];
    String::from_utf8_lossy(head).trim_start().starts_with("solid")
}

fn decode_binary(name: &str, bytes: &[u8]) -> Result<Vec<Vec3>, GeometryError> {
    let faces = declared_faces(bytes)
        .ok_or_else(|| GeometryError::mesh_parse(name, "truncated header"))?;
    let mut positions = Vec::with_capacity(faces * 3);
    for triangle in bytes[HEADER_SIZE + 4..].chunks_exact(TRIANGLE_SIZE) {
        // Skip the stored normal; it is recomputed from the winding.
        positions.push(read_vertex(&triangle[12..24]));
        positions.push(read_vertex(&triangle[24..36]));
        positions.push(read_vertex(&triangle[36..48]));
    }
    Ok(positions)
}

fn read_vertex(buf: &[u8]) -> Vec3 {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Vec3::new(x, y, z)
}

fn decode_ascii(name: &str, bytes: &[u8]) -> Result<Vec<Vec3>, GeometryError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| GeometryError::mesh_parse(name, e.to_string()))?;

    let mut positions = Vec::new();
    let mut facet: Vec<Vec3> = Vec::with_capacity(3);
    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("vertex") => {
                let coords: Vec<f32> = parts
                    .map(str::parse::<f32>)
                    .collect::<Result<_, _>>()
                    .map_err(|e| {
                        GeometryError::mesh_parse(
                            name,
                            format!("line {}: {e}", line_no + 1),
                        )
                    })?;
                if coords.len() != 3 {
                    return Err(GeometryError::mesh_parse(
                        name,
                        format!("line {}: expected 3 coordinates", line_no + 1),
                    ));
                }
                facet.push(Vec3::new(coords[0], coords[1], coords[2]));
            }
            Some("endfacet") => {
                if facet.len() != 3 {
                    return Err(GeometryError::mesh_parse(
                        name,
                        format!(
                            "line {}: facet has {} vertices",
                            line_no + 1,
                            facet.len()
                        ),
                    ));
                }
                positions.append(&mut facet);
            }
            Some("endsolid") => break,
            _ => {}
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::testing::binary_stl;
    use crate::geometry::GeometryErrorKind;

    fn unit_triangle() -> [Vec3; 3] {
        [Vec3::ZERO, Vec3::X, Vec3::Y]
    }

    #[test]
    fn decodes_binary() {
        let bytes = binary_stl(&[unit_triangle(), [Vec3::Z, Vec3::X, Vec3::ONE]]);
        let mesh = MeshGeometry::from_stl("frame.stl", &bytes).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.min, Vec3::ZERO);
        assert_eq!(mesh.max, Vec3::ONE);
        assert_eq!(mesh.normals[0], Vec3::Z);
    }

    #[test]
    fn binary_header_starting_with_solid_is_still_binary() {
        let mut bytes = binary_stl(&[unit_triangle()]);
        bytes[..5].copy_from_slice(b"solid");
        let mesh = MeshGeometry::from_stl("panel.stl", &bytes).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn decodes_ascii() {
        let text = "solid panel
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid panel
";
        let mesh = MeshGeometry::from_stl("panel.stl", text.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.size(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn truncated_binary_fails() {
        let mut bytes = binary_stl(&[unit_triangle(), unit_triangle()]);
        bytes.truncate(bytes.len() - 10);
        let err = MeshGeometry::from_stl("frame.stl", &bytes).unwrap_err();
        assert_eq!(err.kind(), GeometryErrorKind::MeshParse);
    }

    #[test]
    fn empty_mesh_fails() {
        let bytes = binary_stl(&[]);
        assert!(MeshGeometry::from_stl("frame.stl", &bytes).is_err());
    }

    #[test]
    fn bad_ascii_coordinate_fails() {
        let text = "solid x\nfacet normal 0 0 1\nouter loop\nvertex 0 zero 0\n";
        let err = MeshGeometry::from_stl("x.stl", text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), GeometryErrorKind::MeshParse);
    }
}
