//! PLY export of surface meshes.
//!
//! Binary little-endian by default (compact, loads everywhere), ASCII on
//! request for eyeballing. Vertices carry position and normal, plus RGBA
//! when the mesh is colored.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::mesh::{MeshError, SurfaceMesh};

/// On-disk PLY flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    #[default]
    BinaryLittleEndian,
    Ascii,
}

/// Write a mesh to `path` as PLY.
pub fn write_ply(mesh: &SurfaceMesh, path: &Path, format: PlyFormat) -> Result<(), MeshError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_ply_to(mesh, &mut writer, format)?;
    writer.flush()?;

    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        format = ?format,
        "Wrote PLY mesh"
    );
    Ok(())
}

/// Write a mesh as PLY to any writer.
pub fn write_ply_to(
    mesh: &SurfaceMesh,
    writer: &mut impl Write,
    format: PlyFormat,
) -> Result<(), MeshError> {
    let colored = mesh.vertex_colors.is_some();

    let format_line = match format {
        PlyFormat::BinaryLittleEndian => "format binary_little_endian 1.0",
        PlyFormat::Ascii => "format ascii 1.0",
    };
    writeln!(writer, "ply")?;
    writeln!(writer, "{format_line}")?;
    writeln!(writer, "comment generated by bric-afm")?;
    writeln!(writer, "element vertex {}", mesh.vertex_count())?;
    for prop in ["x", "y", "z", "nx", "ny", "nz"] {
        writeln!(writer, "property float {prop}")?;
    }
    if colored {
        for prop in ["red", "green", "blue", "alpha"] {
            writeln!(writer, "property uchar {prop}")?;
        }
    }
    writeln!(writer, "element face {}", mesh.face_count())?;
    writeln!(writer, "property list uchar uint vertex_indices")?;
    writeln!(writer, "end_header")?;

    match format {
        PlyFormat::BinaryLittleEndian => write_binary(mesh, writer),
        PlyFormat::Ascii => write_ascii(mesh, writer),
    }
}

/// Non-finite components (NaN vertices whose faces were dropped) are
/// written as 0 so every consumer can parse the file.
fn vertex_record(mesh: &SurfaceMesh, idx: usize) -> [f32; 6] {
    let v = mesh.vertices[idx];
    let n = mesh.vertex_normals[idx];
    let clean = |c: f64| if c.is_finite() { c as f32 } else { 0.0 };
    [
        clean(v[0]),
        clean(v[1]),
        clean(v[2]),
        clean(n[0]),
        clean(n[1]),
        clean(n[2]),
    ]
}

fn write_binary(mesh: &SurfaceMesh, writer: &mut impl Write) -> Result<(), MeshError> {
    for idx in 0..mesh.vertex_count() {
        let record = vertex_record(mesh, idx);
        writer.write_all(bytemuck::bytes_of(&record))?;
        if let Some(colors) = &mesh.vertex_colors {
            writer.write_all(&colors[idx])?;
        }
    }
    for face in &mesh.faces {
        writer.write_all(&[3u8])?;
        writer.write_all(bytemuck::bytes_of(face))?;
    }
    Ok(())
}

fn write_ascii(mesh: &SurfaceMesh, writer: &mut impl Write) -> Result<(), MeshError> {
    for idx in 0..mesh.vertex_count() {
        let [x, y, z, nx, ny, nz] = vertex_record(mesh, idx);
        write!(writer, "{x} {y} {z} {nx} {ny} {nz}")?;
        if let Some(colors) = &mesh.vertex_colors {
            let [r, g, b, a] = colors[idx];
            write!(writer, " {r} {g} {b} {a}")?;
        }
        writeln!(writer)?;
    }
    for face in &mesh.faces {
        writeln!(writer, "3 {} {} {}", face[0], face[1], face[2])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, Grid2};

    fn small_mesh(colored: bool) -> SurfaceMesh {
        let x = Axis::linspace(0.0, 1.0, 2);
        let y = Axis::linspace(0.0, 1.0, 2);
        let data = Grid2::from_vec(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let colors = Grid2::from_vec(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        SurfaceMesh::from_height_map(&x, &y, &data, colored.then_some(&colors)).unwrap()
    }

    #[test]
    fn test_ascii_header_and_body() {
        let mesh = small_mesh(false);
        let mut out = Vec::new();
        write_ply_to(&mesh, &mut out, PlyFormat::Ascii).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("ply\nformat ascii 1.0\n"));
        assert!(text.contains("element vertex 4"));
        assert!(text.contains("element face 2"));
        assert!(text.contains("property float nz"));
        assert!(!text.contains("property uchar red"));
        // 4 vertex lines + 2 face lines after the header.
        let body: Vec<&str> = text
            .split("end_header\n")
            .nth(1)
            .unwrap()
            .lines()
            .collect();
        assert_eq!(body.len(), 6);
        assert!(body[4].starts_with("3 "));
    }

    #[test]
    fn test_binary_sizes() {
        let mesh = small_mesh(true);
        let mut out = Vec::new();
        write_ply_to(&mesh, &mut out, PlyFormat::BinaryLittleEndian).unwrap();

        let header_end = b"end_header\n";
        let pos = out
            .windows(header_end.len())
            .position(|w| w == header_end)
            .unwrap()
            + header_end.len();
        let body = &out[pos..];
        // 4 vertices * (6 floats + 4 color bytes) + 2 faces * (1 + 12).
        assert_eq!(body.len(), 4 * (24 + 4) + 2 * 13);
    }

    #[test]
    fn test_color_properties_declared() {
        let mesh = small_mesh(true);
        let mut out = Vec::new();
        write_ply_to(&mesh, &mut out, PlyFormat::Ascii).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("property uchar red"));
        assert!(text.contains("property uchar alpha"));
    }

    #[test]
    fn test_write_ply_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.ply");
        write_ply(&small_mesh(false), &path, PlyFormat::default()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"ply\nformat binary_little_endian 1.0\n"));
    }
}
