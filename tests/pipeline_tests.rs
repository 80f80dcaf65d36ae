//! End-to-end pipeline tests: load -> rename -> level -> statistics ->
//! conformal layer -> mesh -> figure, on a synthesized scan.

mod common;

use common::IbwFixture;

use bric_afm::mesh::ply::{write_ply_to, PlyFormat};
use bric_afm::mesh::SurfaceMesh;
use bric_afm::ops::{ConformalLayer, MinToZero, Operation, PlaneLevel};
use bric_afm::{mfp3d, plot, stats};

const ROWS: usize = 32;
const COLS: usize = 32;
const STEP: f64 = 2.0e-7;

fn fixture() -> IbwFixture {
    IbwFixture {
        rows: ROWS,
        cols: COLS,
        x_step: STEP,
        y_step: STEP,
        ..Default::default()
    }
}

/// A tilted plane in meters, the usual raw shape of a height channel.
fn tilted_plane(c: usize, i: usize, j: usize) -> f64 {
    match c {
        0 => 1.0e-9 + 5.0e-3 * (i as f64 * STEP) + 2.0e-3 * (j as f64 * STEP),
        _ => (i * COLS + j) as f64,
    }
}

#[test]
fn test_level_pipeline() {
    let mut image = mfp3d::image_from_bytes(&fixture().build(tilted_plane)).unwrap();

    image.map_labels(&[("HeightTrace", "Height")]).unwrap();
    let height = image.channel_mut("Height").unwrap();
    height.apply(&PlaneLevel).unwrap();
    height.apply(&MinToZero).unwrap();

    let records = height.history().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "plane_level");
    assert_eq!(records[1].name, "min_to_zero");

    // The raw data was one plane: leveling flattens it to f32 noise.
    let data = image.channel("Height").unwrap().data();
    assert_eq!(data.min_finite(), Some(0.0));
    assert!(data.max_finite().unwrap() < 1.0e-12);
}

#[test]
fn test_statistics_pipeline() {
    let image = mfp3d::image_from_bytes(&fixture().build(tilted_plane)).unwrap();
    let height = image.channel("HeightTrace").unwrap();

    // Roughness is plane-relative, so a pure plane is smooth.
    assert!(stats::roughness_avg(height).unwrap() < 1.0e-12);
    assert!(stats::roughness_rms(height).unwrap() < 1.0e-12);

    let hist = stats::histogram(height).unwrap();
    assert_eq!(hist.counts.iter().sum::<u64>(), (ROWS * COLS) as u64);
    assert_eq!(hist.edges.len(), hist.counts.len() + 1);
}

#[test]
fn test_conformal_pipeline() {
    let mut image = mfp3d::image_from_bytes(&fixture().build(tilted_plane)).unwrap();
    let height = image.channel_mut("HeightTrace").unwrap();
    height.apply(&PlaneLevel).unwrap();
    height.apply(&MinToZero).unwrap();

    let thickness = 2.0e-9;
    let layer = ConformalLayer::new(thickness).with_scale(1.0e9);
    let height = image.channel("HeightTrace").unwrap();
    let surface = layer
        .apply(height.x(), height.y(), height.data())
        .unwrap();

    // The leveled surface is flat, so away from the borders the coating
    // raises it by exactly the thickness.
    for i in 1..ROWS - 1 {
        for j in 1..COLS - 1 {
            let v = surface.get(i, j);
            assert!(
                (v - thickness).abs() < 1.0e-11,
                "({i}, {j}): v = {v:e}"
            );
        }
    }
}

#[test]
fn test_mesh_pipeline() {
    let image = mfp3d::image_from_bytes(&fixture().build(tilted_plane)).unwrap();
    let height = image.channel("HeightTrace").unwrap();
    let colors = image.copy_channel("UserIn1Trace").unwrap();

    let scale = 1.0e9;
    let xs = height.x().scaled(scale);
    let ys = height.y().scaled(scale);
    let zs = height.data().map(|v| v * scale);
    let mesh = SurfaceMesh::from_height_map(&xs, &ys, &zs, Some(&colors)).unwrap();

    assert_eq!(mesh.vertex_count(), ROWS * COLS);
    assert_eq!(mesh.face_count(), (ROWS - 1) * (COLS - 1) * 2);
    assert_eq!(mesh.vertex_colors.as_ref().unwrap().len(), ROWS * COLS);

    let mut out = Vec::new();
    write_ply_to(&mesh, &mut out, PlyFormat::Ascii).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("ply\n"));
    assert!(text.contains(&format!("element vertex {}", ROWS * COLS)));
    assert!(text.contains(&format!("element face {}", (ROWS - 1) * (COLS - 1) * 2)));
}

#[test]
fn test_figure_pipeline() {
    let image = mfp3d::image_from_bytes(&fixture().build(tilted_plane)).unwrap();
    let height = image.channel("HeightTrace").unwrap();

    let figure = plot::heatmap(height).with_axis_titles("x (m)", "y (m)");
    let json: serde_json::Value = serde_json::from_str(&figure.to_json().unwrap()).unwrap();

    assert_eq!(json["data"][0]["type"], "heatmap");
    assert_eq!(json["data"][0]["colorbar"]["title"]["text"], "HeightTrace");
    assert_eq!(json["data"][0]["z"].as_array().unwrap().len(), COLS);
    assert_eq!(json["layout"]["xaxis"]["title"]["text"], "x (m)");
}
