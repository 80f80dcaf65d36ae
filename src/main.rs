//! bric-afm: MFP-3D AFM image analysis from the command line.
//!
//! Loads `.ibw` scans and exposes the library's pipeline as subcommands:
//! inspect, level, compute roughness statistics, mesh surfaces (with
//! optional conformal layers), and emit plot figures.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bric_afm::config::{Cli, Command};
use bric_afm::grid::{Axis, Grid2};
use bric_afm::image::{Channel, Image};
use bric_afm::mesh::ply::{write_ply, PlyFormat};
use bric_afm::mesh::SurfaceMesh;
use bric_afm::ops::{ConformalLayer, MinToZero, Operation, PlaneLevel};
use bric_afm::{mfp3d, plot, stats};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "bric_afm=debug"
    } else {
        "bric_afm=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("bric-afm v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Info { file } => cmd_info(&file),
        Command::Level { file, channel, out } => cmd_level(&file, &channel, out.as_deref()),
        Command::Stats {
            files,
            channel,
            raw,
            histogram,
        } => cmd_stats(&files, &channel, raw, histogram.as_deref()),
        Command::Mesh {
            file,
            channel,
            color_channel,
            scale,
            z_scale,
            ascii,
            out,
        } => cmd_mesh(
            &file,
            &channel,
            color_channel.as_deref(),
            scale,
            z_scale,
            ply_format(ascii),
            &out,
        ),
        Command::Conformal {
            file,
            channel,
            thickness,
            scale,
            crop,
            ascii,
            out,
        } => cmd_conformal(&file, &channel, thickness, scale, crop, ply_format(ascii), &out),
        Command::Plot { file, channel, out } => cmd_plot(&file, &channel, &out),
    }
}

fn ply_format(ascii: bool) -> PlyFormat {
    if ascii {
        PlyFormat::Ascii
    } else {
        PlyFormat::BinaryLittleEndian
    }
}

fn load(file: &Path) -> Result<Image> {
    mfp3d::load_ibw(file).with_context(|| format!("loading {}", file.display()))
}

fn cmd_info(file: &Path) -> Result<()> {
    let image = load(file)?;
    let meta = image.meta();
    let (rows, cols) = image.shape();

    println!("name:     {}", meta.name);
    println!("shape:    {rows} x {cols}");
    if let Some((x0, x1)) = image.x().range() {
        println!("x:        {x0:e} .. {x1:e} {}", meta.x_units);
    }
    if let Some((y0, y1)) = image.y().range() {
        println!("y:        {y0:e} .. {y1:e} {}", meta.y_units);
    }
    if !meta.data_units.is_empty() {
        println!("units:    {}", meta.data_units);
    }
    println!("channels:");
    for label in image.labels() {
        println!("  {label}");
    }
    Ok(())
}

fn cmd_level(file: &Path, channel: &str, out: Option<&Path>) -> Result<()> {
    let mut image = load(file)?;
    let ch = image.channel_mut(channel)?;
    ch.apply(&PlaneLevel)?;
    ch.apply(&MinToZero)?;

    let ch = image.channel(channel)?;
    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_grid_csv(file, ch.x(), ch.y(), ch.data())?;
            info!(path = %path.display(), "Wrote leveled grid");
        }
        None => write_grid_csv(std::io::stdout(), ch.x(), ch.y(), ch.data())?,
    }
    Ok(())
}

/// CSV layout: first row is `x\y` plus the y positions, every following
/// row is an x position plus that row's samples.
fn write_grid_csv(writer: impl Write, x: &Axis, y: &Axis, data: &Grid2) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["x\\y".to_string()];
    header.extend(y.values().iter().map(|v| v.to_string()));
    csv.write_record(&header)?;

    for i in 0..data.rows() {
        let mut record = vec![x.get(i).to_string()];
        record.extend(data.row(i).iter().map(|v| v.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

fn cmd_stats(files: &[PathBuf], channel: &str, raw: bool, histogram: Option<&Path>) -> Result<()> {
    let mut last: Option<Channel> = None;
    for file in files {
        let image = load(file)?;
        let mut ch = image.channel(channel)?.clone();
        if !raw {
            ch.apply(&PlaneLevel)?;
            ch.apply(&MinToZero)?;
        }

        let ra = stats::roughness_avg(&ch)?;
        let rq = stats::roughness_rms(&ch)?;
        let (rows, cols) = ch.data().shape();
        println!(
            "{}\t{channel}\t{rows}x{cols}\tRa = {ra:.6e}\tRq = {rq:.6e}",
            file.display()
        );
        last = Some(ch);
    }

    if let Some(path) = histogram {
        let ch = last.as_ref().context("no channel to histogram")?;
        let hist = stats::histogram(ch)?;
        write_histogram_csv(path, &hist)?;
        info!(path = %path.display(), bins = hist.bins(), "Wrote histogram");
    }
    Ok(())
}

fn write_histogram_csv(path: &Path, hist: &stats::Histogram) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut csv = csv::Writer::from_writer(file);
    csv.write_record(["bin_start", "bin_end", "count"])?;
    for (k, count) in hist.counts.iter().enumerate() {
        csv.write_record(&[
            hist.edges[k].to_string(),
            hist.edges[k + 1].to_string(),
            count.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

fn cmd_mesh(
    file: &Path,
    channel: &str,
    color_channel: Option<&str>,
    scale: f64,
    z_scale: f64,
    format: PlyFormat,
    out: &Path,
) -> Result<()> {
    let image = load(file)?;
    let ch = image.channel(channel)?;

    let xs = image.x().scaled(scale);
    let ys = image.y().scaled(scale);
    let zs = ch.data().map(|v| v * scale * z_scale);
    let colors = match color_channel {
        Some(label) => Some(image.channel(label)?.data().clone()),
        None => None,
    };

    let mesh = SurfaceMesh::from_height_map(&xs, &ys, &zs, colors.as_ref())?;
    write_ply(&mesh, out, format)?;
    info!(
        path = %out.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Wrote surface mesh"
    );
    Ok(())
}

fn cmd_conformal(
    file: &Path,
    channel: &str,
    thickness: f64,
    scale: f64,
    crop: usize,
    format: PlyFormat,
    out: &Path,
) -> Result<()> {
    let image = load(file)?;
    let ch = image.channel(channel)?;

    let layer = ConformalLayer::new(thickness).with_scale(scale);
    let surface = layer.apply(image.x(), image.y(), ch.data())?;

    let (cx, cy, cz) = crop_border(image.x(), image.y(), &surface, crop)?;
    let mesh = SurfaceMesh::from_height_map(
        &cx.scaled(scale),
        &cy.scaled(scale),
        &cz.map(|v| v * scale),
        None,
    )?;
    write_ply(&mesh, out, format)?;
    info!(
        path = %out.display(),
        thickness,
        crop,
        vertices = mesh.vertex_count(),
        "Wrote conformal surface mesh"
    );
    Ok(())
}

/// Drop `n` samples from every border of the grid and its axes.
fn crop_border(x: &Axis, y: &Axis, data: &Grid2, n: usize) -> Result<(Axis, Axis, Grid2)> {
    let (rows, cols) = data.shape();
    ensure!(
        rows > 2 * n && cols > 2 * n,
        "crop of {n} removes the whole {rows}x{cols} grid"
    );
    let cx = Axis::new(x.values()[n..rows - n].to_vec());
    let cy = Axis::new(y.values()[n..cols - n].to_vec());
    let cz = Grid2::from_fn(rows - 2 * n, cols - 2 * n, |i, j| data.get(i + n, j + n));
    Ok((cx, cy, cz))
}

fn cmd_plot(file: &Path, channel: &str, out: &Path) -> Result<()> {
    let image = load(file)?;
    let ch = image.channel(channel)?;

    let unit = |u: &str, axis: &str| {
        if u.is_empty() {
            axis.to_string()
        } else {
            format!("{axis} ({u})")
        }
    };
    let meta = image.meta();
    let figure = plot::heatmap(ch)
        .with_axis_titles(unit(&meta.x_units, "x"), unit(&meta.y_units, "y"));
    figure.write_json(out)?;
    info!(path = %out.display(), channel, "Wrote figure");
    Ok(())
}
