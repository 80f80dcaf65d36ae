//! Command-line interface for the `bric-afm` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "bric-afm", about = "MFP-3D AFM image analysis", version)]
pub struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show an image's name, shape, channels, axes, and units.
    Info {
        /// Path to the `.ibw` file.
        file: PathBuf,
    },

    /// Plane-level a channel, zero its minimum, and export the grid as CSV.
    Level {
        /// Path to the `.ibw` file.
        file: PathBuf,

        /// Channel label, e.g. "HeightTrace".
        #[arg(short, long)]
        channel: String,

        /// Output CSV path (stdout if omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Roughness statistics for one channel across one or more files.
    Stats {
        /// Paths to `.ibw` files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Channel label.
        #[arg(short, long)]
        channel: String,

        /// Analyze raw data instead of leveling first.
        #[arg(long)]
        raw: bool,

        /// Write a Freedman-Diaconis histogram of the last file's channel
        /// to this CSV path.
        #[arg(long)]
        histogram: Option<PathBuf>,
    },

    /// Mesh a channel's surface and export it as PLY.
    Mesh {
        /// Path to the `.ibw` file.
        file: PathBuf,

        /// Channel label to mesh.
        #[arg(short, long)]
        channel: String,

        /// Channel label providing vertex colors.
        #[arg(long)]
        color_channel: Option<String>,

        /// Coordinate scale applied before meshing; meshing does best with
        /// values of order 1, so meters want ~1e9.
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Extra height exaggeration on top of the scale.
        #[arg(long, default_value_t = 1.0)]
        z_scale: f64,

        /// Write ASCII PLY instead of binary.
        #[arg(long)]
        ascii: bool,

        /// Output PLY path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Construct a conformal-layer surface and export it as PLY.
    Conformal {
        /// Path to the `.ibw` file.
        file: PathBuf,

        /// Channel label of the surface.
        #[arg(short, long)]
        channel: String,

        /// Layer thickness in the channel's data units.
        #[arg(short, long)]
        thickness: f64,

        /// Coordinate scale used for meshing and the exported surface.
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Crop this many border samples; the offset surface thins at the
        /// edges and leaves a NaN fringe there.
        #[arg(long, default_value_t = 0)]
        crop: usize,

        /// Write ASCII PLY instead of binary.
        #[arg(long)]
        ascii: bool,

        /// Output PLY path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Write a Plotly heatmap figure of a channel as JSON.
    Plot {
        /// Path to the `.ibw` file.
        file: PathBuf,

        /// Channel label.
        #[arg(short, long)]
        channel: String,

        /// Output JSON path.
        #[arg(short, long)]
        out: PathBuf,
    },
}
