//! bric-afm: AFM image analysis.
//!
//! Loads Asylum Research MFP-3D scans (Igor binary waves), levels and
//! transforms their channels, computes surface statistics, and turns height
//! maps into surface meshes and plot figures:
//!
//! - [`mfp3d`]: `.ibw` loading (Igor Binary Wave v5)
//! - [`image`]: Image / Channel model with operation history
//! - [`ops`]: leveling and conformal-layer operations
//! - [`stats`]: roughness, histograms, Gaussian peak fitting
//! - [`mesh`]: height-map meshing, ray queries, PLY export
//! - [`plot`]: Plotly heatmap figures
//! - [`grid`], [`linalg`]: the numeric substrate

pub mod config;
pub mod grid;
pub mod image;
pub mod linalg;
pub mod mesh;
pub mod mfp3d;
pub mod ops;
pub mod plot;
pub mod stats;

pub use grid::{Axis, Grid2};
pub use image::{Channel, Image, ImageGroup};
