//! Plot figure generation.
//!
//! A Plotly figure is a JSON document, so plotting here means building the
//! figure object for a channel and serializing it; any Plotly front end
//! (the JS library, a notebook, `plotly.io.read_json`) renders it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::image::Channel;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorBar {
    pub title: Title,
}

/// One heatmap trace.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: String,

    /// Column coordinates (the scan's x axis).
    pub x: Vec<f64>,

    /// Row coordinates (the scan's y axis).
    pub y: Vec<f64>,

    /// Row-major over `y`: `z[j][i]` is the sample at `(x[i], y[j])`.
    /// NaN serializes as `null`.
    pub z: Vec<Vec<Option<f64>>>,

    pub colorscale: String,
    pub colorbar: ColorBar,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisLayout {
    pub title: Title,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: AxisLayout,
    pub yaxis: AxisLayout,
}

/// A renderable figure: traces plus layout.
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    /// Override the axis titles (e.g. to carry units).
    pub fn with_axis_titles(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.layout.xaxis.title.text = x.into();
        self.layout.yaxis.title.text = y.into();
        self
    }

    /// The figure as Plotly JSON.
    pub fn to_json(&self) -> Result<String, PlotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the figure as Plotly JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), PlotError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), "Wrote figure");
        Ok(())
    }
}

/// Heatmap figure of a channel.
pub fn heatmap(channel: &Channel) -> Figure {
    let data = channel.data();
    let (rows, cols) = data.shape();

    // Plotly wants one z row per y coordinate.
    let z = (0..cols)
        .map(|j| {
            (0..rows)
                .map(|i| {
                    let v = data.get(i, j);
                    v.is_finite().then_some(v)
                })
                .collect()
        })
        .collect();

    Figure {
        data: vec![Trace {
            kind: "heatmap".to_string(),
            x: channel.x().values().to_vec(),
            y: channel.y().values().to_vec(),
            z,
            colorscale: "Viridis".to_string(),
            colorbar: ColorBar {
                title: Title {
                    text: channel.label().to_string(),
                },
            },
        }],
        layout: Layout {
            title: Title {
                text: channel.label().to_string(),
            },
            xaxis: AxisLayout {
                title: Title {
                    text: "x".to_string(),
                },
            },
            yaxis: AxisLayout {
                title: Title {
                    text: "y".to_string(),
                },
            },
        },
    }
}
