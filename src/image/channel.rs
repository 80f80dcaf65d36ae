//! A single image channel and its operation history.
//!
//! A channel owns one scalar field of a scan plus the record of every
//! operation that has been applied to it, in order. History records carry
//! the operation name and its parameters as JSON so a processed channel can
//! always say how it got that way.

use serde::{Deserialize, Serialize};

use crate::grid::{Axis, Grid2};
use crate::image::ImageError;
use crate::ops::{Operation, OpsError};

/// One applied operation: its name and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpRecord {
    /// Operation name, e.g. `"plane_level"`.
    pub name: String,

    /// Operation parameters as JSON (an empty object for parameterless
    /// operations).
    pub params: serde_json::Value,
}

/// Ordered record of the operations applied to a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelHistory {
    records: Vec<OpRecord>,
}

impl ChannelHistory {
    /// Append a record.
    pub fn push(&mut self, record: OpRecord) {
        self.records.push(record);
    }

    /// The applied operations, oldest first.
    pub fn records(&self) -> &[OpRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One scalar field of an image.
///
/// Channels carry their own copy of the scan axes so they can be processed
/// and plotted independently of the [`Image`](crate::image::Image) they came
/// from.
#[derive(Debug, Clone)]
pub struct Channel {
    label: String,
    x: Axis,
    y: Axis,
    data: Grid2,
    history: ChannelHistory,
}

impl Channel {
    /// Create a channel. Fails if the grid shape does not match the axes.
    pub fn new(label: impl Into<String>, x: Axis, y: Axis, data: Grid2) -> Result<Self, ImageError> {
        if data.rows() != x.len() || data.cols() != y.len() {
            return Err(ImageError::ShapeMismatch {
                expected: (x.len(), y.len()),
                actual: data.shape(),
            });
        }
        Ok(Self {
            label: label.into(),
            x,
            y,
            data,
            history: ChannelHistory::default(),
        })
    }

    /// The channel label.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    /// Sample positions along x.
    pub fn x(&self) -> &Axis {
        &self.x
    }

    /// Sample positions along y.
    pub fn y(&self) -> &Axis {
        &self.y
    }

    /// The channel's samples.
    pub fn data(&self) -> &Grid2 {
        &self.data
    }

    /// The operations applied so far.
    pub fn history(&self) -> &ChannelHistory {
        &self.history
    }

    /// Replace the channel's samples. Fails if the shape changes.
    pub fn set_data(&mut self, data: Grid2) -> Result<(), ImageError> {
        if !data.same_shape(&self.data) {
            return Err(ImageError::ShapeMismatch {
                expected: self.data.shape(),
                actual: data.shape(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Apply an operation to the channel's data, recording it in the
    /// history.
    pub fn apply(&mut self, op: &dyn Operation) -> Result<(), OpsError> {
        let result = op.apply(&self.x, &self.y, &self.data)?;
        self.data = result;
        self.history.push(OpRecord {
            name: op.name().to_string(),
            params: op.params(),
        });
        Ok(())
    }
}
