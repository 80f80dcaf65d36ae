//! The in-memory image model.
//!
//! - [`channel`]: Channel, ChannelHistory, OpRecord
//! - [`Image`]: shared scan axes plus labeled channels
//! - [`ImageGroup`]: a named, ordered collection of images

pub mod channel;

pub use channel::{Channel, ChannelHistory, OpRecord};

use thiserror::Error;

use crate::grid::{Axis, Grid2};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("data shape {actual:?} does not match axes {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("{labels} labels given for {channels} channels")]
    LabelCountMismatch { labels: usize, channels: usize },

    #[error("unknown channel label: {0}")]
    UnknownLabel(String),

    #[error("duplicate channel label: {0}")]
    DuplicateLabel(String),

    #[error("channel index {0} out of range")]
    BadChannelIndex(usize),
}

/// Descriptive metadata carried from the instrument file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMeta {
    /// Wave name from the file.
    pub name: String,

    /// Units of the sample values (e.g. "m" for a height channel file).
    pub data_units: String,

    /// Units of the x axis.
    pub x_units: String,

    /// Units of the y axis.
    pub y_units: String,
}

/// A multi-channel scan: shared x/y axes plus labeled channels.
#[derive(Debug, Clone)]
pub struct Image {
    x: Axis,
    y: Axis,
    meta: ImageMeta,
    channels: Vec<Channel>,
}

impl Image {
    /// Create an image from per-channel grids and their labels.
    ///
    /// Fails if the label count does not match the channel count, a label
    /// repeats, or any grid's shape does not match the axes.
    pub fn new(
        x: Axis,
        y: Axis,
        grids: Vec<Grid2>,
        labels: Vec<String>,
    ) -> Result<Self, ImageError> {
        if grids.len() != labels.len() {
            return Err(ImageError::LabelCountMismatch {
                labels: labels.len(),
                channels: grids.len(),
            });
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ImageError::DuplicateLabel(label.clone()));
            }
        }

        let mut channels = Vec::with_capacity(grids.len());
        for (grid, label) in grids.into_iter().zip(labels) {
            channels.push(Channel::new(label, x.clone(), y.clone(), grid)?);
        }

        Ok(Self {
            x,
            y,
            meta: ImageMeta::default(),
            channels,
        })
    }

    /// Attach instrument metadata.
    pub fn with_meta(mut self, meta: ImageMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    /// Sample positions along x.
    pub fn x(&self) -> &Axis {
        &self.x
    }

    /// Sample positions along y.
    pub fn y(&self) -> &Axis {
        &self.y
    }

    /// `(rows, cols)` of every channel.
    pub fn shape(&self) -> (usize, usize) {
        (self.x.len(), self.y.len())
    }

    /// Channel labels in channel order.
    pub fn labels(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.label()).collect()
    }

    /// Index of a label, if present.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.label() == label)
    }

    /// Channel by label.
    pub fn get(&self, label: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.label() == label)
    }

    /// Mutable channel by label.
    pub fn get_mut(&mut self, label: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.label() == label)
    }

    /// Channel by label, or an [`ImageError::UnknownLabel`] error.
    pub fn channel(&self, label: &str) -> Result<&Channel, ImageError> {
        self.get(label)
            .ok_or_else(|| ImageError::UnknownLabel(label.to_string()))
    }

    /// Mutable channel by label, or an [`ImageError::UnknownLabel`] error.
    pub fn channel_mut(&mut self, label: &str) -> Result<&mut Channel, ImageError> {
        self.get_mut(label)
            .ok_or_else(|| ImageError::UnknownLabel(label.to_string()))
    }

    /// All channels in order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Copy of one channel's data, if the label exists.
    pub fn copy_channel(&self, label: &str) -> Option<Grid2> {
        self.get(label).map(|c| c.data().clone())
    }

    /// Replace a channel's data by index, keeping its label and history.
    pub fn set_channel_data(&mut self, index: usize, data: Grid2) -> Result<(), ImageError> {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(ImageError::BadChannelIndex(index))?;
        channel.set_data(data)
    }

    /// Rename channels. Every `(old, new)` pair must name an existing
    /// channel, and no rename may collide with a label that survives the
    /// mapping. The image is unchanged on error.
    pub fn map_labels(&mut self, mapping: &[(&str, &str)]) -> Result<(), ImageError> {
        for (old, _) in mapping {
            if self.label_index(old).is_none() {
                return Err(ImageError::UnknownLabel(old.to_string()));
            }
        }

        // Labels after the mapping would be applied.
        let renamed: Vec<String> = self
            .channels
            .iter()
            .map(|c| {
                mapping
                    .iter()
                    .find(|(old, _)| *old == c.label())
                    .map(|(_, new)| new.to_string())
                    .unwrap_or_else(|| c.label().to_string())
            })
            .collect();
        for (i, label) in renamed.iter().enumerate() {
            if renamed[..i].contains(label) {
                return Err(ImageError::DuplicateLabel(label.clone()));
            }
        }

        for (channel, label) in self.channels.iter_mut().zip(renamed) {
            channel.set_label(label);
        }
        Ok(())
    }
}

/// A named, insertion-ordered collection of images.
#[derive(Debug, Default)]
pub struct ImageGroup {
    entries: Vec<(String, Image)>,
}

impl ImageGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image under a name, replacing any image of the same name.
    pub fn insert(&mut self, name: impl Into<String>, image: Image) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = image;
        } else {
            self.entries.push((name, image));
        }
    }

    /// Image by name.
    pub fn get(&self, name: &str) -> Option<&Image> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, img)| img)
    }

    /// Mutable image by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Image> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, img)| img)
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Iterate `(name, image)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Image)> {
        self.entries.iter().map(|(n, img)| (n.as_str(), img))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
