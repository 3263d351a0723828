//! Read-only access to a texture's predefined frames.

use crate::{
    error::TextureError,
    frame::{CloseableImageFrame, FrameData},
};

/// Immutable view over one predefined frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameReader<'a> {
    frame: &'a CloseableImageFrame,
}

impl<'a> FrameReader<'a> {
    /// Level-0 width.
    pub fn width(&self) -> Result<u32, TextureError> {
        self.frame.width()
    }

    /// Level-0 height.
    pub fn height(&self) -> Result<u32, TextureError> {
        self.frame.height()
    }

    /// Composited level-0 colour at `(x, y)`.
    pub fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        self.frame.color(x, y)
    }

    /// Current mipmap ceiling.
    pub fn mipmap_level(&self) -> Result<usize, TextureError> {
        self.frame.mipmap_level()
    }

    pub fn frame_data(&self) -> FrameData {
        self.frame.frame_data()
    }
}

/// Indexed, 0-based group of predefined frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameGroup<'a> {
    frames: &'a [CloseableImageFrame],
}

impl<'a> FrameGroup<'a> {
    pub(crate) fn new(frames: &'a [CloseableImageFrame]) -> Self {
        Self { frames }
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    /// Frame at `index`, or [`TextureError::FrameIndexOutOfRange`].
    pub fn frame(&self, index: usize) -> Result<FrameReader<'a>, TextureError> {
        self.frames
            .get(index)
            .map(|frame| FrameReader { frame })
            .ok_or(TextureError::FrameIndexOutOfRange {
                index,
                frames: self.frames.len(),
            })
    }

    /// Frames in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = FrameReader<'a>> + 'a {
        self.frames.iter().map(|frame| FrameReader { frame })
    }
}
