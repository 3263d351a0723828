//! Error type shared by every layer of the texture engine.
//!
//! Every variant maps onto one [`ErrorKind`].  All of them describe invariant
//! violations (bad ingestion data or a misbehaving component), so nothing in
//! the crate retries; errors propagate to whoever drove the lifecycle call.

/// Coarse classification of a [`TextureError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A pixel, region or index lies outside the addressed buffer or list.
    Bounds,
    /// The pixel buffer, frame or texture has already been released.
    ClosedResource,
    /// An argument is outside its accepted range.
    InvalidArgument,
    /// A [`TextureAndFrameView`](crate::texture::TextureAndFrameView) was used
    /// outside the callback that issued it.
    InvalidFrameReference,
    /// The frames or components handed to the builder do not agree.
    StateConsistency,
}

/// Error returned by pixel buffers, frames and textures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureError {
    /// Pixel coordinate outside `[0, width) x [0, height)`.
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    /// Requested sub-region does not fit inside its parent buffer.
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        parent_width: u32,
        parent_height: u32,
    },
    /// Frame group index past the last frame.
    FrameIndexOutOfRange { index: usize, frames: usize },
    /// Operation on a released resource.
    Closed { resource: &'static str },
    /// Level 0 must have a non-zero width and height.
    ZeroDimension { width: u32, height: u32 },
    /// A frame was constructed without any mipmap buffers.
    NoMipmaps,
    /// `mipmaps[level]` is not half the size of the level below it.
    MipmapSizeMismatch {
        level: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Frame descriptor disagrees with the level-0 buffer.
    FrameDataMismatch {
        frame_data: (u32, u32),
        image: (u32, u32),
    },
    /// Mipmap level above the frame's maximum level.
    MipmapLevelOutOfRange { level: usize, max: usize },
    /// Layer count outside `[1, MAX_LAYERS]`.
    LayerCountOutOfRange { layers: usize, max: usize },
    /// Layer index past the frame's layer count.
    LayerOutOfRange { layer: usize, layers: usize },
    /// `copy_from` source retains fewer mipmap levels than the destination.
    InsufficientMipmaps { source: usize, destination: usize },
    /// Generic argument failure with a human-readable reason.
    InvalidArgument { reason: String },
    /// View used after the callback that produced it returned.
    InvalidFrameReference,
    /// Builder received no predefined frames.
    NoPredefinedFrames,
    /// Builder received no generated frame.
    MissingGeneratedFrame,
    /// Predefined and generated frames do not share a shape.
    InconsistentFrames { reason: String },
    /// Frame layer count differs from the number of attached components.
    LayerComponentMismatch { layers: usize, components: usize },
    /// Lifecycle method called in the wrong state.
    InvalidState { reason: &'static str },
}

impl TextureError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TextureError::OutOfBounds { .. }
            | TextureError::RegionOutOfBounds { .. }
            | TextureError::FrameIndexOutOfRange { .. } => ErrorKind::Bounds,
            TextureError::Closed { .. } => ErrorKind::ClosedResource,
            TextureError::ZeroDimension { .. }
            | TextureError::NoMipmaps
            | TextureError::MipmapSizeMismatch { .. }
            | TextureError::FrameDataMismatch { .. }
            | TextureError::MipmapLevelOutOfRange { .. }
            | TextureError::LayerCountOutOfRange { .. }
            | TextureError::LayerOutOfRange { .. }
            | TextureError::InsufficientMipmaps { .. }
            | TextureError::InvalidArgument { .. }
            | TextureError::NoPredefinedFrames => ErrorKind::InvalidArgument,
            TextureError::InvalidFrameReference => ErrorKind::InvalidFrameReference,
            TextureError::MissingGeneratedFrame
            | TextureError::InconsistentFrames { .. }
            | TextureError::LayerComponentMismatch { .. }
            | TextureError::InvalidState { .. } => ErrorKind::StateConsistency,
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        TextureError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(f, "pixel ({x}, {y}) is outside a {width}×{height} image"),
            TextureError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                parent_width,
                parent_height,
            } => write!(
                f,
                "region {width}×{height} at ({x}, {y}) does not fit inside a \
                 {parent_width}×{parent_height} image"
            ),
            TextureError::FrameIndexOutOfRange { index, frames } => {
                write!(f, "frame index {index} out of range (group has {frames} frames)")
            }
            TextureError::Closed { resource } => write!(f, "{resource} has already been closed"),
            TextureError::ZeroDimension { width, height } => write!(
                f,
                "frame dimensions must be non-zero (got {width}×{height})"
            ),
            TextureError::NoMipmaps => write!(f, "a frame needs at least one mipmap level"),
            TextureError::MipmapSizeMismatch {
                level,
                expected,
                actual,
            } => write!(
                f,
                "mipmap level {level} is {}×{} but must be about {}×{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            TextureError::FrameDataMismatch { frame_data, image } => write!(
                f,
                "frame data describes {}×{} but level 0 is {}×{}",
                frame_data.0, frame_data.1, image.0, image.1
            ),
            TextureError::MipmapLevelOutOfRange { level, max } => {
                write!(f, "mipmap level {level} exceeds maximum level {max}")
            }
            TextureError::LayerCountOutOfRange { layers, max } => {
                write!(f, "layer count {layers} must be within 1..={max}")
            }
            TextureError::LayerOutOfRange { layer, layers } => {
                write!(f, "layer {layer} out of range (frame has {layers} layers)")
            }
            TextureError::InsufficientMipmaps {
                source,
                destination,
            } => write!(
                f,
                "source keeps mipmaps up to level {source}, destination needs {destination}"
            ),
            TextureError::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            TextureError::InvalidFrameReference => write!(
                f,
                "illegal frame reference: view used outside the callback that issued it"
            ),
            TextureError::NoPredefinedFrames => {
                write!(f, "a texture needs at least one predefined frame")
            }
            TextureError::MissingGeneratedFrame => write!(f, "no generated frame was set"),
            TextureError::InconsistentFrames { reason } => {
                write!(f, "frames are inconsistent: {reason}")
            }
            TextureError::LayerComponentMismatch { layers, components } => write!(
                f,
                "frames have {layers} layers but {components} components are attached"
            ),
            TextureError::InvalidState { reason } => write!(f, "invalid texture state: {reason}"),
        }
    }
}

impl std::error::Error for TextureError {}
