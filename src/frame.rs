//! Mipmapped frames with layered, dependency-ordered partial updates.
//!
//! # Layers
//! Level 0 of a frame is composited from up to [`MAX_LAYERS`] layers, one per
//! component attached to the owning texture.  Every write is stamped with a
//! frame-wide sequence number and remembered per layer:
//!
//! * the visible (uploaded) pixel is the value of the **topmost** layer that
//!   has written it, or the frame's base content if no layer has;
//! * a transform running on layer `L` reads, through [`Dependencies`], the
//!   **most recent** write at a layer `<= L`, ignoring anything above `L`.
//!
//! Reads inside one [`apply_transform`](CloseableImageFrame::apply_transform)
//! call see the frame as it was when the call started; all results are
//! computed first and written afterwards.
//!
//! # Mipmaps
//! After level 0 changes, only the ancestors of touched pixels are
//! re-blended, level by level, up to the current mipmap ceiling.

use crate::{
    area::{Area, Point},
    color,
    error::TextureError,
    image::{CloseableImage, MemoryImage},
    upload::UploadQueue,
};

/// Maximum number of compositing layers per frame.
pub const MAX_LAYERS: usize = 128;

/// Logical size of a frame and where it was cut from in its source image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameData {
    /// Level-0 width in pixels.
    pub width: u32,
    /// Level-0 height in pixels.
    pub height: u32,
    /// Left edge of the frame within its source image.
    pub x_offset: u32,
    /// Top edge of the frame within its source image.
    pub y_offset: u32,
}

impl FrameData {
    /// Descriptor of a `width × height` frame cut at `(x_offset, y_offset)`.
    pub const fn new(width: u32, height: u32, x_offset: u32, y_offset: u32) -> Self {
        Self {
            width,
            height,
            x_offset,
            y_offset,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct LayerWrite {
    color: u32,
    sequence: u64,
}

/// Per-layer write records for level 0, allocated on first write.
type LayerRecords = Option<Vec<Option<LayerWrite>>>;

/// One animation frame: a mipmap chain plus level-0 compositing layers.
pub struct CloseableImageFrame {
    frame_data: FrameData,
    /// Indexed by level; `None` once a level is discarded.
    mipmaps: Vec<Option<Box<dyn CloseableImage>>>,
    mipmap_level: usize,
    layers: Vec<LayerRecords>,
    /// Level-0 content underneath every layer.
    base: Vec<u32>,
    sequence: u64,
    closed: bool,
}

impl std::fmt::Debug for CloseableImageFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseableImageFrame")
            .field("frame_data", &self.frame_data)
            .field("max_mipmap_level", &self.max_mipmap_level())
            .field("mipmap_level", &self.mipmap_level)
            .field("layers", &self.layers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Whether `size` is an acceptable mipmap of `parent` (half, rounded either way).
fn is_half(parent: u32, size: u32) -> bool {
    size == parent / 2 || size == parent.div_ceil(2)
}

impl CloseableImageFrame {
    /// Build a frame from an explicit mipmap chain.
    ///
    /// `mipmaps[k]` must be half of `mipmaps[k - 1]` in both axes, rounded
    /// down or up.  Only the last level may have a zero dimension.
    pub fn new(
        frame_data: FrameData,
        mipmaps: Vec<Box<dyn CloseableImage>>,
        layers: usize,
    ) -> Result<Self, TextureError> {
        if !(1..=MAX_LAYERS).contains(&layers) {
            return Err(TextureError::LayerCountOutOfRange {
                layers,
                max: MAX_LAYERS,
            });
        }
        let Some(level0) = mipmaps.first() else {
            return Err(TextureError::NoMipmaps);
        };
        let (width, height) = (level0.width()?, level0.height()?);
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimension { width, height });
        }
        if (frame_data.width, frame_data.height) != (width, height) {
            return Err(TextureError::FrameDataMismatch {
                frame_data: (frame_data.width, frame_data.height),
                image: (width, height),
            });
        }

        let last = mipmaps.len() - 1;
        for level in 1..mipmaps.len() {
            let parent = (mipmaps[level - 1].width()?, mipmaps[level - 1].height()?);
            let actual = (mipmaps[level].width()?, mipmaps[level].height()?);
            let halved = is_half(parent.0, actual.0) && is_half(parent.1, actual.1);
            let empty_before_last = (actual.0 == 0 || actual.1 == 0) && level != last;
            if !halved || empty_before_last {
                return Err(TextureError::MipmapSizeMismatch {
                    level,
                    expected: (parent.0 / 2, parent.1 / 2),
                    actual,
                });
            }
        }

        let mut base = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                base.push(level0.color(x, y)?);
            }
        }

        Ok(Self {
            frame_data,
            mipmap_level: last,
            mipmaps: mipmaps.into_iter().map(Some).collect(),
            layers: vec![None; layers],
            base,
            sequence: 0,
            closed: false,
        })
    }

    /// Build a frame from level-0 pixels, box-filtering levels `1..=mipmap_level`.
    ///
    /// Generation stops early after a level with a zero dimension.
    pub fn with_generated_mipmaps(
        frame_data: FrameData,
        pixels: Vec<u32>,
        mipmap_level: usize,
        layers: usize,
        queue: UploadQueue,
    ) -> Result<Self, TextureError> {
        let (width, height) = (frame_data.width, frame_data.height);
        if pixels.len() != width as usize * height as usize {
            return Err(TextureError::invalid_argument(format!(
                "{} pixels supplied for a {width}×{height} frame",
                pixels.len()
            )));
        }

        let mut chain = vec![(width, height, pixels)];
        while chain.len() <= mipmap_level {
            let (pw, ph, prev) = &chain[chain.len() - 1];
            let (pw, ph) = (*pw, *ph);
            if pw == 0 || ph == 0 {
                break;
            }
            let (w, h) = (pw / 2, ph / 2);
            let mut next = Vec::with_capacity(w as usize * h as usize);
            for y in 0..h {
                for x in 0..w {
                    let at = |dx: u32, dy: u32| prev[((y * 2 + dy) * pw + x * 2 + dx) as usize];
                    next.push(color::blend(at(0, 0), at(1, 0), at(0, 1), at(1, 1)));
                }
            }
            chain.push((w, h, next));
        }

        let mipmaps = chain
            .into_iter()
            .map(|(w, h, px)| {
                MemoryImage::from_pixels(w, h, px, queue.clone())
                    .map(|image| Box::new(image) as Box<dyn CloseableImage>)
            })
            .collect::<Result<_, TextureError>>()?;
        Self::new(frame_data, mipmaps, layers)
    }

    fn ensure_open(&self) -> Result<(), TextureError> {
        if self.closed {
            return Err(TextureError::Closed { resource: "frame" });
        }
        Ok(())
    }

    /// Buffer for a retained level.
    fn level(&self, level: usize) -> Result<&dyn CloseableImage, TextureError> {
        match self.mipmaps.get(level) {
            None => Err(TextureError::MipmapLevelOutOfRange {
                level,
                max: self.max_mipmap_level(),
            }),
            Some(None) => Err(TextureError::Closed {
                resource: "mipmap level",
            }),
            Some(Some(image)) => Ok(image.as_ref()),
        }
    }

    fn level_mut(&mut self, level: usize) -> Result<&mut Box<dyn CloseableImage>, TextureError> {
        let max = self.max_mipmap_level();
        match self.mipmaps.get_mut(level) {
            None => Err(TextureError::MipmapLevelOutOfRange { level, max }),
            Some(None) => Err(TextureError::Closed {
                resource: "mipmap level",
            }),
            Some(Some(image)) => Ok(image),
        }
    }

    /// Descriptor the frame was built with.
    pub fn frame_data(&self) -> FrameData {
        self.frame_data
    }

    /// Level-0 width.  Fails once closed.
    pub fn width(&self) -> Result<u32, TextureError> {
        self.ensure_open()?;
        Ok(self.frame_data.width)
    }

    /// Level-0 height.  Fails once closed.
    pub fn height(&self) -> Result<u32, TextureError> {
        self.ensure_open()?;
        Ok(self.frame_data.height)
    }

    /// Current mipmap ceiling.
    pub fn mipmap_level(&self) -> Result<usize, TextureError> {
        self.ensure_open()?;
        Ok(self.mipmap_level)
    }

    /// Highest level supplied at construction.
    pub fn max_mipmap_level(&self) -> usize {
        self.mipmaps.len().saturating_sub(1)
    }

    /// Number of compositing layers.
    pub fn layers(&self) -> usize {
        self.layers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Composited level-0 colour at `(x, y)`.
    pub fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        self.color_at(0, x, y)
    }

    /// Colour at `(x, y)` of mip level `level`.
    pub fn color_at(&self, level: usize, x: u32, y: u32) -> Result<u32, TextureError> {
        self.ensure_open()?;
        self.level(level)?.color(x, y)
    }

    /// Upload levels `0..=down_to_level` with `(x, y)` halved per level.
    ///
    /// Levels above the current ceiling, and empty levels, are skipped.
    pub fn upload_at(&self, x: u32, y: u32, down_to_level: usize) -> Result<(), TextureError> {
        self.ensure_open()?;
        if down_to_level > self.max_mipmap_level() {
            return Err(TextureError::MipmapLevelOutOfRange {
                level: down_to_level,
                max: self.max_mipmap_level(),
            });
        }
        for level in 0..=down_to_level.min(self.mipmap_level) {
            let image = self.level(level)?;
            if image.width()? == 0 || image.height()? == 0 {
                continue;
            }
            let shift = level.min(31) as u32;
            image.upload(x >> shift, y >> shift, level)?;
        }
        Ok(())
    }

    /// Close and discard every level above `level`.
    ///
    /// Lowering to or above the current ceiling only validates `level`.
    pub fn lower_mipmap_level(&mut self, level: usize) -> Result<(), TextureError> {
        self.ensure_open()?;
        if level > self.max_mipmap_level() {
            return Err(TextureError::MipmapLevelOutOfRange {
                level,
                max: self.max_mipmap_level(),
            });
        }
        for slot in self.mipmaps.iter_mut().skip(level + 1) {
            if let Some(mut image) = slot.take() {
                image.close();
            }
        }
        self.mipmap_level = self.mipmap_level.min(level);
        Ok(())
    }

    /// Copy every retained level of `source` into this frame.
    ///
    /// `source` must retain at least as many levels as this frame.  Layer
    /// history is reset: the copied content becomes the new base.
    pub fn copy_from(&mut self, source: &CloseableImageFrame) -> Result<(), TextureError> {
        self.ensure_open()?;
        let source_level = source.mipmap_level()?;
        if source_level < self.mipmap_level {
            return Err(TextureError::InsufficientMipmaps {
                source: source_level,
                destination: self.mipmap_level,
            });
        }
        for level in 0..=self.mipmap_level {
            let from = source.level(level)?;
            self.level_mut(level)?.copy_from(from)?;
        }
        self.reset_layers()
    }

    /// Forget all layer writes and re-snapshot level 0 as the base.
    fn reset_layers(&mut self) -> Result<(), TextureError> {
        let (width, height) = (self.frame_data.width, self.frame_data.height);
        let mut base = Vec::with_capacity(self.base.len());
        let level0 = self.level(0)?;
        for y in 0..height {
            for x in 0..width {
                base.push(level0.color(x, y)?);
            }
        }
        self.base = base;
        self.layers.iter_mut().for_each(|records| *records = None);
        Ok(())
    }

    /// Evaluate `transform` at every point of `area` and write the results
    /// on `layer`, then re-blend the affected mipmap pixels.
    ///
    /// Nothing is written if any point, or any dependency read, is out of
    /// bounds.  An empty area is a no-op.
    pub fn apply_transform<F>(
        &mut self,
        mut transform: F,
        area: &Area,
        layer: usize,
    ) -> Result<(), TextureError>
    where
        F: FnMut(Point, &Dependencies<'_>) -> Result<u32, TextureError>,
    {
        self.ensure_open()?;
        if layer >= self.layers.len() {
            return Err(TextureError::LayerOutOfRange {
                layer,
                layers: self.layers.len(),
            });
        }
        if area.is_empty() {
            return Ok(());
        }

        let (width, height) = (self.frame_data.width, self.frame_data.height);
        let results = {
            let dependencies = Dependencies { frame: self, layer };
            let mut results = Vec::with_capacity(area.len());
            for point in area {
                if point.x >= width || point.y >= height {
                    return Err(TextureError::OutOfBounds {
                        x: point.x,
                        y: point.y,
                        width,
                        height,
                    });
                }
                results.push((point, transform(point, &dependencies)?));
            }
            results
        };

        for &(point, color) in &results {
            self.write_layer(point, color, layer)?;
        }
        self.reblend(results.into_iter().map(|(point, _)| point).collect())
    }

    fn write_layer(&mut self, point: Point, color: u32, layer: usize) -> Result<(), TextureError> {
        let width = self.frame_data.width as usize;
        let index = point.y as usize * width + point.x as usize;
        let pixels = self.base.len();

        self.sequence += 1;
        let records = self.layers[layer].get_or_insert_with(|| vec![None; pixels]);
        records[index] = Some(LayerWrite {
            color,
            sequence: self.sequence,
        });

        let covered = self.layers[layer + 1..]
            .iter()
            .flatten()
            .any(|records| records[index].is_some());
        if !covered {
            self.level_mut(0)?.set_color(point.x, point.y, color)?;
        }
        Ok(())
    }

    /// Recompute ancestors of `touched` level by level up to the ceiling.
    fn reblend(&mut self, mut touched: Vec<Point>) -> Result<(), TextureError> {
        for level in 1..=self.mipmap_level {
            let (parent_width, parent_height) = {
                let parent = self.level(level - 1)?;
                (parent.width()?, parent.height()?)
            };
            let (width, height) = {
                let image = self.level(level)?;
                (image.width()?, image.height()?)
            };
            if width == 0 || height == 0 {
                break;
            }

            let mut ancestors: Vec<Point> = touched
                .iter()
                .map(|p| p.halved())
                .filter(|p| p.x < width && p.y < height)
                .collect();
            ancestors.sort_unstable_by_key(|p| (p.y, p.x));
            ancestors.dedup();
            if ancestors.is_empty() {
                break;
            }

            for &point in &ancestors {
                let blended = {
                    let parent = self.level(level - 1)?;
                    let sx = point.x * 2;
                    let sy = point.y * 2;
                    let right = (sx + 1).min(parent_width - 1);
                    let bottom = (sy + 1).min(parent_height - 1);
                    color::blend(
                        parent.color(sx, sy)?,
                        parent.color(right, sy)?,
                        parent.color(sx, bottom)?,
                        parent.color(right, bottom)?,
                    )
                };
                self.level_mut(level)?.set_color(point.x, point.y, blended)?;
            }
            touched = ancestors;
        }
        Ok(())
    }

    /// Release every retained level.  Idempotent.
    pub fn close(&mut self) {
        for slot in &mut self.mipmaps {
            if let Some(mut image) = slot.take() {
                image.close();
            }
        }
        self.layers.clear();
        self.base = Vec::new();
        self.closed = true;
    }
}

/// Read access to a frame from inside a transform running on one layer.
pub struct Dependencies<'a> {
    frame: &'a CloseableImageFrame,
    layer: usize,
}

impl Dependencies<'_> {
    /// Most recent colour written at `(x, y)` on the reading layer or below,
    /// or the frame's base colour if none of those layers wrote it.
    pub fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        let FrameData { width, height, .. } = self.frame.frame_data;
        if x >= width || y >= height {
            return Err(TextureError::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        let index = y as usize * width as usize + x as usize;
        let latest = self.frame.layers[..=self.layer]
            .iter()
            .flatten()
            .filter_map(|records| records[index])
            .max_by_key(|write| write.sequence);
        Ok(latest.map_or(self.frame.base[index], |write| write.color))
    }

    /// Level-0 width of the frame being transformed.
    pub fn width(&self) -> u32 {
        self.frame.frame_data.width
    }

    /// Level-0 height of the frame being transformed.
    pub fn height(&self) -> u32 {
        self.frame.frame_data.height
    }

    /// Layer the transform is writing to.
    pub fn layer(&self) -> usize {
        self.layer
    }
}
