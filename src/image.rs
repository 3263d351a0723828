//! Closeable pixel buffers.
//!
//! [`CloseableImage`] is the primitive every frame is built from: a 2-D grid
//! of packed colours that can be read, written, uploaded and sliced into
//! sub-views.  Once closed, every operation fails with
//! [`TextureError::Closed`].
//!
//! [`MemoryImage`] is the in-memory implementation.  Sub-views share the
//! parent's storage; closing the parent closes every view onto it, while
//! closing a view leaves the parent alone.

use std::{cell::RefCell, rc::Rc};

use crate::{area::Point, error::TextureError, upload::UploadQueue};

/// A packed-RGBA pixel buffer with an explicit release point.
pub trait CloseableImage {
    /// Colour at `(x, y)`.  Fails outside the buffer or once closed.
    fn color(&self, x: u32, y: u32) -> Result<u32, TextureError>;

    /// Overwrite the colour at `(x, y)`.  Fails outside the buffer or once
    /// closed.
    fn set_color(&mut self, x: u32, y: u32, color: u32) -> Result<(), TextureError>;

    /// Width in pixels.
    fn width(&self) -> Result<u32, TextureError>;

    /// Height in pixels.
    fn height(&self) -> Result<u32, TextureError>;

    /// Push the whole buffer to the host at `(x, y)` of mip level `level`.
    fn upload(&self, x: u32, y: u32, level: usize) -> Result<(), TextureError>;

    /// View of the `width × height` region at `(x, y)`.  The region must lie
    /// entirely inside this buffer.
    fn sub_image(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn CloseableImage>, TextureError>;

    /// Release the buffer.  Idempotent.
    fn close(&mut self);

    /// Whether this buffer, or the storage it views, has been closed.
    fn is_closed(&self) -> bool;

    /// Copy `source` over the intersection of both buffers' extents.
    ///
    /// Pixels outside `min(widths) × min(heights)` keep their values, so
    /// mipmaps of differing size are never zero-filled by a copy.
    fn copy_from(&mut self, source: &dyn CloseableImage) -> Result<(), TextureError> {
        let width = self.width()?.min(source.width()?);
        let height = self.height()?.min(source.height()?);
        for y in 0..height {
            for x in 0..width {
                self.set_color(x, y, source.color(x, y)?)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Storage {
    width: u32,
    pixels: Vec<u32>,
    closed: bool,
}

/// Heap-backed [`CloseableImage`].
#[derive(Debug)]
pub struct MemoryImage {
    storage: Rc<RefCell<Storage>>,
    origin: Point,
    width: u32,
    height: u32,
    /// Root buffers own the storage; closing one releases it for every view.
    root: bool,
    closed: bool,
    queue: UploadQueue,
}

impl MemoryImage {
    /// Transparent-black buffer whose uploads go to `queue`.
    pub fn new(width: u32, height: u32, queue: UploadQueue) -> Self {
        Self::filled(width, height, 0, queue)
    }

    /// Buffer over existing row-major pixels.
    ///
    /// Fails with [`TextureError::InvalidArgument`] unless
    /// `pixels.len() == width * height`.
    pub fn from_pixels(
        width: u32,
        height: u32,
        pixels: Vec<u32>,
        queue: UploadQueue,
    ) -> Result<Self, TextureError> {
        if pixels.len() != width as usize * height as usize {
            return Err(TextureError::invalid_argument(format!(
                "{} pixels supplied for a {width}×{height} buffer",
                pixels.len()
            )));
        }
        Ok(Self::root(width, height, pixels, queue))
    }

    /// Buffer whose every pixel is `color`.
    pub fn filled(width: u32, height: u32, color: u32, queue: UploadQueue) -> Self {
        Self::root(width, height, vec![color; width as usize * height as usize], queue)
    }

    fn root(width: u32, height: u32, pixels: Vec<u32>, queue: UploadQueue) -> Self {
        Self {
            storage: Rc::new(RefCell::new(Storage {
                width,
                pixels,
                closed: false,
            })),
            origin: Point::default(),
            width,
            height,
            root: true,
            closed: false,
            queue,
        }
    }

    fn ensure_open(&self) -> Result<(), TextureError> {
        if self.closed || self.storage.borrow().closed {
            return Err(TextureError::Closed {
                resource: "pixel buffer",
            });
        }
        Ok(())
    }

    /// Index into the shared storage for a local coordinate.
    fn index(&self, x: u32, y: u32) -> Result<usize, TextureError> {
        self.ensure_open()?;
        if x >= self.width || y >= self.height {
            return Err(TextureError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let stride = self.storage.borrow().width as usize;
        Ok((self.origin.y + y) as usize * stride + (self.origin.x + x) as usize)
    }

    /// Row-major copy of this view's pixels.
    pub fn pixels(&self) -> Result<Vec<u32>, TextureError> {
        self.ensure_open()?;
        let storage = self.storage.borrow();
        let stride = storage.width as usize;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height as usize {
            let start = (self.origin.y as usize + y) * stride + self.origin.x as usize;
            out.extend_from_slice(&storage.pixels[start..start + self.width as usize]);
        }
        Ok(out)
    }
}

impl CloseableImage for MemoryImage {
    fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        let index = self.index(x, y)?;
        Ok(self.storage.borrow().pixels[index])
    }

    fn set_color(&mut self, x: u32, y: u32, color: u32) -> Result<(), TextureError> {
        let index = self.index(x, y)?;
        self.storage.borrow_mut().pixels[index] = color;
        Ok(())
    }

    fn width(&self) -> Result<u32, TextureError> {
        self.ensure_open()?;
        Ok(self.width)
    }

    fn height(&self) -> Result<u32, TextureError> {
        self.ensure_open()?;
        Ok(self.height)
    }

    fn upload(&self, x: u32, y: u32, level: usize) -> Result<(), TextureError> {
        let pixels = self.pixels()?;
        self.queue.push(level, x, y, self.width, self.height, pixels);
        Ok(())
    }

    fn sub_image(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn CloseableImage>, TextureError> {
        self.ensure_open()?;
        let fits = x.checked_add(width).is_some_and(|right| right <= self.width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits {
            return Err(TextureError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                parent_width: self.width,
                parent_height: self.height,
            });
        }
        Ok(Box::new(MemoryImage {
            storage: Rc::clone(&self.storage),
            origin: Point::new(self.origin.x + x, self.origin.y + y),
            width,
            height,
            root: false,
            closed: false,
            queue: self.queue.clone(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
        if self.root {
            let mut storage = self.storage.borrow_mut();
            storage.closed = true;
            storage.pixels = Vec::new();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed || self.storage.borrow().closed
    }
}

impl Drop for MemoryImage {
    fn drop(&mut self) {
        self.close();
    }
}
