//! Staging of pixel uploads and their hand-off to Bevy's [`Assets<Image>`].
//!
//! Pixel buffers never talk to the renderer directly.  `upload` snapshots the
//! buffer into a [`PendingUpload`] addressed to whichever base is currently
//! bound on the shared [`UploadQueue`]; the registry drains the queue once per
//! frame and copies each snapshot into the right mip level with
//! [`write_region`].
//!
//! # Mip layout
//! Prepared images store every mip level back to back, level 0 first, each
//! level `max(1, dim >> k)` texels per side.  This is the layout
//! `Image::texture_descriptor.mip_level_count` describes to wgpu.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use bevy::{
    asset::{Assets, RenderAssetUsages},
    image::{Image, ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor},
    prelude::Handle,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

use crate::{base::TextureLocation, error::TextureError};

/// Snapshot of one pixel buffer waiting to be written to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpload {
    /// Base that was bound when the upload was issued.
    pub target: Option<TextureLocation>,
    /// Mip level the pixels belong to.
    pub level: usize,
    /// Left edge within that level.
    pub x: u32,
    /// Top edge within that level.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major packed colours, `width * height` entries.
    pub pixels: Vec<u32>,
}

#[derive(Debug, Default)]
struct QueueState {
    bound: Option<TextureLocation>,
    pending: Vec<PendingUpload>,
}

/// Shared single-threaded upload queue.  Clones refer to the same queue.
#[derive(Clone, Debug, Default)]
pub struct UploadQueue {
    state: Rc<RefCell<QueueState>>,
}

impl UploadQueue {
    /// Empty, unbound queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address subsequent uploads to `target`.
    pub fn bind(&self, target: TextureLocation) {
        self.state.borrow_mut().bound = Some(target);
    }

    /// Stop addressing uploads to any base.
    pub fn unbind(&self) {
        self.state.borrow_mut().bound = None;
    }

    /// Base currently receiving uploads.
    pub fn bound(&self) -> Option<TextureLocation> {
        self.state.borrow().bound.clone()
    }

    /// Queue a snapshot for the currently bound base.
    pub(crate) fn push(&self, level: usize, x: u32, y: u32, width: u32, height: u32, pixels: Vec<u32>) {
        let mut state = self.state.borrow_mut();
        let target = state.bound.clone();
        state.pending.push(PendingUpload {
            target,
            level,
            x,
            y,
            width,
            height,
            pixels,
        });
    }

    /// Number of staged uploads.
    pub fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    /// Take every pending upload, oldest first.
    pub fn drain(&self) -> Vec<PendingUpload> {
        std::mem::take(&mut self.state.borrow_mut().pending)
    }
}

/// Allocates host-side storage for a texture and its mipmap chain.
///
/// Called once per texture before its first upload.
pub trait TexturePreparer {
    fn prepare(
        &mut self,
        location: &TextureLocation,
        mipmap_level: usize,
        width: u32,
        height: u32,
    ) -> Result<(), TextureError>;
}

/// [`TexturePreparer`] that allocates blank mipmapped images in [`Assets<Image>`].
pub struct AssetPreparer<'a> {
    /// Where new images are added.
    pub images: &'a mut Assets<Image>,
    /// Receives the handle of each prepared location.
    pub handles: &'a mut HashMap<TextureLocation, Handle<Image>>,
}

impl TexturePreparer for AssetPreparer<'_> {
    fn prepare(
        &mut self,
        location: &TextureLocation,
        mipmap_level: usize,
        width: u32,
        height: u32,
    ) -> Result<(), TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimension { width, height });
        }
        let handle = self.images.add(mipmapped_image(width, height, mipmap_level));
        // Replacing the handle drops the previous allocation.
        self.handles.insert(location.clone(), handle);
        Ok(())
    }
}

/// Dimensions of mip level `level` for a `width × height` image.
#[inline]
pub fn level_extent(width: u32, height: u32, level: usize) -> (u32, u32) {
    let shift = level.min(31) as u32;
    ((width >> shift).max(1), (height >> shift).max(1))
}

/// Byte offset of mip level `level` in the concatenated data buffer.
fn level_offset(width: u32, height: u32, level: usize) -> usize {
    (0..level)
        .map(|k| {
            let (w, h) = level_extent(width, height, k);
            w as usize * h as usize * 4
        })
        .sum()
}

/// Blank RGBA8 image with `mipmap_level + 1` mip levels and a nearest-neighbour
/// clamp-to-edge sampler, so pixel-art frames stay crisp.
pub fn mipmapped_image(width: u32, height: u32, mipmap_level: usize) -> Image {
    let levels = mipmap_level + 1;
    let mut image = Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        vec![0u8; width as usize * height as usize * 4],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    );
    image.data = Some(vec![0u8; level_offset(width, height, levels)]);
    image.texture_descriptor.mip_level_count = levels as u32;
    image.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
        address_mode_u: ImageAddressMode::ClampToEdge,
        address_mode_v: ImageAddressMode::ClampToEdge,
        mag_filter: ImageFilterMode::Nearest,
        min_filter: ImageFilterMode::Nearest,
        mipmap_filter: ImageFilterMode::Nearest,
        ..Default::default()
    });
    image
}

/// Copy `upload` into its mip level of `image`, clipped to that level.
///
/// Returns `false` when nothing could be written (level not allocated or the
/// image has no CPU-side data).
pub fn write_region(image: &mut Image, upload: &PendingUpload) -> bool {
    let levels = image.texture_descriptor.mip_level_count as usize;
    if upload.level >= levels {
        return false;
    }
    let size = image.texture_descriptor.size;
    let (level_width, level_height) = level_extent(size.width, size.height, upload.level);
    let offset = level_offset(size.width, size.height, upload.level);
    let Some(data) = image.data.as_mut() else {
        return false;
    };

    for row in 0..upload.height {
        let y = upload.y as u64 + row as u64;
        if y >= level_height as u64 {
            break;
        }
        for col in 0..upload.width {
            let x = upload.x as u64 + col as u64;
            if x >= level_width as u64 {
                break;
            }
            let src = (row * upload.width + col) as usize;
            let dst = offset + (y as usize * level_width as usize + x as usize) * 4;
            let (Some(pixel), Some(texel)) = (upload.pixels.get(src), data.get_mut(dst..dst + 4))
            else {
                return false;
            };
            texel.copy_from_slice(&pixel.to_le_bytes());
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::pack;

    #[test]
    fn queue_tags_uploads_with_bound_base() {
        let queue = UploadQueue::new();
        queue.push(0, 0, 0, 1, 1, vec![1]);
        queue.bind("atlas".into());
        queue.clone().push(1, 2, 3, 1, 1, vec![2]);
        assert_eq!(queue.len(), 2);

        let uploads = queue.drain();
        assert!(queue.is_empty());
        assert_eq!(uploads[0].target, None);
        assert_eq!(uploads[1].target, Some(TextureLocation::new("atlas")));
        assert_eq!((uploads[1].level, uploads[1].x, uploads[1].y), (1, 2, 3));
    }

    #[test]
    fn prepared_image_holds_every_level() {
        let image = mipmapped_image(8, 4, 2);
        assert_eq!(image.texture_descriptor.mip_level_count, 3);
        // 8×4 + 4×2 + 2×1 texels.
        assert_eq!(image.data.as_ref().map(Vec::len), Some((32 + 8 + 2) * 4));
    }

    #[test]
    fn write_region_targets_the_right_level() {
        let mut image = mipmapped_image(4, 4, 1);
        let upload = PendingUpload {
            target: None,
            level: 1,
            x: 1,
            y: 0,
            width: 2,
            height: 1,
            pixels: vec![pack(10, 20, 30, 40), pack(50, 60, 70, 80)],
        };
        assert!(write_region(&mut image, &upload));

        let data = image.data.as_ref().expect("image data");
        // Level 1 starts after 16 level-0 texels; (1, 0) is its second texel,
        // (2, 0) is clipped away.
        let level1 = 16 * 4;
        assert_eq!(&data[level1 + 4..level1 + 8], &[10, 20, 30, 40]);
        assert!(data[..level1].iter().all(|&b| b == 0), "level 0 untouched");
    }

    #[test]
    fn write_region_rejects_missing_level() {
        let mut image = mipmapped_image(4, 4, 0);
        let upload = PendingUpload {
            target: None,
            level: 1,
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            pixels: vec![0],
        };
        assert!(!write_region(&mut image, &upload));
    }

    #[test]
    fn asset_preparer_rejects_zero_size() {
        let mut images = Assets::<Image>::default();
        let mut handles = HashMap::new();
        let mut preparer = AssetPreparer {
            images: &mut images,
            handles: &mut handles,
        };
        let location = TextureLocation::new("t");
        assert!(preparer.prepare(&location, 0, 0, 4).is_err());
        assert!(preparer.prepare(&location, 2, 16, 16).is_ok());
        assert!(handles.contains_key(&location));
    }
}
