//! Bevy-side owner of every event-driven texture.
//!
//! Textures hold `Rc` state and boxed components, so the registry lives in
//! the world as a non-send resource and all three systems run on the main
//! thread.  Per frame the schedule is:
//!
//! 1. [`load_pending_textures`] fires the registration hooks of newly
//!    registered textures, then allocates images sized for the mipmap
//!    ceiling those hooks left.
//! 2. [`tick_event_textures`] converts elapsed time into whole ticks at
//!    [`EventTextureSettings::ticks_per_second`].
//! 3. [`upload_event_textures`] asks every live texture to upload to each of
//!    its bases and copies the staged pixels into [`Assets<Image>`].
//!
//! A texture that fails at any stage is logged, closed and dropped; the rest
//! keep running.

use std::collections::HashMap;

use bevy::{
    log::{debug, error, warn},
    prelude::{Assets, Handle, Image, NonSendMut, Res, ResMut, Resource, Time},
};

use crate::{
    base::TextureLocation,
    error::TextureError,
    texture::EventDrivenTexture,
    upload::{AssetPreparer, UploadQueue, write_region},
};

/// Fixed-rate tick configuration.
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EventTextureSettings {
    /// Animation ticks per second of game time.
    pub ticks_per_second: f32,
    /// Upper bound on ticks run in one frame; any further backlog is dropped.
    pub max_ticks_per_frame: u32,
}

impl Default for EventTextureSettings {
    fn default() -> Self {
        Self {
            ticks_per_second: 20.0,
            max_ticks_per_frame: 10,
        }
    }
}

struct RegisteredTexture {
    location: TextureLocation,
    texture: EventDrivenTexture,
    bases: Vec<TextureLocation>,
}

impl RegisteredTexture {
    fn retire(mut self, stage: &str, err: &TextureError) {
        error!("Event texture {} failed to {stage}: {err}", self.location);
        if let Err(close_err) = self.texture.close() {
            error!("Event texture {} failed to close: {close_err}", self.location);
        }
    }
}

/// Pending and live textures plus the images they upload into.
#[derive(Default)]
pub struct EventTextureRegistry {
    queue: UploadQueue,
    pending: Vec<RegisteredTexture>,
    live: Vec<RegisteredTexture>,
    handles: HashMap<TextureLocation, Handle<Image>>,
    accumulator: f32,
}

impl EventTextureRegistry {
    /// Queue shared by every pixel buffer this registry uploads from.
    ///
    /// Buffers backing registered textures must be created with a clone of
    /// this queue, otherwise their uploads never reach an image.
    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    /// Schedule `texture` to be loaded under `location` on the next frame.
    ///
    /// Each frame the texture uploads to every base in `bases`, or to its own
    /// location when `bases` is empty.
    pub fn register(
        &mut self,
        location: TextureLocation,
        texture: EventDrivenTexture,
        bases: impl IntoIterator<Item = TextureLocation>,
    ) {
        let mut bases: Vec<_> = bases.into_iter().collect();
        if bases.is_empty() {
            bases.push(location.clone());
        }
        self.pending.push(RegisteredTexture {
            location,
            texture,
            bases,
        });
    }

    /// Image allocated for `location`, once its texture has loaded.
    pub fn handle(&self, location: &TextureLocation) -> Option<&Handle<Image>> {
        self.handles.get(location)
    }

    /// Make an externally created image (e.g. an atlas) available as a base.
    pub fn insert_handle(&mut self, location: TextureLocation, handle: Handle<Image>) {
        self.handles.insert(location, handle);
    }

    /// Textures registered but not loaded yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Loaded textures still ticking and uploading.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Load every pending texture, allocating its image in `images`.
    pub fn load_pending(&mut self, images: &mut Assets<Image>) {
        let mut preparer = AssetPreparer {
            images,
            handles: &mut self.handles,
        };
        for mut entry in self.pending.drain(..) {
            match entry.texture.load(&mut preparer, &entry.location) {
                Ok(()) => {
                    debug!("Loaded event texture {}", entry.location);
                    self.live.push(entry);
                }
                Err(err) => entry.retire("load", &err),
            }
        }
    }

    /// Add `delta` seconds to the accumulator and return how many ticks are
    /// due.
    pub fn advance(&mut self, delta: f32, settings: &EventTextureSettings) -> u32 {
        if settings.ticks_per_second <= 0.0 {
            return 0;
        }
        let step = settings.ticks_per_second.recip();
        self.accumulator += delta;
        let mut ticks = 0;
        while self.accumulator >= step && ticks < settings.max_ticks_per_frame {
            self.accumulator -= step;
            ticks += 1;
        }
        if ticks == settings.max_ticks_per_frame {
            self.accumulator = self.accumulator.min(step);
        }
        ticks
    }

    /// Tick every live texture once.
    pub fn tick(&mut self) {
        self.retain_live("tick", |entry| entry.texture.tick());
    }

    /// Upload every live texture to its bases and write the staged pixels
    /// into `images`.
    pub fn upload(&mut self, images: &mut Assets<Image>) {
        let queue = self.queue.clone();
        self.retain_live("upload", |entry| {
            for base in &entry.bases {
                queue.bind(base.clone());
                entry.texture.upload(base)?;
            }
            Ok(())
        });
        self.queue.unbind();

        for upload in self.queue.drain() {
            let Some(target) = upload.target.as_ref() else {
                warn!("Dropping upload issued with no bound base");
                continue;
            };
            let Some(handle) = self.handles.get(target) else {
                warn!("Dropping upload to unknown base {target}");
                continue;
            };
            let Some(mut image) = images.get_mut(handle) else {
                warn!("Dropping upload to unloaded base {target}");
                continue;
            };
            if !write_region(&mut image, &upload) {
                warn!(
                    "Upload to {target} at level {} does not fit the image",
                    upload.level
                );
            }
        }
    }

    fn retain_live<F>(&mut self, stage: &str, mut f: F)
    where
        F: FnMut(&mut RegisteredTexture) -> Result<(), TextureError>,
    {
        let mut kept = Vec::with_capacity(self.live.len());
        for mut entry in self.live.drain(..) {
            match f(&mut entry) {
                Ok(()) => kept.push(entry),
                Err(err) => entry.retire(stage, &err),
            }
        }
        self.live = kept;
    }
}

/// Bevy system: loads textures registered since the last frame.
pub fn load_pending_textures(
    mut registry: NonSendMut<EventTextureRegistry>,
    mut images: ResMut<Assets<Image>>,
) {
    if registry.pending_count() > 0 {
        registry.load_pending(&mut images);
    }
}

/// Bevy system: runs the ticks due since the last frame.
pub fn tick_event_textures(
    time: Res<Time>,
    settings: Res<EventTextureSettings>,
    mut registry: NonSendMut<EventTextureRegistry>,
) {
    let ticks = registry.advance(time.delta_secs(), &settings);
    for _ in 0..ticks {
        registry.tick();
    }
}

/// Bevy system: flushes texture content to the GPU-side images.
pub fn upload_event_textures(
    mut registry: NonSendMut<EventTextureRegistry>,
    mut images: ResMut<Assets<Image>>,
) {
    registry.upload(&mut images);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        area::Point,
        base::{BaseCollection, UploadDestination},
        color::pack,
        component::TextureComponent,
        frame::tests::solid_frame,
        group::FrameGroup,
        sprite_upload::SpriteUploadComponent,
        texture::TextureAndFrameView,
    };

    const TEAL: u32 = pack(0, 128, 128, 255);

    fn uploading_texture(queue: &UploadQueue, base: &str) -> EventDrivenTexture {
        let bases = BaseCollection::from_destinations(vec![UploadDestination {
            base: base.into(),
            point: Point::new(0, 0),
            mipmap_level: 1,
        }]);
        EventDrivenTexture::builder()
            .add_frame(solid_frame(4, 4, 2, 1, TEAL, queue))
            .set_generated_frame(solid_frame(4, 4, 2, 1, TEAL, queue))
            .add_component(SpriteUploadComponent::new(bases))
            .build()
            .expect("valid texture")
    }

    struct FailOnTick;

    impl TextureComponent for FailOnTick {
        fn on_tick(
            &mut self,
            _: &TextureAndFrameView,
            _: &FrameGroup<'_>,
        ) -> Result<(), TextureError> {
            Err(TextureError::invalid_argument("boom"))
        }
    }

    #[test]
    fn accumulator_runs_whole_ticks_and_caps_backlog() {
        let settings = EventTextureSettings {
            ticks_per_second: 4.0,
            max_ticks_per_frame: 3,
        };
        let mut registry = EventTextureRegistry::default();
        assert_eq!(registry.advance(0.125, &settings), 0);
        assert_eq!(registry.advance(0.125, &settings), 1);
        assert_eq!(registry.advance(0.5, &settings), 2);
        assert_eq!(registry.advance(100.0, &settings), 3);
        // Backlog beyond the cap is discarded.
        assert_eq!(registry.advance(0.0, &settings), 1);
        assert_eq!(registry.advance(0.0, &settings), 0);
    }

    #[test]
    fn non_positive_rate_never_ticks() {
        let settings = EventTextureSettings {
            ticks_per_second: 0.0,
            ..EventTextureSettings::default()
        };
        let mut registry = EventTextureRegistry::default();
        assert_eq!(registry.advance(10.0, &settings), 0);
    }

    #[test]
    fn load_then_upload_writes_every_level() {
        let mut images = Assets::<Image>::default();
        let mut registry = EventTextureRegistry::default();
        let location = TextureLocation::new("water");
        let texture = uploading_texture(registry.queue(), "water");
        registry.register(location.clone(), texture, []);
        assert_eq!(registry.pending_count(), 1);

        registry.load_pending(&mut images);
        assert_eq!(registry.live_count(), 1);
        let handle = registry.handle(&location).cloned().expect("image allocated");

        registry.upload(&mut images);
        let image = images.get(&handle).expect("image exists");
        assert_eq!(image.texture_descriptor.mip_level_count, 2);
        let data = image.data.as_ref().expect("cpu data");
        // 4x4 level 0 followed by the 2x2 level 1.
        assert_eq!(data.len(), (16 + 4) * 4);
        assert!(data.chunks(4).all(|texel| texel == TEAL.to_le_bytes()));
        assert!(registry.queue().is_empty());
    }

    #[test]
    fn image_is_sized_for_lowered_ceiling() {
        let mut images = Assets::<Image>::default();
        let mut registry = EventTextureRegistry::default();
        let bases = BaseCollection::from_destinations(vec![UploadDestination {
            base: "flat".into(),
            point: Point::new(0, 0),
            mipmap_level: 0,
        }]);
        let texture = EventDrivenTexture::builder()
            .add_frame(solid_frame(4, 4, 3, 1, TEAL, registry.queue()))
            .set_generated_frame(solid_frame(4, 4, 3, 1, TEAL, registry.queue()))
            .add_component(SpriteUploadComponent::new(bases))
            .build()
            .expect("valid texture");
        let location = TextureLocation::new("flat");
        registry.register(location.clone(), texture, []);
        registry.load_pending(&mut images);
        registry.upload(&mut images);

        let handle = registry.handle(&location).cloned().expect("image allocated");
        let image = images.get(&handle).expect("image exists");
        assert_eq!(image.texture_descriptor.mip_level_count, 1);
        let data = image.data.as_ref().expect("cpu data");
        assert_eq!(data.len(), 16 * 4);
        assert!(data.chunks(4).all(|texel| texel == TEAL.to_le_bytes()));
    }

    #[test]
    fn failing_texture_is_dropped() {
        let mut images = Assets::<Image>::default();
        let mut registry = EventTextureRegistry::default();
        let healthy = uploading_texture(registry.queue(), "healthy");
        let broken = EventDrivenTexture::builder()
            .add_frame(solid_frame(2, 2, 1, 1, 0, registry.queue()))
            .set_generated_frame(solid_frame(2, 2, 1, 1, 0, registry.queue()))
            .add_component(FailOnTick)
            .build()
            .expect("valid texture");
        registry.register("healthy".into(), healthy, []);
        registry.register("broken".into(), broken, []);
        registry.load_pending(&mut images);
        assert_eq!(registry.live_count(), 2);

        registry.tick();
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn upload_to_unknown_base_is_skipped() {
        let mut images = Assets::<Image>::default();
        let mut registry = EventTextureRegistry::default();
        let texture = uploading_texture(registry.queue(), "atlas");
        registry.register("sprite".into(), texture, ["atlas".into()]);
        registry.load_pending(&mut images);

        registry.upload(&mut images);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.queue().is_empty());
    }
}
