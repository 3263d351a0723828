//! `bevy_symbios_anim_texture`: event-driven, layered, mipmapped textures for Bevy.
//!
//! # Architecture
//! An [`EventDrivenTexture`] owns a set of predefined frames and one
//! generated frame.  Its behaviour comes entirely from attached
//! [`TextureComponent`]s, which are called back on registration, every tick,
//! every upload and on close.  Each callback receives a short-lived
//! [`TextureAndFrameView`] onto the generated frame; component `i` paints
//! into compositing layer `i` and the frame re-blends every affected mipmap
//! level as it goes.
//!
//! Frames are [`CloseableImageFrame`]s: a mip chain of [`CloseableImage`]
//! pixel buffers plus per-layer overlays.  Uploads are staged on an
//! [`UploadQueue`] and copied into [`bevy::asset::Assets<Image>`] by the
//! [`EventTextureRegistry`] systems that [`EventTexturePlugin`] schedules.
//!
//! Where a texture's content ends up (its own image, or sprites stitched into
//! atlases) is described by a [`BaseCollection`].

pub mod animation;
pub mod area;
pub mod base;
pub mod color;
pub mod component;
pub mod error;
pub mod frame;
pub mod group;
pub mod image;
pub mod registry;
pub mod sprite_upload;
pub mod texture;
pub mod upload;

pub use animation::{AnimationComponent, AnimationConfig, FrameTime};
pub use area::{Area, Point};
pub use base::{BaseCollection, Sprite, SpriteFinder, SpriteMap, TextureLocation};
pub use component::TextureComponent;
pub use error::{ErrorKind, TextureError};
pub use frame::{CloseableImageFrame, Dependencies, FrameData};
pub use group::{FrameGroup, FrameReader};
pub use image::{CloseableImage, MemoryImage};
pub use registry::{EventTextureRegistry, EventTextureSettings};
pub use sprite_upload::SpriteUploadComponent;
pub use texture::{EventDrivenTexture, EventDrivenTextureBuilder, TextureAndFrameView};
pub use upload::{TexturePreparer, UploadQueue};

use bevy::prelude::*;

/// Bevy plugin: owns the texture registry and schedules its systems.
#[derive(Default)]
pub struct EventTexturePlugin {
    /// Tick rate inserted as a resource.
    pub settings: EventTextureSettings,
}

impl Plugin for EventTexturePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.settings.clone())
            .init_non_send_resource::<EventTextureRegistry>()
            .add_systems(
                Update,
                (
                    registry::load_pending_textures,
                    registry::tick_event_textures,
                    registry::upload_event_textures,
                )
                    .chain(),
            );
    }
}
