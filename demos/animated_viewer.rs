//! `animated_viewer`: plays an interpolated four-frame animation in a window.
//!
//! Run with:
//!   cargo run --example animated_viewer

use bevy::prelude::*;
use bevy_symbios_anim_texture::{
    AnimationComponent, AnimationConfig, BaseCollection, CloseableImageFrame, EventDrivenTexture,
    EventTexturePlugin, EventTextureRegistry, EventTextureSettings, FrameData, SpriteMap,
    SpriteUploadComponent, TextureLocation, UploadQueue, color,
};

const TEX_SIZE: u32 = 64;
const MIPMAP_LEVEL: usize = 4;
const FRAMES: u32 = 4;
const DISPLAY_SIZE: f32 = 512.0;
const LOCATION: &str = "demo/ripple";

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "bevy_symbios_anim_texture — viewer".into(),
                resolution: ((DISPLAY_SIZE + 80.0) as u32, (DISPLAY_SIZE + 80.0) as u32).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EventTexturePlugin {
            settings: EventTextureSettings {
                ticks_per_second: 12.0,
                ..default()
            },
        })
        .add_systems(Startup, register_texture)
        .add_systems(Update, show_loaded_texture)
        .run();
}

/// Concentric rings whose phase shifts with `frame`.
fn ripple_frame(frame: u32, queue: &UploadQueue) -> CloseableImageFrame {
    let center = TEX_SIZE as i32 / 2;
    let pixels = (0..TEX_SIZE * TEX_SIZE)
        .map(|i| {
            let (x, y) = ((i % TEX_SIZE) as i32 - center, (i / TEX_SIZE) as i32 - center);
            let ring = ((x * x + y * y) as u32 / 24 + frame) % FRAMES;
            let shade = (ring * 255 / (FRAMES - 1)) as u8;
            color::pack(shade / 4, shade / 2 + 40, shade, 255)
        })
        .collect();
    CloseableImageFrame::with_generated_mipmaps(
        FrameData::new(TEX_SIZE, TEX_SIZE, 0, 0),
        pixels,
        MIPMAP_LEVEL,
        2,
        queue.clone(),
    )
    .expect("ripple frame dimensions are valid")
}

fn register_texture(mut commands: Commands, mut registry: NonSendMut<EventTextureRegistry>) {
    commands.spawn(Camera2d);

    let queue = registry.queue().clone();
    let location = TextureLocation::new(LOCATION);
    let bases = BaseCollection::resolve(&location, Some(MIPMAP_LEVEL), &[], &SpriteMap::new());
    let texture = EventDrivenTexture::builder()
        .add_frames((0..FRAMES).map(|frame| ripple_frame(frame, &queue)))
        .set_generated_frame(ripple_frame(0, &queue))
        .add_component(AnimationComponent::new(AnimationConfig {
            default_frame_time: 6,
            interpolate: true,
            ..default()
        }))
        .add_component(SpriteUploadComponent::new(bases.clone()))
        .build()
        .expect("texture components match the frame layers");
    registry.register(location, texture, bases.bases());
}

fn show_loaded_texture(
    mut commands: Commands,
    registry: NonSend<EventTextureRegistry>,
    mut shown: Local<bool>,
) {
    if *shown {
        return;
    }
    let Some(handle) = registry.handle(&TextureLocation::new(LOCATION)) else {
        return;
    };
    *shown = true;
    commands.spawn((
        Sprite {
            image: handle.clone(),
            custom_size: Some(Vec2::splat(DISPLAY_SIZE)),
            ..default()
        },
        Transform::default(),
    ));
}
