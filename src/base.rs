//! Upload destinations: the texture itself and the atlas sprites that show it.
//!
//! A texture is uploaded to one or more *bases*.  Standalone textures upload
//! to themselves at `(0, 0)`; textures stitched into an atlas upload to the
//! atlas at the sprite's upload point.  Each destination carries its own
//! mipmap ceiling, and the smallest ceiling across all destinations decides
//! how many mipmap levels the texture keeps.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::area::Point;

/// Identifier of a texture or atlas, e.g. `"minecraft:block/lava_still"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TextureLocation(Arc<str>);

impl TextureLocation {
    /// Location named `id`.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextureLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TextureLocation {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Pixels of padding a sprite reserves around its content in the atlas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EdgeOffsets {
    /// Horizontal padding on each side.
    pub x: u32,
    /// Vertical padding on each side.
    pub y: u32,
}

/// Placement of a texture inside an atlas, resolved by the host.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sprite {
    /// Atlas the sprite was stitched into.
    pub atlas: TextureLocation,
    /// Top-left pixel of the sprite's content within the atlas.
    pub upload_point: Point,
    /// Highest mipmap level the atlas keeps.
    pub mipmap_level: usize,
    /// Padding around the content; absent means none.
    #[serde(default)]
    pub edge_offsets: EdgeOffsets,
}

/// Looks up where a named texture was placed in an atlas.
pub trait SpriteFinder {
    /// Sprite called `name` in `atlas`, if the atlas holds one.
    fn find(&self, atlas: &TextureLocation, name: &TextureLocation) -> Option<Sprite>;
}

/// [`SpriteFinder`] backed by a map keyed by `(atlas, name)`.
#[derive(Clone, Debug, Default)]
pub struct SpriteMap {
    sprites: HashMap<(TextureLocation, TextureLocation), Sprite>,
}

impl SpriteMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as placed by `sprite`.  Replaces an earlier placement in
    /// the same atlas.
    pub fn insert(&mut self, name: TextureLocation, sprite: Sprite) {
        self.sprites.insert((sprite.atlas.clone(), name), sprite);
    }
}

impl SpriteFinder for SpriteMap {
    fn find(&self, atlas: &TextureLocation, name: &TextureLocation) -> Option<Sprite> {
        self.sprites.get(&(atlas.clone(), name.clone())).cloned()
    }
}

/// One place a frame must be uploaded to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDestination {
    /// Texture or atlas receiving the pixels.
    pub base: TextureLocation,
    /// Level-0 position of the frame's top-left pixel in `base`.
    pub point: Point,
    /// Deepest mipmap level `base` keeps for this destination.
    pub mipmap_level: usize,
}

/// Every destination of one texture, in resolution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaseCollection {
    destinations: Vec<UploadDestination>,
}

impl BaseCollection {
    /// Resolve the destinations of the texture `name`.
    ///
    /// `own_mipmap` registers the texture as its own base (uploaded at the
    /// origin with that ceiling).  Every atlas in `atlases` that holds a
    /// sprite called `name` contributes one more destination.
    pub fn resolve(
        name: &TextureLocation,
        own_mipmap: Option<usize>,
        atlases: &[TextureLocation],
        finder: &dyn SpriteFinder,
    ) -> Self {
        let mut destinations = Vec::new();
        if let Some(mipmap_level) = own_mipmap {
            destinations.push(UploadDestination {
                base: name.clone(),
                point: Point::new(0, 0),
                mipmap_level,
            });
        }
        destinations.extend(atlases.iter().filter_map(|atlas| {
            finder.find(atlas, name).map(|sprite| UploadDestination {
                base: sprite.atlas,
                point: sprite.upload_point,
                mipmap_level: sprite.mipmap_level,
            })
        }));
        Self { destinations }
    }

    /// Collection over already resolved destinations, kept in order.
    pub fn from_destinations(destinations: Vec<UploadDestination>) -> Self {
        Self { destinations }
    }

    /// Smallest mipmap ceiling across every destination.
    pub fn min_mipmap_level(&self) -> Option<usize> {
        self.destinations.iter().map(|d| d.mipmap_level).min()
    }

    /// Destinations that upload into `base`.
    pub fn destinations_for<'a>(
        &'a self,
        base: &'a TextureLocation,
    ) -> impl Iterator<Item = &'a UploadDestination> + 'a {
        self.destinations.iter().filter(move |d| &d.base == base)
    }

    /// Distinct bases, first-seen order.
    pub fn bases(&self) -> Vec<TextureLocation> {
        let mut bases: Vec<TextureLocation> = Vec::new();
        for destination in &self.destinations {
            if !bases.contains(&destination.base) {
                bases.push(destination.base.clone());
            }
        }
        bases
    }

    /// Every destination, in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &UploadDestination> {
        self.destinations.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}
