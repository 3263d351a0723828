//! Component that pushes the current frame to every resolved destination.

use crate::{
    base::{BaseCollection, TextureLocation},
    component::TextureComponent,
    error::TextureError,
    group::FrameGroup,
    texture::TextureAndFrameView,
};

/// Uploads to the texture itself and/or the atlas sprites it was stitched
/// into, clamping the mipmap chain to the smallest destination ceiling.
#[derive(Clone, Debug)]
pub struct SpriteUploadComponent {
    bases: BaseCollection,
}

impl SpriteUploadComponent {
    /// Upload to every destination in `bases`.
    pub fn new(bases: BaseCollection) -> Self {
        Self { bases }
    }

    /// Destinations this component uploads to.
    pub fn bases(&self) -> &BaseCollection {
        &self.bases
    }
}

impl TextureComponent for SpriteUploadComponent {
    fn on_registration(
        &mut self,
        view: &TextureAndFrameView,
        _: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        if let Some(level) = self.bases.min_mipmap_level() {
            view.lower_mipmap_level(level.min(view.mipmap_level()?))?;
        }
        Ok(())
    }

    fn on_upload(
        &mut self,
        view: &TextureAndFrameView,
        base: &TextureLocation,
    ) -> Result<(), TextureError> {
        let ceiling = view.mipmap_level()?;
        for destination in self.bases.destinations_for(base) {
            view.upload(
                destination.point.x,
                destination.point.y,
                destination.mipmap_level.min(ceiling),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        area::Point,
        base::UploadDestination,
        frame::tests::solid_frame,
        texture::EventDrivenTexture,
        upload::{TexturePreparer, UploadQueue},
    };

    struct NullPreparer;

    impl TexturePreparer for NullPreparer {
        fn prepare(&mut self, _: &TextureLocation, _: usize, _: u32, _: u32) -> Result<(), TextureError> {
            Ok(())
        }
    }

    fn destination(base: &str, x: u32, y: u32, mipmap_level: usize) -> UploadDestination {
        UploadDestination {
            base: base.into(),
            point: Point::new(x, y),
            mipmap_level,
        }
    }

    #[test]
    fn registration_lowers_to_smallest_ceiling_and_upload_targets_base() {
        let queue = UploadQueue::new();
        let bases = BaseCollection::from_destinations(vec![
            destination("self", 0, 0, 3),
            destination("atlas", 16, 8, 1),
        ]);
        let mut texture = EventDrivenTexture::builder()
            .add_frame(solid_frame(8, 8, 4, 1, 0, &queue))
            .set_generated_frame(solid_frame(8, 8, 4, 1, 0, &queue))
            .add_component(SpriteUploadComponent::new(bases))
            .build()
            .expect("valid texture");

        texture.load(&mut NullPreparer, &"self".into()).expect("load");

        let atlas = TextureLocation::new("atlas");
        queue.bind(atlas.clone());
        texture.upload(&atlas).expect("upload");
        let uploads = queue.drain();
        let placed: Vec<_> = uploads.iter().map(|u| (u.level, u.x, u.y)).collect();
        assert_eq!(placed, vec![(0, 16, 8), (1, 8, 4)]);
        assert!(uploads.iter().all(|u| u.target.as_ref() == Some(&atlas)));

        let own = TextureLocation::new("self");
        queue.bind(own.clone());
        texture.upload(&own).expect("upload");
        // Ceiling was lowered to 1, so level 2 and 3 are never uploaded.
        assert_eq!(queue.drain().len(), 2);
    }

    #[test]
    fn unknown_base_uploads_nothing() {
        let queue = UploadQueue::new();
        let bases = BaseCollection::from_destinations(vec![destination("self", 0, 0, 0)]);
        let mut texture = EventDrivenTexture::builder()
            .add_frame(solid_frame(4, 4, 1, 1, 0, &queue))
            .set_generated_frame(solid_frame(4, 4, 1, 1, 0, &queue))
            .add_component(SpriteUploadComponent::new(bases))
            .build()
            .expect("valid texture");
        texture.upload(&"elsewhere".into()).expect("upload");
        assert!(queue.is_empty());
    }
}
