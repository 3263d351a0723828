//! Keyframe animation over a texture's predefined frames.
//!
//! The component walks a sequence of `(frame index, duration in ticks)`
//! pairs.  Whenever the sequence advances it redraws the whole frame from the
//! new keyframe; with `interpolate` set it also redraws every intermediate
//! tick as a per-channel linear mix towards the next keyframe.

use crate::{
    area::Area,
    color,
    component::TextureComponent,
    error::TextureError,
    group::FrameGroup,
    texture::TextureAndFrameView,
};

/// One entry of an animation sequence.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameTime {
    /// Index into the predefined frames.
    pub index: usize,
    /// Duration in ticks; falls back to [`AnimationConfig::default_frame_time`].
    #[serde(default)]
    pub time: Option<u32>,
}

/// Configures an [`AnimationComponent`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Playback order.  Empty means every predefined frame in order.
    pub frames: Vec<FrameTime>,
    /// Ticks per keyframe when an entry has no explicit time.
    pub default_frame_time: u32,
    /// Blend towards the next keyframe on intermediate ticks.
    pub interpolate: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            default_frame_time: 1,
            interpolate: false,
        }
    }
}

/// Plays an [`AnimationConfig`] into the texture's current frame.
#[derive(Clone, Debug)]
pub struct AnimationComponent {
    config: AnimationConfig,
    /// Resolved `(index, ticks)` pairs; empty until registration.
    sequence: Vec<(usize, u32)>,
    position: usize,
    ticks_in_frame: u32,
    area: Area,
}

impl AnimationComponent {
    /// Component that will play `config` once registered.
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            sequence: Vec::new(),
            position: 0,
            ticks_in_frame: 0,
            area: Area::new(),
        }
    }

    /// Predefined frame index currently shown.
    pub fn current_frame(&self) -> Option<usize> {
        self.sequence.get(self.position).map(|&(index, _)| index)
    }

    fn resolve(&self, predefined: &FrameGroup<'_>) -> Result<Vec<(usize, u32)>, TextureError> {
        let default = self.config.default_frame_time;
        let sequence: Vec<(usize, u32)> = if self.config.frames.is_empty() {
            (0..predefined.frames()).map(|index| (index, default)).collect()
        } else {
            self.config
                .frames
                .iter()
                .map(|entry| {
                    predefined.frame(entry.index)?;
                    Ok((entry.index, entry.time.unwrap_or(default)))
                })
                .collect::<Result<_, TextureError>>()?
        };
        if let Some(&(index, _)) = sequence.iter().find(|&&(_, time)| time == 0) {
            return Err(TextureError::invalid_argument(format!(
                "animation frame {index} has a duration of zero ticks"
            )));
        }
        Ok(sequence)
    }

    /// Redraw the whole frame from `from`, mixed `step / steps` towards `to`.
    fn draw(
        &self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
        from: usize,
        to: Option<(usize, u32, u32)>,
    ) -> Result<(), TextureError> {
        let from = predefined.frame(from)?;
        let to = to
            .map(|(index, step, steps)| predefined.frame(index).map(|frame| (frame, step, steps)))
            .transpose()?;
        view.generate_with(
            |point, _| {
                let base = from.color(point.x, point.y)?;
                match to {
                    Some((next, step, steps)) => {
                        Ok(color::mix(base, next.color(point.x, point.y)?, step, steps))
                    }
                    None => Ok(base),
                }
            },
            &self.area,
        )?;
        view.mark_needs_upload()
    }
}

impl TextureComponent for AnimationComponent {
    fn on_registration(
        &mut self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        self.sequence = self.resolve(predefined)?;
        self.position = 0;
        self.ticks_in_frame = 0;
        self.area = Area::rect(0, 0, view.width()?, view.height()?);
        match self.current_frame() {
            Some(index) => self.draw(view, predefined, index, None),
            None => Ok(()),
        }
    }

    fn on_tick(
        &mut self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        let len = self.sequence.len();
        if len == 0 {
            return Ok(());
        }
        self.ticks_in_frame += 1;
        let (index, time) = self.sequence[self.position];
        if self.ticks_in_frame >= time {
            self.position = (self.position + 1) % len;
            self.ticks_in_frame = 0;
            let (next, _) = self.sequence[self.position];
            if len > 1 || self.config.interpolate {
                self.draw(view, predefined, next, None)?;
            }
        } else if self.config.interpolate {
            let (next, _) = self.sequence[(self.position + 1) % len];
            self.draw(view, predefined, index, Some((next, self.ticks_in_frame, time)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::TextureLocation,
        color::pack,
        error::ErrorKind,
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

    const RED: u32 = pack(200, 0, 0, 255);
    const GREEN: u32 = pack(0, 200, 0, 255);
    const BLUE: u32 = pack(0, 0, 200, 255);

    fn animated(config: AnimationConfig) -> Result<EventDrivenTexture, TextureError> {
        let queue = UploadQueue::new();
        let mut texture = EventDrivenTexture::builder()
            .add_frames([RED, GREEN, BLUE].map(|c| solid_frame(2, 2, 2, 1, c, &queue)))
            .set_generated_frame(solid_frame(2, 2, 2, 1, 0, &queue))
            .add_component(AnimationComponent::new(config))
            .build()?;
        texture.load(&mut NullPreparer, &"anim".into())?;
        Ok(texture)
    }

    #[test]
    fn plays_every_frame_by_default() {
        let mut texture = animated(AnimationConfig {
            default_frame_time: 2,
            ..AnimationConfig::default()
        })
        .expect("valid animation");
        let mut shown = vec![texture.color(1, 1)];
        for _ in 0..6 {
            texture.tick().expect("tick");
            shown.push(texture.color(1, 1));
        }
        assert_eq!(
            shown,
            [RED, RED, GREEN, GREEN, BLUE, BLUE, RED].map(Ok).to_vec()
        );
    }

    #[test]
    fn follows_explicit_sequence() {
        let mut texture = animated(AnimationConfig {
            frames: vec![
                FrameTime {
                    index: 2,
                    time: Some(1),
                },
                FrameTime {
                    index: 0,
                    time: None,
                },
            ],
            default_frame_time: 3,
            interpolate: false,
        })
        .expect("valid animation");
        assert_eq!(texture.color(0, 0), Ok(BLUE));
        texture.tick().expect("tick");
        assert_eq!(texture.color(0, 0), Ok(RED));
        texture.tick().expect("tick");
        texture.tick().expect("tick");
        assert_eq!(texture.color(0, 0), Ok(RED));
        texture.tick().expect("tick");
        assert_eq!(texture.color(0, 0), Ok(BLUE));
    }

    #[test]
    fn interpolates_between_keyframes() {
        let mut texture = animated(AnimationConfig {
            frames: vec![
                FrameTime {
                    index: 0,
                    time: Some(2),
                },
                FrameTime {
                    index: 1,
                    time: Some(2),
                },
            ],
            default_frame_time: 1,
            interpolate: true,
        })
        .expect("valid animation");
        texture.tick().expect("tick");
        assert_eq!(texture.color(0, 0), Ok(color::mix(RED, GREEN, 1, 2)));
        texture.tick().expect("tick");
        assert_eq!(texture.color(0, 0), Ok(GREEN));
    }

    #[test]
    fn rejects_unknown_frame_and_zero_time() {
        let unknown = animated(AnimationConfig {
            frames: vec![FrameTime {
                index: 3,
                time: None,
            }],
            ..AnimationConfig::default()
        });
        assert_eq!(unknown.err().map(|e| e.kind()), Some(ErrorKind::Bounds));

        let zero = animated(AnimationConfig {
            default_frame_time: 0,
            ..AnimationConfig::default()
        });
        assert_eq!(zero.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AnimationConfig =
            serde_json::from_str(r#"{"frames":[{"index":1,"time":3},{"index":0}],"interpolate":true}"#)
                .expect("valid json");
        assert_eq!(config.default_frame_time, 1);
        assert!(config.interpolate);
        assert_eq!(config.frames[1].time, None);
    }
}
