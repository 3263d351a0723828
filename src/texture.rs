//! The event-driven texture state machine.
//!
//! # Lifecycle
//! ```text
//! build() ──► Unregistered ──load()──► Registered ──close()──► Closed
//!                                        │    ▲
//!                                 tick() / upload(base)
//! ```
//! `tick` and `upload` may also run before `load`; nothing but `close` is
//! accepted once closed.
//!
//! # View validity
//! Each callback receives a [`TextureAndFrameView`] stamped with the
//! texture's generation counter.  The counter is bumped when a callback is
//! entered and again when it returns, so a view kept past its callback no
//! longer matches and every method on it fails with
//! [`TextureError::InvalidFrameReference`].

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use crate::{
    area::{Area, Point},
    base::TextureLocation,
    component::TextureComponent,
    error::TextureError,
    frame::{CloseableImageFrame, Dependencies},
    group::FrameGroup,
    upload::TexturePreparer,
};

struct TextureState {
    current: CloseableImageFrame,
    generation: u64,
    /// Bases that received the current content since the last change.
    uploaded: HashSet<TextureLocation>,
    ticks: u64,
}

/// Capability handed to components for the duration of one callback.
#[derive(Clone)]
pub struct TextureAndFrameView {
    state: Rc<RefCell<TextureState>>,
    generation: u64,
    layer: usize,
}

impl std::fmt::Debug for TextureAndFrameView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureAndFrameView")
            .field("generation", &self.generation)
            .field("layer", &self.layer)
            .finish()
    }
}

impl TextureAndFrameView {
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut TextureState) -> Result<R, TextureError>,
    ) -> Result<R, TextureError> {
        // A failed borrow means the view is being used re-entrantly, from
        // inside one of its own transforms.
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| TextureError::InvalidFrameReference)?;
        if state.generation != self.generation {
            return Err(TextureError::InvalidFrameReference);
        }
        f(&mut state)
    }

    /// Width of the current frame.
    pub fn width(&self) -> Result<u32, TextureError> {
        self.with_state(|s| s.current.width())
    }

    /// Height of the current frame.
    pub fn height(&self) -> Result<u32, TextureError> {
        self.with_state(|s| s.current.height())
    }

    /// Composited colour of the current frame.
    pub fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        self.with_state(|s| s.current.color(x, y))
    }

    /// Mipmap ceiling of the current frame.
    pub fn mipmap_level(&self) -> Result<usize, TextureError> {
        self.with_state(|s| s.current.mipmap_level())
    }

    /// Ticks completed so far, including the one in progress.
    pub fn ticks(&self) -> Result<u64, TextureError> {
        self.with_state(|s| Ok(s.ticks))
    }

    /// Compositing layer owned by the component holding this view.
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Run `transform` over `area` on this component's layer.
    ///
    /// The transform must not call back into the view; use the
    /// [`Dependencies`] argument to read the frame.
    pub fn generate_with<F>(&self, transform: F, area: &Area) -> Result<(), TextureError>
    where
        F: FnMut(Point, &Dependencies<'_>) -> Result<u32, TextureError>,
    {
        self.with_state(|s| s.current.apply_transform(transform, area, self.layer))
    }

    /// Request a fresh upload to every base on the next `upload`.
    pub fn mark_needs_upload(&self) -> Result<(), TextureError> {
        self.with_state(|s| {
            s.uploaded.clear();
            Ok(())
        })
    }

    /// Upload the current frame at `(x, y)` down to mip level `level`.
    pub fn upload(&self, x: u32, y: u32, level: usize) -> Result<(), TextureError> {
        self.with_state(|s| s.current.upload_at(x, y, level))
    }

    /// Discard the current frame's mip levels above `level`.
    pub fn lower_mipmap_level(&self, level: usize) -> Result<(), TextureError> {
        self.with_state(|s| s.current.lower_mipmap_level(level))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Unregistered,
    Registered,
    Closed,
}

/// Texture whose content is produced by its attached components.
pub struct EventDrivenTexture {
    components: Vec<Box<dyn TextureComponent>>,
    predefined: Vec<CloseableImageFrame>,
    state: Rc<RefCell<TextureState>>,
    tracks_ticks: bool,
    phase: Phase,
}

impl EventDrivenTexture {
    /// Start assembling a texture.
    pub fn builder() -> EventDrivenTextureBuilder {
        EventDrivenTextureBuilder::default()
    }

    fn ensure_open(&self) -> Result<(), TextureError> {
        if self.phase == Phase::Closed {
            return Err(TextureError::Closed { resource: "texture" });
        }
        Ok(())
    }

    /// Fire `callback` on every component in order, each with a fresh view.
    ///
    /// Stops at the first failing component unless `run_all` is set, in which
    /// case every component runs and the first error is returned afterwards.
    fn dispatch<F>(&mut self, run_all: bool, mut callback: F) -> Result<(), TextureError>
    where
        F: FnMut(
            &mut dyn TextureComponent,
            &TextureAndFrameView,
            &FrameGroup<'_>,
        ) -> Result<(), TextureError>,
    {
        let group = FrameGroup::new(&self.predefined);
        let mut first_error = None;
        for (layer, component) in self.components.iter_mut().enumerate() {
            let generation = {
                let mut state = self.state.borrow_mut();
                state.generation += 1;
                state.generation
            };
            let view = TextureAndFrameView {
                state: Rc::clone(&self.state),
                generation,
                layer,
            };
            let result = callback(component.as_mut(), &view, &group);
            self.state.borrow_mut().generation += 1;
            if let Err(err) = result {
                if !run_all {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Fire `on_registration`, then allocate host storage under `location`.
    ///
    /// Storage is sized for the mipmap ceiling left after registration, so
    /// levels a component discarded are never allocated.
    pub fn load(
        &mut self,
        preparer: &mut dyn TexturePreparer,
        location: &TextureLocation,
    ) -> Result<(), TextureError> {
        self.ensure_open()?;
        if self.phase == Phase::Registered {
            return Err(TextureError::InvalidState {
                reason: "texture is already loaded",
            });
        }
        self.phase = Phase::Registered;
        self.dispatch(false, |component, view, group| {
            component.on_registration(view, group)
        })?;
        let state = self.state.borrow();
        let frame = &state.current;
        preparer.prepare(location, frame.mipmap_level()?, frame.width()?, frame.height()?)
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> Result<(), TextureError> {
        self.ensure_open()?;
        let ticks = {
            let mut state = self.state.borrow_mut();
            state.ticks += 1;
            state.ticks
        };
        self.dispatch(false, |component, view, group| component.on_tick(view, group))?;
        if self.tracks_ticks {
            self.dispatch(false, |component, view, _| component.on_ticks_elapsed(view, ticks))?;
        }
        Ok(())
    }

    /// Fire `on_upload` for `base` unless `base` already holds the current
    /// content.
    pub fn upload(&mut self, base: &TextureLocation) -> Result<(), TextureError> {
        self.ensure_open()?;
        if self.state.borrow().uploaded.contains(base) {
            return Ok(());
        }
        self.dispatch(false, |component, view, _| component.on_upload(view, base))?;
        self.state.borrow_mut().uploaded.insert(base.clone());
        Ok(())
    }

    /// Fire `on_close`, then release every frame.  Idempotent.
    ///
    /// Every component's `on_close` runs and the frames are released even if
    /// a component fails; the first component error is returned afterwards.
    pub fn close(&mut self) -> Result<(), TextureError> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        let result = self.dispatch(true, |component, view, group| component.on_close(view, group));
        self.state.borrow_mut().current.close();
        self.predefined.iter_mut().for_each(CloseableImageFrame::close);
        self.phase = Phase::Closed;
        result
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Whether `load` has succeeded and `close` has not run.
    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Registered
    }

    /// Width and height of the frames.
    pub fn size(&self) -> Result<(u32, u32), TextureError> {
        self.ensure_open()?;
        let state = self.state.borrow();
        Ok((state.current.width()?, state.current.height()?))
    }

    /// Composited colour of the current frame.
    pub fn color(&self, x: u32, y: u32) -> Result<u32, TextureError> {
        self.ensure_open()?;
        self.state.borrow().current.color(x, y)
    }

    /// Read-only access to the predefined frames.
    pub fn predefined_frames(&self) -> FrameGroup<'_> {
        FrameGroup::new(&self.predefined)
    }
}

/// Collects frames and components, then validates them in [`build`](Self::build).
#[derive(Default)]
pub struct EventDrivenTextureBuilder {
    predefined: Vec<CloseableImageFrame>,
    generated: Option<CloseableImageFrame>,
    components: Vec<Box<dyn TextureComponent>>,
    tracks_ticks: bool,
}

impl EventDrivenTextureBuilder {
    /// Append one predefined frame.  Frames are indexed in insertion order.
    pub fn add_frame(mut self, frame: CloseableImageFrame) -> Self {
        self.predefined.push(frame);
        self
    }

    /// Append several predefined frames, keeping their order.
    pub fn add_frames(mut self, frames: impl IntoIterator<Item = CloseableImageFrame>) -> Self {
        self.predefined.extend(frames);
        self
    }

    /// Frame that components draw into and that gets uploaded.
    pub fn set_generated_frame(mut self, frame: CloseableImageFrame) -> Self {
        self.generated = Some(frame);
        self
    }

    /// Attach a component.  The `n`th component attached owns layer `n`.
    pub fn add_component(mut self, component: impl TextureComponent + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    /// Attach already boxed components, in order.
    pub fn add_components(
        mut self,
        components: impl IntoIterator<Item = Box<dyn TextureComponent>>,
    ) -> Self {
        self.components.extend(components);
        self
    }

    /// Fire [`TextureComponent::on_ticks_elapsed`] after every tick.
    pub fn track_ticks(mut self, enabled: bool) -> Self {
        self.tracks_ticks = enabled;
        self
    }

    /// Validate the collected parts.
    ///
    /// Fails unless there is at least one predefined frame and a generated
    /// frame, every frame shares size, mipmap ceiling and layer count, and
    /// there is exactly one component per layer.
    pub fn build(self) -> Result<EventDrivenTexture, TextureError> {
        if self.predefined.is_empty() {
            return Err(TextureError::NoPredefinedFrames);
        }
        let Some(generated) = self.generated else {
            return Err(TextureError::MissingGeneratedFrame);
        };

        let shape = |frame: &CloseableImageFrame| -> Result<(u32, u32, usize, usize), TextureError> {
            Ok((frame.width()?, frame.height()?, frame.mipmap_level()?, frame.layers()))
        };
        let expected = shape(&generated)?;
        for (index, frame) in self.predefined.iter().enumerate() {
            let actual = shape(frame)?;
            if actual != expected {
                return Err(TextureError::InconsistentFrames {
                    reason: format!(
                        "predefined frame {index} is {}×{} with mipmap level {} and {} layers, \
                         generated frame is {}×{} with mipmap level {} and {} layers",
                        actual.0,
                        actual.1,
                        actual.2,
                        actual.3,
                        expected.0,
                        expected.1,
                        expected.2,
                        expected.3
                    ),
                });
            }
        }
        if expected.3 != self.components.len() {
            return Err(TextureError::LayerComponentMismatch {
                layers: expected.3,
                components: self.components.len(),
            });
        }

        Ok(EventDrivenTexture {
            components: self.components,
            predefined: self.predefined,
            state: Rc::new(RefCell::new(TextureState {
                current: generated,
                generation: 0,
                uploaded: HashSet::new(),
                ticks: 0,
            })),
            tracks_ticks: self.tracks_ticks,
            phase: Phase::Unregistered,
        })
    }
}
