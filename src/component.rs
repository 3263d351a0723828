//! Pluggable behaviour attached to an event-driven texture.

use crate::{
    base::TextureLocation, error::TextureError, group::FrameGroup,
    texture::TextureAndFrameView,
};

/// Callbacks fired by [`EventDrivenTexture`](crate::texture::EventDrivenTexture)
/// at each lifecycle point.  Every method defaults to a no-op.
///
/// Components run strictly in attachment order, and component `i` writes to
/// compositing layer `i` of the current frame.  The `view` argument is only
/// valid until the callback returns; keeping a clone and using it later fails
/// with [`TextureError::InvalidFrameReference`].
pub trait TextureComponent {
    /// Fired once from `load`, after host storage has been prepared.
    fn on_registration(
        &mut self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        let _ = (view, predefined);
        Ok(())
    }

    /// Fired once per tick, in attachment order.
    fn on_tick(
        &mut self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        let _ = (view, predefined);
        Ok(())
    }

    /// Fired after every component's `on_tick` when the texture tracks its
    /// tick count.  `ticks` starts at 1 and grows by one per tick.
    fn on_ticks_elapsed(
        &mut self,
        view: &TextureAndFrameView,
        ticks: u64,
    ) -> Result<(), TextureError> {
        let _ = (view, ticks);
        Ok(())
    }

    /// Fired when the current frame must be pushed to `base`.
    fn on_upload(
        &mut self,
        view: &TextureAndFrameView,
        base: &TextureLocation,
    ) -> Result<(), TextureError> {
        let _ = (view, base);
        Ok(())
    }

    /// Fired once before every frame is released.
    fn on_close(
        &mut self,
        view: &TextureAndFrameView,
        predefined: &FrameGroup<'_>,
    ) -> Result<(), TextureError> {
        let _ = (view, predefined);
        Ok(())
    }
}
