//! Abstraction over a native media decoding handle.
//!
//! A [`MediaElement`] models one reusable decoder: a source binding, a
//! playback clock, and async load/seek completions. The pool is the only
//! component that binds sources or seeks; everything else reaches an element
//! through a [`PreparedHandle`](crate::PreparedHandle).

use std::future::Future;

use crate::error::MediaResult;

pub trait MediaElement: Send + Sync + 'static {
    /// Bind `url` and wait until the element can play, or fails to load.
    fn load(&self, url: String) -> impl Future<Output = MediaResult<()>> + Send;

    /// Pause and drop the bound source.
    fn unload(&self);

    /// Currently bound source, if any.
    fn source(&self) -> Option<String>;

    /// Position of the element's own clock, in seconds.
    fn current_time(&self) -> f64;

    /// Move the clock to `seconds`; resolves when the seek completes.
    /// May never resolve if the decoder hangs.
    fn seek(&self, seconds: f64) -> impl Future<Output = ()> + Send;

    fn is_paused(&self) -> bool;

    fn play(&self) -> MediaResult<()>;

    fn pause(&self);

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);

    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);
}
