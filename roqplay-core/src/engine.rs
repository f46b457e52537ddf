use crate::error::PlaybackError;

use std::path::Path;

/// Status reported back to the decode engine by the render and audio
/// callbacks. The engine aborts playback on anything but `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Success,
    NoMemory,
    RenderProblem,
}

/// The callback surface a decode engine drives for one playback run.
/// `render` and `audio` are invoked once per decoded video frame and audio
/// frame respectively; `should_stop` is polled once per video frame and is
/// the only cancellation point.
pub trait PlaybackCallbacks {
    fn render(
        &mut self,
        pixels: &[u16],
        width: usize,
        height: usize,
        stride: usize,
        texture_height: usize,
    ) -> CallbackStatus;

    fn audio(&mut self, pcm: &[u8], channels: usize) -> CallbackStatus;

    fn should_stop(&mut self) -> bool;
}

/// An external decoder. It owns bitstream parsing end to end and pushes
/// decoded frames and PCM through the callbacks, synchronously, on the
/// calling thread.
pub trait DecodeEngine {
    fn play(
        &mut self,
        source: &Path,
        callbacks: &mut dyn PlaybackCallbacks,
    ) -> Result<(), PlaybackError>;
}
