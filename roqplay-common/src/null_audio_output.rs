use roqplay_core::audio::{AudioOutput, AudioSpec, SinkHandle};
use roqplay_core::error::PlaybackError;

use tracing::debug;

/// An output device that never requests PCM. Useful without audio
/// hardware; the pump still shuts down cleanly because its request wait
/// also wakes on decode completion.
pub struct NullAudioOutput;

impl AudioOutput for NullAudioOutput {
    fn start(&mut self, spec: AudioSpec, _handle: SinkHandle) -> Result<(), PlaybackError> {
        debug!(
            "null audio output: {} channel(s) at {} Hz will not be drained",
            spec.channels, spec.sample_rate
        );
        Ok(())
    }
}
