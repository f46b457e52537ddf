use thiserror::Error;

/// Everything that can abort a playback session. There is no retry policy;
/// each of these is terminal for the current session.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("out of memory allocating playback buffers")]
    OutOfMemory,

    #[error("PCM buffer overflow: {filled} bytes buffered + {incoming} incoming exceeds capacity {capacity}")]
    Overflow {
        capacity: usize,
        filled: usize,
        incoming: usize,
    },

    #[error("render problem: {0}")]
    RenderProblem(&'static str),

    #[error("audio device failure: {0}")]
    AudioDevice(String),

    #[error("decode engine failure: {0}")]
    Engine(String),
}
