use roqplay_core::audio::AUDIO_SAMPLE_RATE;
use roqplay_core::engine::{CallbackStatus, DecodeEngine, PlaybackCallbacks};
use roqplay_core::error::PlaybackError;
use roqplay_core::video::TARGET_FRAME_RATE;

use std::f32::consts::TAU;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tracing::info;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const STRIDE: usize = 512;
const TEXTURE_HEIGHT: usize = 256;
const SAMPLES_PER_FRAME: usize = AUDIO_SAMPLE_RATE as usize / TARGET_FRAME_RATE as usize;
const TONE_HZ: f32 = 440.0;

/// Stand-in decode engine: emits a scrolling RGB565 gradient and a sine
/// tone through the same callback surface a bitstream decoder would drive.
pub struct PatternEngine {
    frames: u64,
    phase: f32,
}

impl PatternEngine {
    pub fn new(seconds: u64) -> PatternEngine {
        PatternEngine {
            frames: seconds * TARGET_FRAME_RATE,
            phase: 0.0,
        }
    }

    fn fill_frame(&self, pixels: &mut [u16], frame: u64) {
        let shift = frame as usize;
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let r = (((x + shift) & 0xFF) >> 3) as u16;
                let g = ((y & 0xFF) >> 2) as u16;
                let b = ((((x ^ y) + shift) & 0xFF) >> 3) as u16;
                pixels[y * STRIDE + x] = (r << 11) | (g << 5) | b;
            }
        }
    }

    fn fill_tone(&mut self, pcm: &mut [u8]) {
        let step = TAU * TONE_HZ / AUDIO_SAMPLE_RATE as f32;
        for sample in pcm.chunks_exact_mut(2) {
            let value = (self.phase.sin() * 0.25 * i16::MAX as f32) as i16;
            LittleEndian::write_i16(sample, value);
            self.phase = (self.phase + step) % TAU;
        }
    }
}

impl DecodeEngine for PatternEngine {
    fn play(
        &mut self,
        source: &Path,
        callbacks: &mut dyn PlaybackCallbacks,
    ) -> Result<(), PlaybackError> {
        info!(
            "playing test pattern {} for {} frames",
            source.display(),
            self.frames
        );
        let mut pixels = vec![0u16; STRIDE * TEXTURE_HEIGHT];
        let mut pcm = vec![0u8; SAMPLES_PER_FRAME * 2];

        for frame in 0..self.frames {
            self.fill_tone(&mut pcm);
            if callbacks.audio(&pcm, 1) != CallbackStatus::Success {
                return Err(PlaybackError::Engine(
                    "audio callback aborted playback".into(),
                ));
            }

            self.fill_frame(&mut pixels, frame);
            if callbacks.render(&pixels, WIDTH, HEIGHT, STRIDE, TEXTURE_HEIGHT)
                != CallbackStatus::Success
            {
                return Err(PlaybackError::Engine(
                    "render callback aborted playback".into(),
                ));
            }

            if callbacks.should_stop() {
                break;
            }
        }

        Ok(())
    }
}
