use roqplay_core::audio::{AudioOutput, AudioSpec, SinkHandle};
use roqplay_core::error::PlaybackError;

use roqplay_common::linear_resampler::LinearResampler;

use std::thread;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tracing::{debug, error};

/// Bytes requested from the pump per chunk. Small enough that the producer
/// stays well ahead of the sink.
const CHUNK_BYTES: usize = 8 * 1024;

/// Pulls signed 16-bit little-endian PCM chunks through the sink handle
/// and exposes them as mono f32 samples, downmixing interleaved channels.
struct ChunkSource {
    handle: SinkHandle,
    channels: usize,
    chunk: Vec<u8>,
    offset: usize,
    exhausted: bool,
}

impl ChunkSource {
    fn new(handle: SinkHandle, channels: usize) -> ChunkSource {
        ChunkSource {
            handle,
            channels,
            chunk: Vec::new(),
            offset: 0,
            exhausted: false,
        }
    }
}

impl Iterator for ChunkSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let frame_bytes = 2 * self.channels;
        if self.offset + frame_bytes > self.chunk.len() {
            if self.exhausted {
                return None;
            }
            match self.handle.request_chunk(CHUNK_BYTES) {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.offset = 0;
                }
                None => {
                    // The pump has shut down; silence from here on.
                    self.exhausted = true;
                    return None;
                }
            }
        }

        let mut acc = 0i32;
        for channel in 0..self.channels {
            acc += LittleEndian::read_i16(&self.chunk[self.offset + 2 * channel..]) as i32;
        }
        self.offset += frame_bytes;
        Some(acc as f32 / (self.channels as f32 * 32768.0))
    }
}

/// Streams PCM to the default cpal output device, resampling from the
/// stream rate to whatever the device supports.
pub struct CpalAudioOutput;

impl AudioOutput for CpalAudioOutput {
    fn start(&mut self, spec: AudioSpec, handle: SinkHandle) -> Result<(), PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::AudioDevice("no output device".into()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| PlaybackError::AudioDevice(e.to_string()))?
            .next()
            .ok_or_else(|| PlaybackError::AudioDevice("no supported output config".into()))?
            .with_max_sample_rate();
        let config = supported.config();
        let out_channels = config.channels as usize;
        debug!(
            "audio output: {} Hz, {} channel(s)",
            config.sample_rate.0, out_channels
        );

        let mut resampler = LinearResampler::new(spec.sample_rate, config.sample_rate.0);
        let mut source = ChunkSource::new(handle, spec.channels);

        thread::spawn(move || {
            let err_fn = |err| error!("audio stream error: {}", err);
            let stream = match supported.sample_format() {
                SampleFormat::F32 => device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(out_channels) {
                            let value = resampler.next_sample(&mut source);
                            for out in frame.iter_mut() {
                                *out = value;
                            }
                        }
                    },
                    err_fn,
                ),
                SampleFormat::I16 => device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(out_channels) {
                            let value = (resampler.next_sample(&mut source) * 32768.0) as i16;
                            for out in frame.iter_mut() {
                                *out = value;
                            }
                        }
                    },
                    err_fn,
                ),
                SampleFormat::U16 => device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(out_channels) {
                            let value = ((resampler.next_sample(&mut source) * 32768.0)
                                + 32768.0) as u16;
                            for out in frame.iter_mut() {
                                *out = value;
                            }
                        }
                    },
                    err_fn,
                ),
            };

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        error!("unable to play audio stream: {}", e);
                    } else {
                        // The stream stops when dropped; keep it alive for
                        // the rest of the process.
                        loop {
                            thread::sleep(Duration::from_secs(1));
                        }
                    }
                }
                Err(e) => error!("unable to build audio stream: {}", e),
            }
        });

        Ok(())
    }
}
