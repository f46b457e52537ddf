use crate::audio::{
    AudioOutput, AudioPump, AudioShared, AudioSpec, DecodeStatus, SinkHandle, AUDIO_SAMPLE_RATE,
};
use crate::display::DisplayDevice;
use crate::engine::{CallbackStatus, DecodeEngine, PlaybackCallbacks};
use crate::error::PlaybackError;
use crate::input::{Controls, InputDevice};
use crate::pcm::PCM_BUFFER_CAPACITY;
use crate::time_source::TimeSource;
use crate::video::{FramePresenter, FRAME_TIME_MS};

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

/// Per-session knobs. Disabling a callback slot is the equivalent of
/// handing the engine a no-op callback for that feature.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub pcm_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> SessionOptions {
        SessionOptions {
            audio_enabled: true,
            video_enabled: true,
            pcm_capacity: PCM_BUFFER_CAPACITY,
        }
    }
}

struct AudioPlayback {
    shared: Arc<AudioShared>,
    pump: AudioPump,
}

struct PollPacer {
    last_poll_ms: u64,
    window_start_ms: u64,
    frames_in_window: u32,
    frame_count: u64,
}

/// One playback run's worth of state: the shared audio buffer, the texture
/// slots, the pacing clocks and the lifecycle flags. Owning all of it here
/// keeps sessions independent and testable; nothing lives at process scope.
pub struct PlaybackSession<D, A, I, T>
where
    D: DisplayDevice,
    A: AudioOutput,
    I: InputDevice,
    T: TimeSource,
{
    display: D,
    audio_out: A,
    input: I,
    time: T,
    options: SessionOptions,

    audio: Option<AudioPlayback>,
    presenter: Option<FramePresenter>,
    pacer: PollPacer,
    fault: Option<PlaybackError>,
}

impl<D, A, I, T> PlaybackSession<D, A, I, T>
where
    D: DisplayDevice,
    A: AudioOutput,
    I: InputDevice,
    T: TimeSource,
{
    pub fn new(display: D, audio_out: A, input: I, time: T) -> PlaybackSession<D, A, I, T> {
        Self::with_options(display, audio_out, input, time, SessionOptions::default())
    }

    pub fn with_options(
        display: D,
        audio_out: A,
        input: I,
        time: T,
        options: SessionOptions,
    ) -> PlaybackSession<D, A, I, T> {
        let now = time.time_ms();
        PlaybackSession {
            display,
            audio_out,
            input,
            time,
            options,
            audio: None,
            presenter: None,
            pacer: PollPacer {
                last_poll_ms: now,
                window_start_ms: now,
                frames_in_window: 0,
                frame_count: 0,
            },
            fault: None,
        }
    }

    /// Run one playback to completion: drive the engine with this session
    /// as its callback surface, then tear down whatever was initialized.
    /// The result reflects the real outcome, even though the engine itself
    /// only sees the coarse callback status codes.
    pub fn play<E: DecodeEngine>(
        &mut self,
        engine: &mut E,
        source: &Path,
    ) -> Result<(), PlaybackError> {
        let engine_result = engine.play(source, self);
        self.shutdown();
        match self.fault.take() {
            Some(fault) => Err(fault),
            None => engine_result,
        }
    }

    /// Tear down whatever was initialized during playback. Idempotent: a
    /// session that never started audio or video has nothing to release,
    /// and a second call finds everything already taken.
    pub fn shutdown(&mut self) {
        if let Some(audio) = self.audio.take() {
            audio.shared.finish();
            debug!("waiting for audio pump to finish");
            audio.pump.join();
            audio.shared.release_pcm();
            self.audio_out.stop();
        }
        if let Some(presenter) = self.presenter.take() {
            presenter.release(&mut self.display);
            debug!("released both texture slots");
        }
    }

    /// Total video frames observed by the termination poll.
    pub fn frames_polled(&self) -> u64 {
        self.pacer.frame_count
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn push_audio(&mut self, pcm: &[u8], channels: usize) -> Result<(), PlaybackError> {
        if self.audio.is_none() {
            self.audio = Some(self.start_audio(channels)?);
        }
        if let Some(audio) = &self.audio {
            audio.shared.submit(pcm)?;
        }
        Ok(())
    }

    fn start_audio(&mut self, channels: usize) -> Result<AudioPlayback, PlaybackError> {
        let shared = Arc::new(AudioShared::with_capacity(self.options.pcm_capacity)?);
        // Mark the stream live before the device can issue its first
        // request; a request against a Null status would be turned away.
        shared.set_streaming();
        self.audio_out.start(
            AudioSpec {
                sample_rate: AUDIO_SAMPLE_RATE,
                channels,
            },
            SinkHandle::new(Arc::clone(&shared)),
        )?;
        let pump = AudioPump::start(Arc::clone(&shared));
        debug!(
            "audio playback started: {} channel(s) at {} Hz",
            channels, AUDIO_SAMPLE_RATE
        );
        Ok(AudioPlayback { shared, pump })
    }

    fn push_frame(
        &mut self,
        pixels: &[u16],
        width: usize,
        height: usize,
        stride: usize,
        texture_height: usize,
    ) -> Result<(), PlaybackError> {
        if self.presenter.is_none() {
            self.presenter = Some(FramePresenter::new(
                &mut self.display,
                &self.time,
                width,
                height,
                stride,
                texture_height,
            )?);
            debug!(
                "frame presenter initialized: {}x{} (stride {}, texture height {})",
                width, height, stride, texture_height
            );
        }
        if let Some(presenter) = &mut self.presenter {
            presenter.present(&mut self.display, &self.time, pixels);
        }
        Ok(())
    }

    fn poll_should_stop(&mut self) -> bool {
        if let Some(audio) = &self.audio {
            match audio.shared.decode_status() {
                DecodeStatus::Streaming => {}
                // Null here means the pump already acknowledged the Done it
                // saw; either way the audio stream is over.
                DecodeStatus::Done | DecodeStatus::Null => {
                    info!("stopping: audio decode complete");
                    return true;
                }
            }
        }
        if self.input.controls().contains(Controls::START) {
            info!("stopping: start control asserted");
            return true;
        }

        // Pace the poll loop to the video frame rate.
        let elapsed = self
            .time
            .time_ms()
            .saturating_sub(self.pacer.last_poll_ms);
        if elapsed < FRAME_TIME_MS {
            self.time.sleep_ms(FRAME_TIME_MS - elapsed);
        }
        self.pacer.last_poll_ms = self.time.time_ms();

        self.pacer.frame_count += 1;
        self.pacer.frames_in_window += 1;
        let window = self
            .pacer
            .last_poll_ms
            .saturating_sub(self.pacer.window_start_ms);
        if window >= 1000 {
            let fps = self.pacer.frames_in_window as f64 * 1000.0 / window as f64;
            debug!("{:.2} fps over the last {} ms", fps, window);
            self.pacer.frames_in_window = 0;
            self.pacer.window_start_ms = self.pacer.last_poll_ms;
        }

        false
    }

    fn fail(&mut self, fault: PlaybackError) -> CallbackStatus {
        // The engine only understands the coarse status codes; keep the
        // precise error for `play` to return.
        let status = match fault {
            PlaybackError::OutOfMemory | PlaybackError::Overflow { .. } => {
                CallbackStatus::NoMemory
            }
            _ => CallbackStatus::RenderProblem,
        };
        error!("playback failure: {}", fault);
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
        status
    }
}

impl<D, A, I, T> PlaybackCallbacks for PlaybackSession<D, A, I, T>
where
    D: DisplayDevice,
    A: AudioOutput,
    I: InputDevice,
    T: TimeSource,
{
    fn render(
        &mut self,
        pixels: &[u16],
        width: usize,
        height: usize,
        stride: usize,
        texture_height: usize,
    ) -> CallbackStatus {
        if !self.options.video_enabled {
            return CallbackStatus::Success;
        }
        match self.push_frame(pixels, width, height, stride, texture_height) {
            Ok(()) => CallbackStatus::Success,
            Err(fault) => self.fail(fault),
        }
    }

    fn audio(&mut self, pcm: &[u8], channels: usize) -> CallbackStatus {
        if !self.options.audio_enabled {
            return CallbackStatus::Success;
        }
        match self.push_audio(pcm, channels) {
            Ok(()) => CallbackStatus::Success,
            Err(fault) => self.fail(fault),
        }
    }

    fn should_stop(&mut self) -> bool {
        self.poll_should_stop()
    }
}

impl<D, A, I, T> Drop for PlaybackSession<D, A, I, T>
where
    D: DisplayDevice,
    A: AudioOutput,
    I: InputDevice,
    T: TimeSource,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NullInputDevice;
    use crate::testing::{CollectingOutput, FakeDisplay, FakeTime, NoopOutput, ScriptedInput};

    const WIDTH: usize = 320;
    const HEIGHT: usize = 240;
    const STRIDE: usize = 512;
    const TEXTURE_HEIGHT: usize = 256;

    /// Engine double that decodes a fixed number of frames, pushing one
    /// audio frame and one video frame per iteration, honoring the abort
    /// protocol of the callback status codes.
    struct ScriptedEngine {
        frames: u64,
        audio_frame_bytes: usize,
        with_audio: bool,
        submitted: Vec<u8>,
    }

    impl ScriptedEngine {
        fn new(frames: u64, audio_frame_bytes: usize) -> ScriptedEngine {
            ScriptedEngine {
                frames,
                audio_frame_bytes,
                with_audio: audio_frame_bytes > 0,
                submitted: Vec::new(),
            }
        }

        fn video_only(frames: u64) -> ScriptedEngine {
            ScriptedEngine::new(frames, 0)
        }
    }

    impl DecodeEngine for ScriptedEngine {
        fn play(
            &mut self,
            _source: &Path,
            callbacks: &mut dyn PlaybackCallbacks,
        ) -> Result<(), PlaybackError> {
            let pixels = vec![0u16; STRIDE * TEXTURE_HEIGHT];
            for frame in 0..self.frames {
                if self.with_audio {
                    let pcm: Vec<u8> = (0..self.audio_frame_bytes)
                        .map(|i| (frame as usize * 31 + i) as u8)
                        .collect();
                    if callbacks.audio(&pcm, 1) != CallbackStatus::Success {
                        return Err(PlaybackError::Engine(
                            "audio callback aborted playback".into(),
                        ));
                    }
                    self.submitted.extend_from_slice(&pcm);
                }
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

    fn source() -> &'static Path {
        Path::new("movie.roq")
    }

    #[test]
    fn full_run_delivers_audio_in_order_and_frees_everything() {
        let output = CollectingOutput::new(1024);
        let collected = Arc::clone(&output.collected);
        let mut session =
            PlaybackSession::new(FakeDisplay::new(), output, NullInputDevice, FakeTime::new());
        let mut engine = ScriptedEngine::new(10, 1470);

        session.play(&mut engine, source()).unwrap();

        // Whatever the sink managed to drain is an exact prefix of what
        // the engine submitted: FIFO, no loss, no reordering.
        let collected = collected.lock().unwrap().clone();
        assert_eq!(collected.len() % 1024, 0);
        assert_eq!(collected[..], engine.submitted[..collected.len()]);

        // Both texture slots were freed, exactly once each.
        assert!(session.display().live.is_empty());
        assert_eq!(session.display().destroyed.len(), 2);

        // The pump acknowledged shutdown.
        assert!(session.audio.is_none());
    }

    #[test]
    fn frames_pace_at_thirty_hertz() {
        let mut session = PlaybackSession::new(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
        );
        let mut engine = ScriptedEngine::video_only(100);

        session.play(&mut engine, source()).unwrap();

        assert_eq!(session.frames_polled(), 100);
        // Render pacing and poll pacing share one wall clock, so the whole
        // run takes at least the frame budget per frame.
        assert!(session.time.now_ms.get() >= 100 * FRAME_TIME_MS);
    }

    #[test]
    fn fps_window_resets_after_a_second() {
        let mut session = PlaybackSession::new(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
        );
        let mut engine = ScriptedEngine::video_only(40);

        session.play(&mut engine, source()).unwrap();

        // Each poll advances the clock one frame budget, so the window
        // first crosses 1000 ms at poll 31 and restarts counting there.
        let resets_at = 1000 / FRAME_TIME_MS + 1;
        assert_eq!(session.pacer.window_start_ms, resets_at * FRAME_TIME_MS);
        assert_eq!(session.pacer.frames_in_window as u64, 40 - resets_at);
    }

    #[test]
    fn start_control_stops_playback_at_the_poll() {
        let mut session = PlaybackSession::new(
            FakeDisplay::new(),
            NoopOutput,
            ScriptedInput::press_start_after(5),
            FakeTime::new(),
        );
        let mut engine = ScriptedEngine::video_only(1000);

        session.play(&mut engine, source()).unwrap();

        assert!(session.frames_polled() < 1000);
    }

    #[test]
    fn decode_done_stops_playback_at_the_poll() {
        let mut session = PlaybackSession::new(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
        );

        session.push_audio(&[0; 64], 1).unwrap();
        match &session.audio {
            Some(audio) => audio.shared.finish(),
            None => unreachable!(),
        }

        assert!(session.poll_should_stop());
        session.shutdown();
    }

    #[test]
    fn pcm_overflow_surfaces_as_an_error() {
        let options = SessionOptions {
            pcm_capacity: 256,
            ..SessionOptions::default()
        };
        let mut session = PlaybackSession::with_options(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
            options,
        );
        // Nothing drains the 256-byte buffer, so the second audio frame
        // overflows; the engine aborts and play reports the real fault.
        let mut engine = ScriptedEngine::new(10, 200);

        let result = session.play(&mut engine, source());
        assert!(matches!(result, Err(PlaybackError::Overflow { .. })));
    }

    #[test]
    fn teardown_without_resources_is_a_noop() {
        let mut session = PlaybackSession::new(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
        );

        session.shutdown();
        session.shutdown();

        assert!(session.display().destroyed.is_empty());
    }

    #[test]
    fn disabled_audio_slot_ignores_audio_frames() {
        let options = SessionOptions {
            audio_enabled: false,
            ..SessionOptions::default()
        };
        let mut session = PlaybackSession::with_options(
            FakeDisplay::new(),
            NoopOutput,
            NullInputDevice,
            FakeTime::new(),
            options,
        );
        let mut engine = ScriptedEngine::new(3, 1470);

        session.play(&mut engine, source()).unwrap();
        assert!(session.audio.is_none());
    }
}
