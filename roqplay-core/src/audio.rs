use crate::error::PlaybackError;
use crate::pcm::PcmBuffer;

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::debug;

/// Native sample rate of RoQ audio.
pub const AUDIO_SAMPLE_RATE: u32 = 22_050;

/// Sink-side buffer handshake: the device flips to `NeedBuffer` when it
/// wants another chunk, the pump flips back to `HaveBuffer` once the chunk
/// is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    NeedBuffer,
    HaveBuffer,
}

/// Producer lifecycle as observed by the pump and the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// No pump running: either never started, or exited and acknowledged.
    Null,
    Streaming,
    /// Decoding finished; the pump drains what it can and exits.
    Done,
}

/// Playback parameters handed to the output device when streaming starts.
#[derive(Debug, Clone, Copy)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: usize,
}

/// The physical audio output. `start` is called once, on the first decoded
/// PCM; from then on the device pulls chunks through its `SinkHandle` on
/// its own cadence.
pub trait AudioOutput {
    fn start(&mut self, spec: AudioSpec, handle: SinkHandle) -> Result<(), PlaybackError>;

    /// Called once after the pump has shut down.
    fn stop(&mut self) {}
}

struct AudioState {
    pcm: PcmBuffer,
    decode_status: DecodeStatus,
    buffer_status: BufferStatus,
    requested: usize,
    outgoing: Option<Vec<u8>>,
}

/// Everything shared between the decode thread, the pump thread and the
/// sink device, behind one lock. Every wait is a condvar wait on the same
/// lock, so nobody burns a core and the shutdown handshake cannot stall:
/// setting `Done` wakes all three parties.
pub struct AudioShared {
    state: Mutex<AudioState>,
    cond: Condvar,
}

impl AudioShared {
    pub fn with_capacity(capacity: usize) -> Result<AudioShared, PlaybackError> {
        Ok(AudioShared {
            state: Mutex::new(AudioState {
                pcm: PcmBuffer::with_capacity(capacity)?,
                decode_status: DecodeStatus::Null,
                buffer_status: BufferStatus::HaveBuffer,
                requested: 0,
                outgoing: None,
            }),
            cond: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AudioState> {
        self.state.lock().unwrap()
    }

    /// Producer side: append one frame of decoded PCM and wake the pump.
    pub fn submit(&self, pcm: &[u8]) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        state.pcm.append(pcm)?;
        self.cond.notify_all();
        Ok(())
    }

    pub fn set_streaming(&self) {
        self.lock().decode_status = DecodeStatus::Streaming;
    }

    /// Controller side: signal end of decoding and wake every waiter. Once
    /// the pump has acknowledged with `Null` there is nobody left to act on
    /// `Done`, so the status stays `Null`.
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.decode_status != DecodeStatus::Null {
            state.decode_status = DecodeStatus::Done;
        }
        self.cond.notify_all();
    }

    pub fn decode_status(&self) -> DecodeStatus {
        self.lock().decode_status
    }

    pub fn filled(&self) -> usize {
        self.lock().pcm.filled()
    }

    /// Drop the PCM allocation. Only called once the pump has acknowledged
    /// shutdown, so nothing else can still be reading the buffer.
    pub fn release_pcm(&self) {
        self.lock().pcm.release();
    }
}

/// Capability handed to the audio output device: request fixed-size PCM
/// chunks on the device's own cadence.
#[derive(Clone)]
pub struct SinkHandle {
    shared: Arc<AudioShared>,
}

impl SinkHandle {
    pub fn new(shared: Arc<AudioShared>) -> SinkHandle {
        SinkHandle { shared }
    }

    /// Block until the pump delivers a chunk of exactly `size` bytes.
    /// Returns `None` once the pump has exited; the device should emit
    /// silence from then on.
    pub fn request_chunk(&self, size: usize) -> Option<Vec<u8>> {
        let mut state = self.shared.lock();
        if state.decode_status == DecodeStatus::Null {
            return None;
        }
        state.requested = size;
        state.buffer_status = BufferStatus::NeedBuffer;
        self.shared.cond.notify_all();
        loop {
            if let Some(chunk) = state.outgoing.take() {
                return Some(chunk);
            }
            if state.decode_status == DecodeStatus::Null {
                return None;
            }
            state = self.shared.cond.wait(state).unwrap();
        }
    }
}

/// The consumer worker: waits for sink requests, copies PCM out of the
/// shared buffer in FIFO order, and acknowledges with `HaveBuffer`.
pub struct AudioPump {
    handle: Option<JoinHandle<()>>,
}

impl AudioPump {
    pub fn start(shared: Arc<AudioShared>) -> AudioPump {
        let handle = thread::spawn(move || {
            debug!("audio pump started");
            let started = Instant::now();
            run(&shared);
            debug!(
                "audio pump finished after {} ms",
                started.elapsed().as_millis()
            );
        });
        AudioPump {
            handle: Some(handle),
        }
    }

    /// Wait for the pump to exit. Bounded: the pump wakes on `Done` from
    /// any of its waits, including the wait for a sink request.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(shared: &AudioShared) {
    let mut state = shared.lock();
    loop {
        // Wait for the sink to ask for a buffer. Also wakes on Done, so
        // shutdown never stalls waiting for one more request.
        while state.buffer_status != BufferStatus::NeedBuffer
            && state.decode_status != DecodeStatus::Done
        {
            state = shared.cond.wait(state).unwrap();
        }

        if state.buffer_status == BufferStatus::NeedBuffer {
            // Wait for enough decoded PCM to satisfy the request, unless
            // decoding finishes first.
            while state.pcm.filled() < state.requested
                && state.decode_status != DecodeStatus::Done
            {
                state = shared.cond.wait(state).unwrap();
            }

            if state.pcm.filled() >= state.requested {
                let requested = state.requested;
                let chunk = state.pcm.take_front(requested);
                state.outgoing = Some(chunk);
                state.buffer_status = BufferStatus::HaveBuffer;
                shared.cond.notify_all();
                if state.decode_status == DecodeStatus::Streaming {
                    continue;
                }
            }
        }

        break;
    }

    // Acknowledge shutdown. The controller and any blocked sink request
    // are both watching for this.
    state.decode_status = DecodeStatus::Null;
    shared.cond.notify_all();
}

#[cfg(test)]
fn streaming_shared(capacity: usize) -> Arc<AudioShared> {
    let shared = Arc::new(AudioShared::with_capacity(capacity).unwrap());
    shared.set_streaming();
    shared
}

#[test]
fn chunks_drain_in_submission_order() {
    let shared = streaming_shared(64 * 1024);
    let pump = AudioPump::start(Arc::clone(&shared));
    let handle = SinkHandle::new(Arc::clone(&shared));

    let submitted: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    shared.submit(&submitted[..2000]).unwrap();
    shared.submit(&submitted[2000..]).unwrap();

    let first = handle.request_chunk(1500).unwrap();
    let second = handle.request_chunk(1500).unwrap();
    assert_eq!(first, &submitted[..1500]);
    assert_eq!(second, &submitted[1500..]);
    assert_eq!(shared.filled(), 0);

    shared.finish();
    pump.join();
    assert_eq!(shared.decode_status(), DecodeStatus::Null);
}

#[test]
fn pump_exits_when_done_arrives_with_no_request() {
    let shared = streaming_shared(1024);
    let pump = AudioPump::start(Arc::clone(&shared));

    shared.finish();
    pump.join();
    assert_eq!(shared.decode_status(), DecodeStatus::Null);
}

#[test]
fn short_request_is_abandoned_on_done() {
    let shared = streaming_shared(1024);
    let pump = AudioPump::start(Arc::clone(&shared));
    let handle = SinkHandle::new(Arc::clone(&shared));

    shared.submit(&[1, 2, 3]).unwrap();

    // Ask for more PCM than will ever arrive, then end decoding from
    // another thread. The request must come back empty, not hang.
    let waiter = thread::spawn(move || handle.request_chunk(512));
    shared.finish();

    assert_eq!(waiter.join().unwrap(), None);
    pump.join();
    assert_eq!(shared.decode_status(), DecodeStatus::Null);
}

#[test]
fn request_after_shutdown_returns_none() {
    let shared = streaming_shared(1024);
    let pump = AudioPump::start(Arc::clone(&shared));
    let handle = SinkHandle::new(Arc::clone(&shared));

    shared.finish();
    pump.join();

    assert_eq!(handle.request_chunk(16), None);
}

#[test]
fn submit_past_capacity_is_rejected() {
    let shared = streaming_shared(8);
    shared.submit(&[0; 8]).unwrap();

    assert!(matches!(
        shared.submit(&[0; 1]),
        Err(PlaybackError::Overflow { .. })
    ));
    assert_eq!(shared.filled(), 8);
}
