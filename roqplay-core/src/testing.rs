//! Test doubles for the device boundaries.

use crate::audio::{AudioOutput, AudioSpec, SinkHandle};
use crate::display::{DisplayDevice, DrawHeader, TextureId, Vertex};
use crate::error::PlaybackError;
use crate::input::{Controls, InputDevice};
use crate::time_source::TimeSource;

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Display double that records every device call and can be told to run
/// out of texture memory.
pub struct FakeDisplay {
    next_texture: u32,
    alloc_limit: Option<u32>,
    pub live: Vec<TextureId>,
    pub destroyed: Vec<TextureId>,
    pub uploads: Vec<TextureId>,
    pub draws: Vec<TextureId>,
    pub scenes_begun: u32,
    pub scenes_finished: u32,
}

impl FakeDisplay {
    pub fn new() -> FakeDisplay {
        FakeDisplay {
            next_texture: 0,
            alloc_limit: None,
            live: Vec::new(),
            destroyed: Vec::new(),
            uploads: Vec::new(),
            draws: Vec::new(),
            scenes_begun: 0,
            scenes_finished: 0,
        }
    }

    /// Allocations fail once `limit` textures have been created.
    pub fn failing_after(limit: u32) -> FakeDisplay {
        FakeDisplay {
            alloc_limit: Some(limit),
            ..FakeDisplay::new()
        }
    }
}

impl DisplayDevice for FakeDisplay {
    fn create_texture(&mut self, _byte_len: usize) -> Option<TextureId> {
        if let Some(limit) = self.alloc_limit {
            if self.next_texture >= limit {
                return None;
            }
        }
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.live.push(texture);
        Some(texture)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        assert!(
            self.live.contains(&texture),
            "double free of {:?}",
            texture
        );
        self.live.retain(|live| *live != texture);
        self.destroyed.push(texture);
    }

    fn upload(&mut self, texture: TextureId, _pixels: &[u16]) {
        self.uploads.push(texture);
    }

    fn begin_scene(&mut self) {
        self.scenes_begun += 1;
    }

    fn draw(&mut self, header: &DrawHeader, vertices: &[Vertex; 4]) {
        assert!(vertices[3].end_of_list);
        self.draws.push(header.texture);
    }

    fn end_scene(&mut self) {
        self.scenes_finished += 1;
    }
}

/// Deterministic clock: sleeping advances time instead of waiting.
pub struct FakeTime {
    pub now_ms: Cell<u64>,
    pub slept_ms: Cell<u64>,
}

impl FakeTime {
    pub fn new() -> FakeTime {
        FakeTime {
            now_ms: Cell::new(0),
            slept_ms: Cell::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl TimeSource for FakeTime {
    fn time_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
        self.slept_ms.set(self.slept_ms.get() + ms);
    }
}

/// Output double that never requests PCM.
pub struct NoopOutput;

impl AudioOutput for NoopOutput {
    fn start(&mut self, _spec: AudioSpec, _handle: SinkHandle) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// Output double that drains fixed-size chunks on a worker thread,
/// collecting every byte delivered.
pub struct CollectingOutput {
    chunk_size: usize,
    pub collected: Arc<Mutex<Vec<u8>>>,
    worker: Option<JoinHandle<()>>,
}

impl CollectingOutput {
    pub fn new(chunk_size: usize) -> CollectingOutput {
        CollectingOutput {
            chunk_size,
            collected: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }
}

impl AudioOutput for CollectingOutput {
    fn start(&mut self, _spec: AudioSpec, handle: SinkHandle) -> Result<(), PlaybackError> {
        let collected = Arc::clone(&self.collected);
        let chunk_size = self.chunk_size;
        self.worker = Some(thread::spawn(move || {
            while let Some(chunk) = handle.request_chunk(chunk_size) {
                collected.lock().unwrap().extend_from_slice(&chunk);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Input double that asserts START after a number of polls.
pub struct ScriptedInput {
    press_after: u32,
    polls: u32,
}

impl ScriptedInput {
    pub fn press_start_after(polls: u32) -> ScriptedInput {
        ScriptedInput {
            press_after: polls,
            polls: 0,
        }
    }
}

impl InputDevice for ScriptedInput {
    fn controls(&mut self) -> Controls {
        self.polls += 1;
        if self.polls > self.press_after {
            Controls::START
        } else {
            Controls::empty()
        }
    }
}
