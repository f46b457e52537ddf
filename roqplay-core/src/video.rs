use crate::display::{DisplayDevice, DrawHeader, PixelFormat, TextureId, Vertex};
use crate::error::PlaybackError;
use crate::time_source::TimeSource;

/// Fixed output resolution of the display mode.
pub const DISPLAY_WIDTH: usize = 640;
pub const DISPLAY_HEIGHT: usize = 480;

pub const TARGET_FRAME_RATE: u64 = 30;
pub const FRAME_TIME_MS: u64 = 1000 / TARGET_FRAME_RATE;

/// Packed ARGB for opaque white, applied to every vertex.
const VERTEX_COLOR: u32 = 0xFFFF_FFFF;

/// Double-buffered frame output: one texture slot displays while the other
/// is filled with the next decoded frame, so an upload never tears the
/// picture on screen and never waits on display latency.
pub struct FramePresenter {
    textures: [TextureId; 2],
    headers: [DrawHeader; 2],
    vertices: [Vertex; 4],
    current_slot: usize,
    last_present_ms: u64,
}

impl FramePresenter {
    /// Allocate both texture slots and precompile their draw state. Runs
    /// once, on the first decoded frame, because the slot size depends on
    /// the stream dimensions.
    pub fn new<D, T>(
        display: &mut D,
        time: &T,
        width: usize,
        height: usize,
        stride: usize,
        texture_height: usize,
    ) -> Result<FramePresenter, PlaybackError>
    where
        D: DisplayDevice,
        T: TimeSource,
    {
        let byte_len = stride * texture_height * 2;
        let first = display
            .create_texture(byte_len)
            .ok_or(PlaybackError::RenderProblem("texture allocation failed"))?;
        let second = match display.create_texture(byte_len) {
            Some(texture) => texture,
            None => {
                display.destroy_texture(first);
                return Err(PlaybackError::RenderProblem("texture allocation failed"));
            }
        };
        let textures = [first, second];

        let header = |texture| DrawHeader {
            texture,
            format: PixelFormat::Rgb565,
            stride,
            texture_height,
        };
        let headers = [header(textures[0]), header(textures[1])];

        // Scale the stream to the full output width and center it
        // vertically. The quad spans the whole texture, padding included,
        // so the UVs stay 0..1.
        let ratio = DISPLAY_WIDTH as f32 / width as f32;
        let ul_x = 0.0;
        let ul_y = (DISPLAY_HEIGHT as f32 - ratio * height as f32) / 2.0;
        let br_x = ratio * stride as f32;
        let br_y = ul_y + ratio * texture_height as f32;

        let corner = |x: f32, y: f32, u: f32, v: f32, end_of_list: bool| Vertex {
            x,
            y,
            z: 1.0,
            u,
            v,
            color: VERTEX_COLOR,
            end_of_list,
        };
        let vertices = [
            corner(ul_x, ul_y, 0.0, 0.0, false),
            corner(br_x, ul_y, 1.0, 0.0, false),
            corner(ul_x, br_y, 0.0, 1.0, false),
            corner(br_x, br_y, 1.0, 1.0, true),
        ];

        Ok(FramePresenter {
            textures,
            headers,
            vertices,
            current_slot: 0,
            last_present_ms: time.time_ms(),
        })
    }

    /// Upload `pixels` into the idle slot, hold the 30 Hz cadence, submit
    /// the draw and swap slots.
    pub fn present<D, T>(&mut self, display: &mut D, time: &T, pixels: &[u16])
    where
        D: DisplayDevice,
        T: TimeSource,
    {
        let slot = self.current_slot;
        debug_assert_eq!(
            pixels.len(),
            self.headers[slot].stride * self.headers[slot].texture_height
        );
        display.upload(self.textures[slot], pixels);

        // Sleep off whatever remains of the frame budget. A late frame is
        // presented immediately; there is no catch-up.
        let elapsed = time.time_ms().saturating_sub(self.last_present_ms);
        if elapsed < FRAME_TIME_MS {
            time.sleep_ms(FRAME_TIME_MS - elapsed);
        }
        self.last_present_ms = time.time_ms();

        display.begin_scene();
        display.draw(&self.headers[slot], &self.vertices);
        display.end_scene();

        self.current_slot = 1 - slot;
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Free both texture slots. Consumes the presenter, so release runs at
    /// most once.
    pub fn release<D: DisplayDevice>(self, display: &mut D) {
        let [first, second] = self.textures;
        display.destroy_texture(first);
        display.destroy_texture(second);
    }
}

#[cfg(test)]
use crate::testing::{FakeDisplay, FakeTime};

#[cfg(test)]
fn test_presenter(display: &mut FakeDisplay, time: &FakeTime) -> FramePresenter {
    FramePresenter::new(display, time, 320, 240, 512, 256).unwrap()
}

#[test]
fn slots_alternate_every_present() {
    let mut display = FakeDisplay::new();
    let time = FakeTime::new();
    let mut presenter = test_presenter(&mut display, &time);

    let pixels = vec![0u16; 512 * 256];
    for _ in 0..6 {
        presenter.present(&mut display, &time, &pixels);
    }

    let slots: Vec<u32> = display.draws.iter().map(|texture| texture.0).collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
    assert_eq!(display.uploads, display.draws);

    // Each draw is bracketed by exactly one scene.
    assert_eq!(display.scenes_begun, 6);
    assert_eq!(display.scenes_finished, 6);
}

#[test]
fn pacing_holds_the_target_interval() {
    let mut display = FakeDisplay::new();
    let time = FakeTime::new();
    let mut presenter = test_presenter(&mut display, &time);

    // Zero processing time per frame: every present should sleep a full
    // frame budget.
    let pixels = vec![0u16; 512 * 256];
    let start = time.time_ms();
    for _ in 0..100 {
        presenter.present(&mut display, &time, &pixels);
    }

    assert!(time.time_ms() - start >= 100 * FRAME_TIME_MS);
}

#[test]
fn late_frames_are_not_slept() {
    let mut display = FakeDisplay::new();
    let time = FakeTime::new();
    let mut presenter = test_presenter(&mut display, &time);

    // Simulate a frame that took longer than the budget to decode.
    time.advance(FRAME_TIME_MS * 2);
    let slept_before = time.slept_ms.get();
    let pixels = vec![0u16; 512 * 256];
    presenter.present(&mut display, &time, &pixels);

    assert_eq!(time.slept_ms.get(), slept_before);
}

#[test]
fn failed_slot_allocation_is_a_render_problem() {
    // The second allocation fails; the first slot must be given back.
    let mut display = FakeDisplay::failing_after(1);
    let time = FakeTime::new();

    let result = FramePresenter::new(&mut display, &time, 320, 240, 512, 256);
    assert!(matches!(result, Err(PlaybackError::RenderProblem(_))));
    assert!(display.live.is_empty());
}

#[test]
fn release_frees_both_slots_once() {
    let mut display = FakeDisplay::new();
    let time = FakeTime::new();
    let presenter = test_presenter(&mut display, &time);

    presenter.release(&mut display);
    assert!(display.live.is_empty());
    assert_eq!(display.destroyed.len(), 2);
}

#[test]
fn quad_is_scaled_and_centered_vertically() {
    let mut display = FakeDisplay::new();
    let time = FakeTime::new();
    let presenter = test_presenter(&mut display, &time);

    let [ul, _, _, br] = presenter.vertices;
    assert_eq!(ul.x, 0.0);
    assert_eq!(ul.y, 0.0); // 240 * (640/320) fills the full height
    assert_eq!(br.x, 1024.0); // stride scaled by the ratio
    assert_eq!(br.y, 512.0);
    assert!(br.end_of_list);
}
