use roqplay_core::display::{DisplayDevice, DrawHeader, TextureId, Vertex};
use roqplay_core::input::{Controls, InputDevice};
use roqplay_core::video::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use minifb::{Key, Window, WindowOptions};
use tracing::warn;

/// A minifb window acting as the display device. Texture slots live in
/// host memory; draw submissions are software-composited into the back
/// buffer, which is pushed to the window at end of scene.
pub struct WindowDisplay {
    window: Window,
    textures: HashMap<u32, Vec<u16>>,
    next_texture: u32,
    back_buffer: Vec<u32>,
    controls: Arc<Mutex<Controls>>,
}

impl WindowDisplay {
    pub fn new(title: &str) -> Result<WindowDisplay, minifb::Error> {
        let window = Window::new(
            title,
            DISPLAY_WIDTH,
            DISPLAY_HEIGHT,
            WindowOptions::default(),
        )?;

        Ok(WindowDisplay {
            window,
            textures: HashMap::new(),
            next_texture: 0,
            back_buffer: vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            controls: Arc::new(Mutex::new(Controls::empty())),
        })
    }

    /// Input device backed by this window's key state, sampled once per
    /// scene. Enter or Escape (or closing the window) assert START.
    pub fn input(&self) -> WindowInput {
        WindowInput {
            controls: Arc::clone(&self.controls),
        }
    }

    fn composite(&mut self, header: &DrawHeader, vertices: &[Vertex; 4]) {
        if let Some(texture) = self.textures.get(&header.texture.0) {
            blit_quad(texture, header, vertices, &mut self.back_buffer);
        }
    }
}

/// Software-rasterize one axis-aligned textured quad into the back buffer:
/// upper-left is vertex 0, lower-right is vertex 3, nearest-neighbor
/// sampling. Degenerate textures and off-screen quads draw nothing.
fn blit_quad(texture: &[u16], header: &DrawHeader, vertices: &[Vertex; 4], back_buffer: &mut [u32]) {
    if header.stride == 0 || header.texture_height == 0 {
        return;
    }

    let x0 = vertices[0].x.max(0.0) as usize;
    let y0 = vertices[0].y.max(0.0) as usize;
    let x1 = (vertices[3].x as usize).min(DISPLAY_WIDTH);
    let y1 = (vertices[3].y as usize).min(DISPLAY_HEIGHT);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let quad_width = vertices[3].x - vertices[0].x;
    let quad_height = vertices[3].y - vertices[0].y;
    for y in y0..y1 {
        let v = (y as f32 - vertices[0].y) / quad_height;
        let ty = ((v * header.texture_height as f32) as usize).min(header.texture_height - 1);
        for x in x0..x1 {
            let u = (x as f32 - vertices[0].x) / quad_width;
            let tx = ((u * header.stride as f32) as usize).min(header.stride - 1);
            let pixel = texture[ty * header.stride + tx];
            back_buffer[y * DISPLAY_WIDTH + x] = rgb565_to_xrgb(pixel);
        }
    }
}

impl DisplayDevice for WindowDisplay {
    fn create_texture(&mut self, byte_len: usize) -> Option<TextureId> {
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(texture.0, vec![0u16; byte_len / 2]);
        Some(texture)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture.0);
    }

    fn upload(&mut self, texture: TextureId, pixels: &[u16]) {
        if let Some(slot) = self.textures.get_mut(&texture.0) {
            let len = slot.len().min(pixels.len());
            slot[..len].copy_from_slice(&pixels[..len]);
        }
    }

    fn begin_scene(&mut self) {
        self.back_buffer.fill(0);
    }

    fn draw(&mut self, header: &DrawHeader, vertices: &[Vertex; 4]) {
        self.composite(header, vertices);
    }

    fn end_scene(&mut self) {
        if let Err(e) =
            self.window
                .update_with_buffer(&self.back_buffer, DISPLAY_WIDTH, DISPLAY_HEIGHT)
        {
            warn!("window update failed: {}", e);
        }

        let mut controls = Controls::empty();
        if !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Enter)
        {
            controls |= Controls::START;
        }
        *self.controls.lock().unwrap() = controls;
    }
}

pub struct WindowInput {
    controls: Arc<Mutex<Controls>>,
}

impl InputDevice for WindowInput {
    fn controls(&mut self) -> Controls {
        *self.controls.lock().unwrap()
    }
}

fn rgb565_to_xrgb(pixel: u16) -> u32 {
    let r = ((pixel >> 11) & 0x1F) as u32;
    let g = ((pixel >> 5) & 0x3F) as u32;
    let b = (pixel & 0x1F) as u32;
    ((r << 3 | r >> 2) << 16) | ((g << 2 | g >> 4) << 8) | (b << 3 | b >> 2)
}

#[cfg(test)]
use roqplay_core::display::PixelFormat;

#[cfg(test)]
fn test_header(stride: usize, texture_height: usize) -> DrawHeader {
    DrawHeader {
        texture: TextureId(0),
        format: PixelFormat::Rgb565,
        stride,
        texture_height,
    }
}

#[cfg(test)]
fn test_quad(x1: f32, y1: f32) -> [Vertex; 4] {
    let corner = |x: f32, y: f32, u: f32, v: f32, end_of_list: bool| Vertex {
        x,
        y,
        z: 1.0,
        u,
        v,
        color: 0xFFFF_FFFF,
        end_of_list,
    };
    [
        corner(0.0, 0.0, 0.0, 0.0, false),
        corner(x1, 0.0, 1.0, 0.0, false),
        corner(0.0, y1, 0.0, 1.0, false),
        corner(x1, y1, 1.0, 1.0, true),
    ]
}

#[test]
fn zero_sized_texture_blits_nothing() {
    let mut back_buffer = vec![0u32; DISPLAY_WIDTH * DISPLAY_HEIGHT];

    blit_quad(&[], &test_header(0, 0), &test_quad(640.0, 480.0), &mut back_buffer);
    blit_quad(&[], &test_header(512, 0), &test_quad(640.0, 480.0), &mut back_buffer);

    assert!(back_buffer.iter().all(|pixel| *pixel == 0));
}

#[test]
fn blit_samples_the_texture_across_the_quad() {
    // A 2x2 texture stretched over the full screen: each quadrant of the
    // back buffer comes from one texel. White is 0xFFFF in RGB565.
    let texture = [0xFFFFu16, 0x0000, 0x0000, 0xFFFF];
    let mut back_buffer = vec![0u32; DISPLAY_WIDTH * DISPLAY_HEIGHT];

    blit_quad(
        &texture,
        &test_header(2, 2),
        &test_quad(DISPLAY_WIDTH as f32, DISPLAY_HEIGHT as f32),
        &mut back_buffer,
    );

    assert_eq!(back_buffer[0], 0x00FF_FFFF);
    assert_eq!(back_buffer[DISPLAY_WIDTH - 1], 0);
    assert_eq!(back_buffer[(DISPLAY_HEIGHT - 1) * DISPLAY_WIDTH], 0);
    assert_eq!(back_buffer[DISPLAY_HEIGHT * DISPLAY_WIDTH - 1], 0x00FF_FFFF);
}
