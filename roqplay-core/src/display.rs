/// Handle to a device-resident texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub u32);

/// The one pixel format the presenter produces. There is no format
/// negotiation with the display device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb565,
}

/// Immutable draw descriptor, compiled once per texture slot and reused
/// for every frame presented through that slot.
#[derive(Debug, Clone, Copy)]
pub struct DrawHeader {
    pub texture: TextureId,
    pub format: PixelFormat,
    pub stride: usize,
    pub texture_height: usize,
}

/// One corner of the textured screen quad.
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
    /// Packed ARGB vertex color.
    pub color: u32,
    /// Set on the last vertex of the list.
    pub end_of_list: bool,
}

/// The display hardware boundary: fixed-size texture allocations, whole-slot
/// pixel uploads, and scene-bracketed draw submissions.
pub trait DisplayDevice {
    /// Allocate a texture of `byte_len` bytes, or `None` when device memory
    /// is exhausted.
    fn create_texture(&mut self, byte_len: usize) -> Option<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Upload one full slot of RGB565 pixels into `texture`.
    fn upload(&mut self, texture: TextureId, pixels: &[u16]);

    fn begin_scene(&mut self);

    fn draw(&mut self, header: &DrawHeader, vertices: &[Vertex; 4]);

    fn end_scene(&mut self);
}
