//! Raw camera frames and the recycled buffers that back them.
//!
//! A frame reader owns a fixed number of buffers. A producer must acquire a
//! buffer before it can deliver a frame, so a slow consumer stalls capture
//! instead of growing a queue. Dropping a [`Frame`] hands its buffer back.

// Pixel math converts between u8 samples and f32 intermediates.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use image::{Rgba, RgbaImage};

use super::Size;

/// Fixed-capacity pool of equally sized byte buffers.
pub struct BufferPool {
    home: Sender<Vec<u8>>,
    free: Receiver<Vec<u8>>,
    capacity: usize,
    buffer_len: usize,
}

impl BufferPool {
    /// Creates a pool holding `capacity` zeroed buffers of `buffer_len` bytes.
    #[must_use]
    pub fn new(capacity: usize, buffer_len: usize) -> Self {
        let capacity = capacity.max(1);
        let (home, free) = bounded(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel has exactly `capacity` slots.
            let _ = home.try_send(vec![0; buffer_len]);
        }
        Self {
            home,
            free,
            capacity,
            buffer_len,
        }
    }

    /// Waits up to `timeout` for a free buffer.
    #[must_use]
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<PooledBuffer> {
        self.free.recv_timeout(timeout).ok().map(|data| self.wrap(data))
    }

    /// Takes a free buffer without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> Option<PooledBuffer> {
        self.free.try_recv().ok().map(|data| self.wrap(data))
    }

    /// Number of buffers not currently lent out.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Total number of buffers.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of each buffer in bytes.
    #[must_use]
    pub const fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    fn wrap(&self, data: Vec<u8>) -> PooledBuffer {
        PooledBuffer {
            data,
            home: self.home.clone(),
        }
    }
}

/// A buffer on loan from a [`BufferPool`]; returned on drop.
pub struct PooledBuffer {
    data: Vec<u8>,
    home: Sender<Vec<u8>>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        let _ = self.home.try_send(data);
    }
}

/// Number of bytes in a planar YUV 4:2:0 image of `size`.
#[must_use]
pub const fn yuv420_len(size: Size) -> usize {
    let luma = size.width as usize * size.height as usize;
    let chroma = size.width.div_ceil(2) as usize * size.height.div_ceil(2) as usize;
    luma + 2 * chroma
}

/// A YUV 4:2:0 frame delivered by a capture device.
pub struct Frame {
    size: Size,
    timestamp: Duration,
    buffer: PooledBuffer,
}

impl Frame {
    /// Wraps a filled buffer. Returns `None` if the buffer is too small for `size`.
    #[must_use]
    pub fn new(size: Size, timestamp: Duration, buffer: PooledBuffer) -> Option<Self> {
        (buffer.len() >= yuv420_len(size)).then_some(Self {
            size,
            timestamp,
            buffer,
        })
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Capture timestamp relative to the start of streaming.
    #[must_use]
    pub const fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Luma plane, `width * height` bytes.
    #[must_use]
    pub fn y_plane(&self) -> &[u8] {
        &self.buffer[..self.luma_len()]
    }

    /// Blue-difference chroma plane.
    #[must_use]
    pub fn u_plane(&self) -> &[u8] {
        let start = self.luma_len();
        &self.buffer[start..start + self.chroma_len()]
    }

    /// Red-difference chroma plane.
    #[must_use]
    pub fn v_plane(&self) -> &[u8] {
        let start = self.luma_len() + self.chroma_len();
        &self.buffer[start..start + self.chroma_len()]
    }

    /// Converts to RGBA using full-range BT.601 coefficients.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        let (y_plane, u_plane, v_plane) = (self.y_plane(), self.u_plane(), self.v_plane());
        let width = self.size.width as usize;
        let chroma_width = self.size.width.div_ceil(2) as usize;

        RgbaImage::from_fn(self.size.width, self.size.height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let luma = f32::from(y_plane[y * width + x]);
            let chroma = (y / 2) * chroma_width + x / 2;
            let u = f32::from(u_plane[chroma]) - 128.0;
            let v = f32::from(v_plane[chroma]) - 128.0;

            let r = luma + 1.402 * v;
            let g = luma - 0.344_136 * u - 0.714_136 * v;
            let b = luma + 1.772 * u;
            Rgba([clamp_u8(r), clamp_u8(g), clamp_u8(b), 255])
        })
    }

    fn luma_len(&self) -> usize {
        self.size.width as usize * self.size.height as usize
    }

    fn chroma_len(&self) -> usize {
        self.size.width.div_ceil(2) as usize * self.size.height.div_ceil(2) as usize
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Encodes an RGBA image as planar YUV 4:2:0 into `out`.
///
/// Chroma is averaged over each 2×2 block. `out` must hold at least
/// [`yuv420_len`] bytes for the image size; returns `false` otherwise.
#[must_use]
pub fn write_yuv420(image: &RgbaImage, out: &mut [u8]) -> bool {
    let size = Size::new(image.width(), image.height());
    if out.len() < yuv420_len(size) {
        return false;
    }

    let width = size.width as usize;
    let luma_len = width * size.height as usize;
    let chroma_width = size.width.div_ceil(2);
    let chroma_height = size.height.div_ceil(2);
    let chroma_len = chroma_width as usize * chroma_height as usize;

    for (x, y, px) in image.enumerate_pixels() {
        let [r, g, b, _] = px.0.map(f32::from);
        out[y as usize * width + x as usize] = clamp_u8(0.299 * r + 0.587 * g + 0.114 * b);
    }

    for cy in 0..chroma_height {
        for cx in 0..chroma_width {
            let (mut u_sum, mut v_sum, mut count) = (0.0f32, 0.0f32, 0.0f32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (x, y) = (cx * 2 + dx, cy * 2 + dy);
                if x >= size.width || y >= size.height {
                    continue;
                }
                let [r, g, b, _] = image.get_pixel(x, y).0.map(f32::from);
                u_sum += -0.168_736 * r - 0.331_264 * g + 0.5 * b;
                v_sum += 0.5 * r - 0.418_688 * g - 0.081_312 * b;
                count += 1.0;
            }
            let index = cy as usize * chroma_width as usize + cx as usize;
            out[luma_len + index] = clamp_u8(u_sum / count + 128.0);
            out[luma_len + chroma_len + index] = clamp_u8(v_sum / count + 128.0);
        }
    }

    true
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
