use std::sync::Arc;

use crate::foundation::error::{PatchError, PatchResult};

/// Identity of a bitmap's pixel content (dimensions + bytes), computed once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(pub u64);

/// Immutable premultiplied RGBA8 image.
///
/// Pixel storage is shared, so clones are cheap and never copy pixels. Pipeline stages always
/// produce a fresh `Bitmap` instead of mutating one.
#[derive(Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    rgba8_premul: Arc<Vec<u8>>,
    key: ContentKey,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("key", &self.key)
            .finish()
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.width == other.width
            && self.height == other.height
            && self.rgba8_premul == other.rgba8_premul
    }
}

impl Bitmap {
    /// Wrap premultiplied RGBA8 bytes (row-major, tightly packed).
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> PatchResult<Self> {
        let expected = byte_len(width, height)?;
        if rgba8_premul.len() != expected {
            return Err(PatchError::validation(format!(
                "bitmap expects {expected} bytes for {width}x{height}, got {}",
                rgba8_premul.len()
            )));
        }
        let key = content_key(width, height, &rgba8_premul);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
            key,
        })
    }

    /// Build from a straight-alpha `image` buffer.
    pub fn from_rgba_image(img: image::RgbaImage) -> PatchResult<Self> {
        let (width, height) = img.dimensions();
        let mut raw = img.into_raw();
        premultiply_rgba8_in_place(&mut raw);
        Self::from_premul(width, height, raw)
    }

    /// Solid fill, mostly useful for fixtures and placeholders.
    pub fn solid(width: u32, height: u32, premul: [u8; 4]) -> PatchResult<Self> {
        let len = byte_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..(len / 4) {
            data.extend_from_slice(&premul);
        }
        Self::from_premul(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn key(&self) -> ContentKey {
        self.key
    }

    /// Premultiplied RGBA8 bytes.
    pub fn as_premul(&self) -> &[u8] {
        self.rgba8_premul.as_slice()
    }

    /// Premultiplied pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8_premul[idx..idx + 4];
        [p[0], p[1], p[2], p[3]]
    }

    /// Premultiplied pixels as an `image` buffer, for resampling.
    pub(crate) fn to_premul_image(&self) -> PatchResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba8_premul.to_vec())
            .ok_or_else(|| PatchError::validation("bitmap buffer does not match its dimensions"))
    }

    /// Straight-alpha copy for encoding.
    pub fn to_rgba_image(&self) -> PatchResult<image::RgbaImage> {
        let mut raw = self.rgba8_premul.to_vec();
        unpremultiply_rgba8_in_place(&mut raw);
        image::RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| PatchError::validation("bitmap buffer does not match its dimensions"))
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> PatchResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| PatchError::validation("bitmap buffer size overflow"))
}

fn content_key(width: u32, height: u32, bytes: &[u8]) -> ContentKey {
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    hasher.update(&width.to_le_bytes());
    hasher.update(&height.to_le_bytes());
    hasher.update(bytes);
    ContentKey(hasher.digest())
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in px.iter_mut().take(3) {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Pull colour channels back under alpha after filtering with negative lobes.
pub(crate) fn clamp_premul_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        px[0] = px[0].min(a);
        px[1] = px[1].min(a);
        px[2] = px[2].min(a);
    }
}
