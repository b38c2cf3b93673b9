use std::io::Cursor;

use crate::foundation::error::{PatchError, PatchResult};
use crate::raster::bitmap::Bitmap;

/// Decode an encoded image (PNG, JPEG, WebP, ...) into a premultiplied [`Bitmap`].
///
/// Orientation and colour-profile normalization are left to whoever supplies the bytes.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode_bitmap(bytes: &[u8]) -> PatchResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| PatchError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(PatchError::decode("decoded image has no pixels"));
    }
    tracing::debug!(width, height, "decoded bitmap");
    Bitmap::from_rgba_image(rgba)
}

/// Encode as PNG (lossless, alpha preserved).
pub fn encode_png(bitmap: &Bitmap) -> PatchResult<Vec<u8>> {
    let rgba = bitmap.to_rgba_image()?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PatchError::Other(anyhow::Error::new(e).context("encode png")))?;
    Ok(buf)
}
