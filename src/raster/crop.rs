use image::imageops::{self, FilterType};

use crate::foundation::core::SelectionBox;
use crate::foundation::error::{PatchError, PatchResult};
use crate::raster::bitmap::{Bitmap, clamp_premul_in_place};

/// Longest side of a crop sent for generation unless configured otherwise.
pub const DEFAULT_MAX_DIM: u32 = 1024;

/// Output size for a `width x height` region capped at `max_dim` on the longer side.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim || longest == 0 {
        return (width, height);
    }
    let scale = f64::from(max_dim) / f64::from(longest);
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max_dim);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max_dim);
    (w, h)
}

/// Copy `region` out of `source`, downscaling so the longer side is at most `max_dim`.
///
/// Resampling is done on premultiplied pixels with a Catmull-Rom kernel, which averages over the
/// whole source footprint when shrinking. The result stays lossless RGBA.
#[tracing::instrument(skip(source), fields(src_w = source.width(), src_h = source.height()))]
pub fn extract(source: &Bitmap, region: SelectionBox, max_dim: u32) -> PatchResult<Bitmap> {
    if max_dim == 0 {
        return Err(PatchError::validation("extract max_dim must be > 0"));
    }
    region.validate_within(source.width(), source.height())?;

    let src = source.to_premul_image()?;
    let cropped = imageops::crop_imm(&src, region.x, region.y, region.width, region.height)
        .to_image();

    let (out_w, out_h) = fit_within(region.width, region.height, max_dim);
    let mut out = if (out_w, out_h) == (region.width, region.height) {
        cropped
    } else {
        tracing::debug!(out_w, out_h, "downscaling crop");
        imageops::resize(&cropped, out_w, out_h, FilterType::CatmullRom)
    };
    clamp_premul_in_place(&mut out);

    Bitmap::from_premul(out_w, out_h, out.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Bitmap {
        let img = image::RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        Bitmap::from_rgba_image(img).unwrap()
    }

    #[test]
    fn fit_within_caps_longest_side() {
        assert_eq!(fit_within(300, 300, 1024), (300, 300));
        assert_eq!(fit_within(2048, 2048, 1024), (1024, 1024));
        assert_eq!(fit_within(2000, 1000, 1000), (1000, 500));
    }

    #[test]
    fn small_region_is_copied_exactly() {
        let src = gradient(64, 48);
        let out = extract(&src, SelectionBox::square(10, 5, 20), 1024).unwrap();
        assert_eq!(out.dimensions(), (20, 20));
        for y in 0..20 {
            for x in 0..20 {
                assert_eq!(out.pixel(x, y), src.pixel(x + 10, y + 5));
            }
        }
    }

    #[test]
    fn large_region_is_downscaled_to_max_dim() {
        let src = Bitmap::solid(300, 260, [40, 80, 120, 255]).unwrap();
        let out = extract(&src, SelectionBox::square(20, 10, 240), 100).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
        // Uniform input stays uniform through the filter.
        for px in out.as_premul().chunks_exact(4) {
            assert_eq!(px, &[40, 80, 120, 255]);
        }
    }

    #[test]
    fn out_of_bounds_region_is_rejected() {
        let src = gradient(100, 100);
        assert!(matches!(
            extract(&src, SelectionBox::square(60, 60, 50), 1024),
            Err(PatchError::InvalidRegion(_))
        ));
    }

    #[test]
    fn zero_max_dim_is_rejected() {
        let src = gradient(10, 10);
        assert!(extract(&src, SelectionBox::square(0, 0, 5), 0).is_err());
    }
}
