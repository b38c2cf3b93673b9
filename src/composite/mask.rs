use crate::foundation::error::{PatchError, PatchResult};

/// Fraction of the patch's shorter side used as the feather band.
pub const DEFAULT_FEATHER_RATIO: f32 = 0.15;

/// Per-pixel opacity in `[0, 1]`, row-major.
///
/// Fully opaque inside a central rectangle inset by `feather` on every side. Along each edge band
/// the opacity ramps linearly from 0 at the border to 1 at the inset; in the corners it falls off
/// radially from the inset corner, reaching 0 at distance `feather`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatherMask {
    width: u32,
    height: u32,
    feather: f32,
    alpha: Vec<f32>,
}

impl FeatherMask {
    /// Build a mask for a `width x height` patch with band `ratio * min(width, height)`.
    pub fn new(width: u32, height: u32, ratio: f32) -> PatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(PatchError::composite("feather mask needs a non-empty patch"));
        }
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(PatchError::validation(
                "feather ratio must be finite and >= 0",
            ));
        }
        let feather = ratio * width.min(height) as f32;
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| PatchError::composite("feather mask size overflow"))?;

        let mut alpha = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                alpha.push(falloff(x, y, width, height, feather));
            }
        }
        Ok(Self {
            width,
            height,
            feather,
            alpha,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Band width in patch pixels.
    pub fn feather(&self) -> f32 {
        self.feather
    }

    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.alpha[(y as usize) * (self.width as usize) + (x as usize)]
    }

    pub fn values(&self) -> &[f32] {
        &self.alpha
    }

    /// Scale every channel of a premultiplied RGBA8 buffer by the mask.
    ///
    /// With premultiplied storage this is the same as multiplying the alpha channel and keeping
    /// colour consistent with it.
    pub fn apply_premul_in_place(&self, rgba: &mut [u8]) -> PatchResult<()> {
        if rgba.len() != self.alpha.len() * 4 {
            return Err(PatchError::composite(
                "feather mask and patch buffer sizes differ",
            ));
        }
        for (px, &m) in rgba.chunks_exact_mut(4).zip(&self.alpha) {
            if m >= 1.0 {
                continue;
            }
            let q = ((m * 255.0).round() as i32).clamp(0, 255) as u16;
            for c in px.iter_mut() {
                *c = mul_div255(u16::from(*c), q);
            }
        }
        Ok(())
    }

    /// Grayscale rendering of the mask, for inspection.
    pub fn to_luma8(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([((self.at(x, y) * 255.0).round() as i32).clamp(0, 255) as u8])
        })
    }
}

/// Opacity of pixel `(x, y)`, sampled at the pixel centre.
fn falloff(x: u32, y: u32, width: u32, height: u32, feather: f32) -> f32 {
    if feather <= 0.0 {
        return 1.0;
    }
    let cx = x as f32 + 0.5;
    let cy = y as f32 + 0.5;
    let edge_x = cx.min(width as f32 - cx);
    let edge_y = cy.min(height as f32 - cy);

    // Distance past the inset boundary on each axis; both non-zero only in a corner.
    let ox = (feather - edge_x).max(0.0);
    let oy = (feather - edge_y).max(0.0);
    let d = if oy == 0.0 {
        ox
    } else if ox == 0.0 {
        oy
    } else {
        (ox * ox + oy * oy).sqrt()
    };
    (1.0 - d / feather).clamp(0.0, 1.0)
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
