use image::imageops::{self, FilterType};

use crate::composite::blend::over_at;
use crate::composite::mask::{DEFAULT_FEATHER_RATIO, FeatherMask};
use crate::foundation::core::SelectionBox;
use crate::foundation::error::{PatchError, PatchResult};
use crate::raster::bitmap::{Bitmap, clamp_premul_in_place};

/// Blend `patch` into `base` over `target` with the default feather band.
pub fn composite(base: &Bitmap, patch: &Bitmap, target: SelectionBox) -> PatchResult<Bitmap> {
    composite_with_ratio(base, patch, target, DEFAULT_FEATHER_RATIO)
}

/// Blend `patch` into `base` over `target`, feathering the patch border.
///
/// The output always has `base`'s dimensions. The patch is masked at its own resolution, then
/// resampled to exactly fill `target`; every pixel outside `target` is copied from `base`
/// unchanged. The result depends only on the three inputs and `feather_ratio`.
#[tracing::instrument(
    skip(base, patch),
    fields(base = ?base.dimensions(), patch = ?patch.dimensions())
)]
pub fn composite_with_ratio(
    base: &Bitmap,
    patch: &Bitmap,
    target: SelectionBox,
    feather_ratio: f32,
) -> PatchResult<Bitmap> {
    target.validate_within(base.width(), base.height())?;
    if patch.width() == 0 || patch.height() == 0 {
        return Err(PatchError::composite("patch has no pixels"));
    }

    let mask = FeatherMask::new(patch.width(), patch.height(), feather_ratio)?;
    let mut masked = patch.as_premul().to_vec();
    mask.apply_premul_in_place(&mut masked)?;

    let placed = if patch.dimensions() == (target.width, target.height) {
        masked
    } else {
        let img = image::RgbaImage::from_raw(patch.width(), patch.height(), masked)
            .ok_or_else(|| PatchError::composite("masked patch buffer size mismatch"))?;
        let mut scaled =
            imageops::resize(&img, target.width, target.height, FilterType::CatmullRom);
        clamp_premul_in_place(&mut scaled);
        scaled.into_raw()
    };

    let mut out = base.as_premul().to_vec();
    over_at(
        &mut out,
        base.dimensions(),
        &placed,
        (target.width, target.height),
        (i64::from(target.x), i64::from(target.y)),
    )?;

    Bitmap::from_premul(base.width(), base.height(), out)
}
