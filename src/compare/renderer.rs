//! Before/after wipe view.
//!
//! Columns left of the split show the composite ("after"), columns right of it show the base
//! ("before"), with a thin divider at the split whose width scales with the image.

use crate::foundation::error::{PatchError, PatchResult};
use crate::raster::bitmap::{Bitmap, ContentKey, byte_len};

pub const DEFAULT_SPLIT: f32 = 0.5;

pub const DIVIDER_RGBA: [u8; 4] = [255, 255, 255, 255];

/// Wipe position, a fraction of the image width in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompareState {
    split_fraction: f32,
}

impl Default for CompareState {
    fn default() -> Self {
        Self {
            split_fraction: DEFAULT_SPLIT,
        }
    }
}

impl CompareState {
    pub fn new(split_fraction: f32) -> Self {
        let mut s = Self::default();
        s.set_split(split_fraction);
        s
    }

    pub fn split(&self) -> f32 {
        self.split_fraction
    }

    /// Clamp into `[0, 1]`. NaN is ignored.
    pub fn set_split(&mut self, split: f32) {
        if !split.is_nan() {
            self.split_fraction = split.clamp(0.0, 1.0);
        }
    }
}

/// Divider stroke width for an image `width` pixels wide.
pub fn divider_width(width: u32) -> u32 {
    ((width as f32) / 400.0).round().max(1.0) as u32
}

/// Render the wipe view as a new bitmap. Without a composite, the base is returned as is.
pub fn render_compare(base: &Bitmap, composite: Option<&Bitmap>, split: f32) -> PatchResult<Bitmap> {
    let Some(composite) = composite else {
        return Ok(base.clone());
    };
    let mut frame = Vec::new();
    wipe_into(&mut frame, base, composite, split)?;
    Bitmap::from_premul(base.width(), base.height(), frame)
}

fn wipe_into(dst: &mut Vec<u8>, base: &Bitmap, composite: &Bitmap, split: f32) -> PatchResult<()> {
    if base.dimensions() != composite.dimensions() {
        return Err(PatchError::composite(format!(
            "compare expects equal sizes, got {:?} and {:?}",
            base.dimensions(),
            composite.dimensions()
        )));
    }
    if split.is_nan() {
        return Err(PatchError::validation("split fraction must not be NaN"));
    }
    let split = split.clamp(0.0, 1.0);
    let (w, h) = base.dimensions();
    let len = byte_len(w, h)?;
    dst.clear();
    dst.resize(len, 0);

    // Columns whose centre lies left of the edge show the composite.
    let edge = split * w as f32;
    let left_cols = ((edge - 0.5).ceil().max(0.0) as usize).min(w as usize);
    let row_bytes = (w as usize) * 4;
    let split_at = left_cols * 4;

    let b = base.as_premul();
    let c = composite.as_premul();
    for row in 0..(h as usize) {
        let start = row * row_bytes;
        let end = start + row_bytes;
        dst[start..start + split_at].copy_from_slice(&c[start..start + split_at]);
        dst[start + split_at..end].copy_from_slice(&b[start + split_at..end]);
    }

    if split > 0.0 && split < 1.0 {
        let dw = divider_width(w);
        let x0 = ((edge - dw as f32 / 2.0).round().max(0.0) as u32).min(w.saturating_sub(dw));
        for row in 0..(h as usize) {
            for x in x0..(x0 + dw).min(w) {
                let i = row * row_bytes + (x as usize) * 4;
                dst[i..i + 4].copy_from_slice(&DIVIDER_RGBA);
            }
        }
    }
    Ok(())
}

/// Keeps the compare inputs and one output buffer alive across renders.
///
/// Inputs are identified by content key; replacing them with identical content is a no-op, and
/// repeated `render` calls for new split positions never decode or reallocate.
#[derive(Default)]
pub struct CompareRenderer {
    base: Option<Bitmap>,
    composite: Option<Bitmap>,
    frame: Vec<u8>,
    renders: u64,
}

impl CompareRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the cached base changed.
    pub fn set_base(&mut self, base: Bitmap) -> bool {
        if self.base.as_ref().map(Bitmap::key) == Some(base.key()) {
            return false;
        }
        self.base = Some(base);
        true
    }

    /// Returns `true` when the cached composite changed.
    pub fn set_composite(&mut self, composite: Option<Bitmap>) -> bool {
        let old = self.composite.as_ref().map(Bitmap::key);
        let new = composite.as_ref().map(Bitmap::key);
        if old == new {
            return false;
        }
        self.composite = composite;
        true
    }

    pub fn keys(&self) -> (Option<ContentKey>, Option<ContentKey>) {
        (
            self.base.as_ref().map(Bitmap::key),
            self.composite.as_ref().map(Bitmap::key),
        )
    }

    pub fn clear(&mut self) {
        self.base = None;
        self.composite = None;
        self.frame.clear();
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Render into the internal buffer and borrow it (premultiplied RGBA8, base-sized).
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn render_into(&mut self, split: f32) -> PatchResult<&[u8]> {
        let base = self
            .base
            .as_ref()
            .ok_or_else(|| PatchError::validation("compare renderer has no base image"))?;
        match &self.composite {
            Some(c) => wipe_into(&mut self.frame, base, c, split)?,
            None => {
                self.frame.clear();
                self.frame.extend_from_slice(base.as_premul());
            }
        }
        self.renders += 1;
        Ok(&self.frame)
    }

    pub fn render(&mut self, split: f32) -> PatchResult<Bitmap> {
        let (w, h) = self
            .base
            .as_ref()
            .map(Bitmap::dimensions)
            .ok_or_else(|| PatchError::validation("compare renderer has no base image"))?;
        let frame = self.render_into(split)?.to_vec();
        Bitmap::from_premul(w, h, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn pair(w: u32, h: u32) -> (Bitmap, Bitmap) {
        (
            Bitmap::solid(w, h, BLUE).unwrap(),
            Bitmap::solid(w, h, RED).unwrap(),
        )
    }

    #[test]
    fn endpoints_reproduce_inputs() {
        let (base, comp) = pair(40, 10);
        assert_eq!(render_compare(&base, Some(&comp), 0.0).unwrap(), base);
        assert_eq!(render_compare(&base, Some(&comp), 1.0).unwrap(), comp);
        assert_eq!(render_compare(&base, Some(&comp), -3.0).unwrap(), base);
        assert_eq!(render_compare(&base, Some(&comp), 7.0).unwrap(), comp);
    }

    #[test]
    fn without_composite_renders_base() {
        let (base, _) = pair(8, 8);
        assert_eq!(render_compare(&base, None, 0.3).unwrap(), base);
    }

    #[test]
    fn midpoint_splits_with_divider() {
        let (base, comp) = pair(400, 4);
        let out = render_compare(&base, Some(&comp), 0.5).unwrap();
        assert_eq!(divider_width(400), 1);
        assert_eq!(out.pixel(10, 2), RED);
        assert_eq!(out.pixel(198, 2), RED);
        assert_eq!(out.pixel(200, 2), DIVIDER_RGBA);
        assert_eq!(out.pixel(201, 2), BLUE);
        assert_eq!(out.pixel(399, 2), BLUE);
    }

    #[test]
    fn divider_scales_with_width() {
        assert_eq!(divider_width(100), 1);
        assert_eq!(divider_width(2000), 5);
        assert_eq!(divider_width(4000), 10);
    }

    #[test]
    fn size_mismatch_is_composite_error() {
        let base = Bitmap::solid(4, 4, BLUE).unwrap();
        let comp = Bitmap::solid(5, 4, RED).unwrap();
        assert!(matches!(
            render_compare(&base, Some(&comp), 0.5),
            Err(PatchError::Composite(_))
        ));
    }

    #[test]
    fn compare_state_clamps_and_ignores_nan() {
        let mut s = CompareState::default();
        assert_eq!(s.split(), 0.5);
        s.set_split(1.5);
        assert_eq!(s.split(), 1.0);
        s.set_split(f32::NAN);
        assert_eq!(s.split(), 1.0);
        assert_eq!(CompareState::new(-2.0).split(), 0.0);
    }

    #[test]
    fn renderer_reuses_inputs_with_same_content() {
        let (base, comp) = pair(16, 16);
        let mut r = CompareRenderer::new();
        assert!(r.set_base(base.clone()));
        assert!(!r.set_base(Bitmap::solid(16, 16, BLUE).unwrap()));
        assert!(r.set_composite(Some(comp.clone())));
        assert!(!r.set_composite(Some(comp.clone())));
        assert_eq!(r.keys(), (Some(base.key()), Some(comp.key())));
        for i in 0..=10 {
            r.render_into(i as f32 / 10.0).unwrap();
        }
        assert_eq!(r.render_count(), 11);
        assert!(r.set_composite(None));
        assert_eq!(r.render(0.7).unwrap(), base);
    }

    #[test]
    fn renderer_without_base_is_an_error() {
        let mut r = CompareRenderer::new();
        assert!(r.render(0.5).is_err());
    }
}
