use crate::foundation::error::{PatchError, PatchResult};

pub use kurbo::{Point, Rect, Vec2};

/// Integer pixel position in an image's native (full resolution) coordinate space.
///
/// Signed so that pointer positions left of or above the displayed image map to negative values
/// instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NativePoint {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
}

/// Square region in native pixel units.
///
/// A committed box always has `width == height > 0` and lies inside the natural image; see
/// [`SelectionBox::validate_within`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SelectionBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in native pixels.
    pub width: u32,
    /// Height in native pixels. Equal to `width` for every box the selector produces.
    pub height: u32,
}

impl SelectionBox {
    /// Build a square box of side `size` at `(x, y)`.
    pub fn square(x: u32, y: u32, size: u32) -> Self {
        Self {
            x,
            y,
            width: size,
            height: size,
        }
    }

    /// Exclusive right edge.
    pub fn right(self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    pub fn is_square(self) -> bool {
        self.width == self.height
    }

    /// Return `true` when pixel `(px, py)` lies inside the box.
    pub fn contains(self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && u64::from(px) < self.right() && u64::from(py) < self.bottom()
    }

    /// Check that the box is non-empty and fits inside a `width x height` image.
    pub fn validate_within(self, width: u32, height: u32) -> PatchResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PatchError::invalid_region(format!(
                "box {}x{} at ({}, {}) is empty",
                self.width, self.height, self.x, self.y
            )));
        }
        if self.right() > u64::from(width) || self.bottom() > u64::from(height) {
            return Err(PatchError::invalid_region(format!(
                "box {}x{} at ({}, {}) exceeds image bounds {width}x{height}",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }

    /// Like [`validate_within`](Self::validate_within), additionally requiring a square box.
    pub fn validate_square_within(self, width: u32, height: u32) -> PatchResult<()> {
        if !self.is_square() {
            return Err(PatchError::invalid_region(format!(
                "box {}x{} is not square",
                self.width, self.height
            )));
        }
        self.validate_within(width, height)
    }
}
