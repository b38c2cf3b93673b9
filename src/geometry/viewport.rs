use crate::foundation::core::{NativePoint, Point, Rect, SelectionBox, Vec2};
use crate::foundation::error::{PatchError, PatchResult};

/// Mapping between display coordinates and an image's native pixel grid.
///
/// The display rect changes with every layout pass (resize, image swap), so a `Viewport` is meant
/// to be built from the current layout for each pointer event and then dropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    display: Rect,
    natural_width: u32,
    natural_height: u32,
}

impl Viewport {
    /// `display` is where the image is currently rendered, in the pointer's coordinate space.
    pub fn new(display: Rect, natural_width: u32, natural_height: u32) -> PatchResult<Self> {
        let display = display.abs();
        if !display.is_finite() || display.width() <= 0.0 || display.height() <= 0.0 {
            return Err(PatchError::validation(format!(
                "display rect must be finite and non-empty, got {display:?}"
            )));
        }
        if natural_width == 0 || natural_height == 0 {
            return Err(PatchError::validation(
                "natural image size must be non-zero",
            ));
        }
        Ok(Self {
            display,
            natural_width,
            natural_height,
        })
    }

    /// Viewport where the image is drawn 1:1 at the origin.
    pub fn identity(natural_width: u32, natural_height: u32) -> PatchResult<Self> {
        Self::new(
            Rect::new(0.0, 0.0, f64::from(natural_width), f64::from(natural_height)),
            natural_width,
            natural_height,
        )
    }

    pub fn display_rect(&self) -> Rect {
        self.display
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.natural_width, self.natural_height)
    }

    /// Native pixels per display unit along x.
    pub fn scale_x(&self) -> f64 {
        f64::from(self.natural_width) / self.display.width()
    }

    /// Native pixels per display unit along y.
    pub fn scale_y(&self) -> f64 {
        f64::from(self.natural_height) / self.display.height()
    }

    /// Offset of `p` from the display rect's origin.
    pub fn to_local(&self, p: Point) -> Vec2 {
        p - self.display.origin()
    }

    /// Unfloored native position.
    pub fn to_native_f(&self, p: Point) -> Point {
        let local = self.to_local(p);
        Point::new(local.x * self.scale_x(), local.y * self.scale_y())
    }

    /// Native pixel under display point `p`, floored.
    pub fn to_native(&self, p: Point) -> NativePoint {
        let n = self.to_native_f(p);
        NativePoint {
            x: n.x.floor() as i64,
            y: n.y.floor() as i64,
        }
    }

    /// Display position of a native position. Not floored; for overlays only.
    pub fn to_display(&self, native: Point) -> Point {
        Point::new(
            self.display.x0 + native.x / self.scale_x(),
            self.display.y0 + native.y / self.scale_y(),
        )
    }

    /// Display-space rectangle covering a native box, for drawing the selection overlay.
    pub fn box_to_display(&self, b: SelectionBox) -> Rect {
        let p0 = self.to_display(Point::new(f64::from(b.x), f64::from(b.y)));
        let p1 = self.to_display(Point::new(b.right() as f64, b.bottom() as f64));
        Rect::from_points(p0, p1)
    }
}
