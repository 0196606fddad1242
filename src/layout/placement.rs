use crate::foundation::core::{Point, Rect, mm_to_pt};
use crate::foundation::error::{SheetError, SheetResult};

/// Printed card width of the stock template, in millimetres.
pub const DEFAULT_TARGET_WIDTH_MM: f64 = 69.35;

/// Default printed card width in points.
pub fn default_target_width_pt() -> f64 {
    mm_to_pt(DEFAULT_TARGET_WIDTH_MM)
}

/// Where and how large an image is drawn on the page, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRect {
    /// Bottom-left corner of the drawn image.
    pub origin: Point,
    /// Drawn width.
    pub width: f64,
    /// Drawn height.
    pub height: f64,
}

impl PlacementRect {
    /// Bounds as a rectangle.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, (self.width, self.height))
    }

    /// Center of the drawn image.
    pub fn center(&self) -> Point {
        self.rect().center()
    }
}

/// Fit an image of `natural_width` x `natural_height` pixels to `target_width` points, centered on
/// `center`.
///
/// Width is authoritative; height follows the source aspect ratio, so nothing is cropped or
/// letterboxed. `center` is expected to already include any anchor offset.
pub fn place(
    center: Point,
    target_width: f64,
    natural_width: u32,
    natural_height: u32,
) -> SheetResult<PlacementRect> {
    if natural_width == 0 || natural_height == 0 {
        return Err(SheetError::validation(format!(
            "image has degenerate size {natural_width}x{natural_height}"
        )));
    }
    if !target_width.is_finite() || target_width <= 0.0 {
        return Err(SheetError::validation(
            "target width must be finite and > 0",
        ));
    }

    let height = target_width * (f64::from(natural_height) / f64::from(natural_width));
    Ok(PlacementRect {
        origin: Point::new(center.x - target_width / 2.0, center.y - height / 2.0),
        width: target_width,
        height,
    })
}
