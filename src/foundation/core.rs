use crate::foundation::error::{SheetError, SheetResult};

pub use kurbo::{Point, Rect, Vec2};

/// PostScript points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;
/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Convert millimetres to PostScript points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_INCH / MM_PER_INCH
}

/// Convert PostScript points to millimetres.
pub fn pt_to_mm(pt: f64) -> f64 {
    pt * MM_PER_INCH / POINTS_PER_INCH
}

/// Physical page size in points.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageSize {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl PageSize {
    /// US Letter in landscape orientation (11 x 8.5 in).
    pub const LETTER_LANDSCAPE: PageSize = PageSize {
        width: 792.0,
        height: 612.0,
    };

    /// Create a validated page size.
    pub fn new(width: f64, height: f64) -> SheetResult<Self> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(SheetError::validation(format!(
                "page size must be finite and > 0, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Page bounds with the origin at the bottom-left corner.
    pub fn bounds(self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Vertical coordinate of the horizontal centerline.
    pub fn center_y(self) -> f64 {
        self.height / 2.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER_LANDSCAPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_point_conversion_round_trips() {
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-12);
        assert!((pt_to_mm(mm_to_pt(69.35)) - 69.35).abs() < 1e-9);
    }

    #[test]
    fn page_size_rejects_degenerate_dimensions() {
        assert!(PageSize::new(0.0, 10.0).is_err());
        assert!(PageSize::new(10.0, f64::NAN).is_err());
        assert!(PageSize::new(-1.0, 10.0).is_err());
        let p = PageSize::new(792.0, 612.0).unwrap();
        assert_eq!(p, PageSize::LETTER_LANDSCAPE);
        assert_eq!(p.bounds(), Rect::new(0.0, 0.0, 792.0, 612.0));
        assert_eq!(p.center_y(), 306.0);
    }
}
