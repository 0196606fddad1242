use kurbo::Line;

use crate::foundation::core::{PageSize, Vec2};
use crate::foundation::error::{SheetError, SheetResult};

/// Stroke used for cut guides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuideStyle {
    /// Stroke color, RGB in `0..=1`.
    pub rgb: [f32; 3],
    /// Line width in points.
    pub width_pt: f64,
    /// Dash pattern in points (on, off, ...); empty for a solid line.
    pub dash_pt: Vec<f64>,
}

impl Default for GuideStyle {
    fn default() -> Self {
        Self {
            rgb: [0.0, 0.0, 0.0],
            width_pt: 0.5,
            dash_pt: vec![4.0, 1.0],
        }
    }
}

impl GuideStyle {
    pub fn validate(&self) -> SheetResult<()> {
        if self.rgb.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(SheetError::validation("guide rgb components must be in 0..=1"));
        }
        if !self.width_pt.is_finite() || self.width_pt <= 0.0 {
            return Err(SheetError::validation("guide width_pt must be finite and > 0"));
        }
        if self.dash_pt.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(SheetError::validation("guide dash_pt entries must be >= 0"));
        }
        if !self.dash_pt.is_empty() && self.dash_pt.iter().all(|d| *d == 0.0) {
            return Err(SheetError::validation("guide dash_pt must not be all zeros"));
        }
        Ok(())
    }
}

/// Short horizontal guides hugging the left and right page edges.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EdgeGuides {
    /// Heights (points) at which to draw a guide pair.
    pub y_pt: Vec<f64>,
    /// Distance from the page edge to the outer end of each guide.
    pub margin_pt: f64,
    /// Guide length.
    pub length_pt: f64,
}

impl Default for EdgeGuides {
    fn default() -> Self {
        Self {
            y_pt: vec![580.9604567, 331.511795, 280.488205, 31.03954328],
            margin_pt: 72.0,
            length_pt: 144.0,
        }
    }
}

/// Short vertical guides at the column cut lines, near the top and bottom edges and across the
/// horizontal centerline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColumnGuides {
    /// Horizontal positions (points) of the column cuts.
    pub x_pt: Vec<f64>,
    /// Gap between the page edge and the guide.
    pub inset_pt: f64,
    /// Guide length.
    pub length_pt: f64,
    /// Also draw a guide centered on the horizontal centerline.
    pub centerline: bool,
}

impl Default for ColumnGuides {
    fn default() -> Self {
        Self {
            x_pt: vec![
                13.3230757,
                191.9056404,
                208.9135037,
                387.4960683,
                404.5039317,
                583.0864963,
                600.0943596,
                778.6769243,
            ],
            inset_pt: 18.0,
            length_pt: 36.0,
            centerline: true,
        }
    }
}

/// Which guides to draw and how.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuidesConfig {
    pub edges: Option<EdgeGuides>,
    pub columns: Option<ColumnGuides>,
    pub style: GuideStyle,
}

impl GuidesConfig {
    /// Return `true` when no guide family is enabled.
    pub fn is_empty(&self) -> bool {
        self.edges.is_none() && self.columns.is_none()
    }

    pub fn validate(&self) -> SheetResult<()> {
        self.style.validate()?;
        for len in [
            self.edges.as_ref().map(|e| e.length_pt),
            self.columns.as_ref().map(|c| c.length_pt),
        ]
        .into_iter()
        .flatten()
        {
            if !len.is_finite() || len <= 0.0 {
                return Err(SheetError::validation("guide length_pt must be finite and > 0"));
            }
        }
        Ok(())
    }

    /// Guide segments for a page, shifted by the same offset as the card anchors.
    pub fn segments(&self, page: PageSize, offset: Vec2) -> Vec<Line> {
        let mut out = Vec::new();

        if let Some(edges) = &self.edges {
            let left = edges.margin_pt;
            let right = page.width - edges.margin_pt;
            for &y in &edges.y_pt {
                out.push(Line::new((left, y), (left + edges.length_pt, y)));
                out.push(Line::new((right - edges.length_pt, y), (right, y)));
            }
        }

        if let Some(cols) = &self.columns {
            let top = page.height - cols.inset_pt;
            let bottom = cols.inset_pt;
            let half = cols.length_pt / 2.0;
            for &x in &cols.x_pt {
                out.push(Line::new((x, top - cols.length_pt), (x, top)));
                out.push(Line::new((x, bottom), (x, bottom + cols.length_pt)));
                if cols.centerline {
                    let cy = page.center_y();
                    out.push(Line::new((x, cy - half), (x, cy + half)));
                }
            }
        }

        out.into_iter()
            .map(|l| Line::new(l.p0 + offset, l.p1 + offset))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_guides_by_default() {
        let g = GuidesConfig::default();
        assert!(g.is_empty());
        assert!(g.segments(PageSize::LETTER_LANDSCAPE, Vec2::ZERO).is_empty());
    }

    #[test]
    fn edge_guides_pair_up_per_height() {
        let g = GuidesConfig {
            edges: Some(EdgeGuides::default()),
            ..Default::default()
        };
        let segs = g.segments(PageSize::LETTER_LANDSCAPE, Vec2::ZERO);
        assert_eq!(segs.len(), 8);
        assert_eq!(segs[0], Line::new((72.0, 580.9604567), (216.0, 580.9604567)));
        assert_eq!(segs[1], Line::new((576.0, 580.9604567), (720.0, 580.9604567)));
    }

    #[test]
    fn column_guides_cover_edges_and_centerline() {
        let g = GuidesConfig {
            columns: Some(ColumnGuides {
                x_pt: vec![100.0],
                ..Default::default()
            }),
            ..Default::default()
        };
        let segs = g.segments(PageSize::LETTER_LANDSCAPE, Vec2::ZERO);
        assert_eq!(
            segs,
            vec![
                Line::new((100.0, 558.0), (100.0, 594.0)),
                Line::new((100.0, 18.0), (100.0, 54.0)),
                Line::new((100.0, 288.0), (100.0, 324.0)),
            ]
        );
    }

    #[test]
    fn guides_move_with_the_anchor_offset() {
        let g = GuidesConfig {
            edges: Some(EdgeGuides::default()),
            columns: Some(ColumnGuides::default()),
            ..Default::default()
        };
        let offset = Vec2::new(3.0, -2.0);
        let base = g.segments(PageSize::LETTER_LANDSCAPE, Vec2::ZERO);
        let moved = g.segments(PageSize::LETTER_LANDSCAPE, offset);
        assert_eq!(base.len(), moved.len());
        for (b, m) in base.iter().zip(&moved) {
            assert_eq!(m.p0, b.p0 + offset);
            assert_eq!(m.p1, b.p1 + offset);
        }
    }

    #[test]
    fn style_validation() {
        assert!(GuideStyle::default().validate().is_ok());
        let bad = GuideStyle {
            dash_pt: vec![0.0, 0.0],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = GuideStyle {
            rgb: [2.0, 0.0, 0.0],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
