use crate::deck::slots::SLOTS_PER_PAGE;
use crate::foundation::core::{Point, Vec2};

/// Names of the eight card positions on a sheet, top row left to right then bottom row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnchorLabel {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl AnchorLabel {
    /// All labels in slot-position order.
    pub const ALL: [AnchorLabel; SLOTS_PER_PAGE] = [
        AnchorLabel::A,
        AnchorLabel::B,
        AnchorLabel::C,
        AnchorLabel::D,
        AnchorLabel::E,
        AnchorLabel::F,
        AnchorLabel::G,
        AnchorLabel::H,
    ];

    /// Label for the slot at `position` on a page.
    pub fn from_position(position: usize) -> Option<Self> {
        Self::ALL.get(position).copied()
    }

    /// Slot position (0..8) this label stands for.
    pub fn position(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for AnchorLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Center of one card position, in page points (origin bottom-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorPoint {
    /// Position name.
    pub label: AnchorLabel,
    /// Center coordinates.
    pub at: Point,
}

/// The eight anchors of the cut-line template, optionally shifted by a uniform offset.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorSet {
    points: [AnchorPoint; SLOTS_PER_PAGE],
    offset: Vec2,
}

const TOP_ROW_Y: f64 = 456.2361258;
const BOTTOM_ROW_Y: f64 = 155.7638742;
const COLUMN_X: [f64; 4] = [102.614358, 298.204786, 493.795214, 689.385642];

impl AnchorSet {
    /// Anchors of the stock US Letter landscape template.
    pub fn letter_landscape() -> Self {
        let points = AnchorLabel::ALL.map(|label| {
            let i = label.position();
            let y = if i < 4 { TOP_ROW_Y } else { BOTTOM_ROW_Y };
            AnchorPoint {
                label,
                at: Point::new(COLUMN_X[i % 4], y),
            }
        });
        Self {
            points,
            offset: Vec2::ZERO,
        }
    }

    /// Same anchors with every point shifted by `offset`.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Uniform offset applied to every anchor.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Template anchors without the offset.
    pub fn base_points(&self) -> &[AnchorPoint; SLOTS_PER_PAGE] {
        &self.points
    }

    /// Effective center of the anchor at slot `position`, offset included.
    pub fn center(&self, position: usize) -> Option<Point> {
        self.points.get(position).map(|p| p.at + self.offset)
    }

    /// Effective anchors in slot-position order.
    pub fn iter(&self) -> impl Iterator<Item = AnchorPoint> + '_ {
        self.points.iter().map(|p| AnchorPoint {
            label: p.label,
            at: p.at + self.offset,
        })
    }
}

impl Default for AnchorSet {
    fn default() -> Self {
        Self::letter_landscape()
    }
}
