use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kurbo::Line;
use lopdf::Object;
use lopdf::content::{Content, Operation};

use crate::assets::decode::{PreparedImage, load_image};
use crate::assets::resolve::ResolvedSlots;
use crate::compose::guides::{GuideStyle, GuidesConfig};
use crate::deck::slots::PageGroup;
use crate::foundation::core::PageSize;
use crate::foundation::error::SheetResult;
use crate::layout::anchors::{AnchorLabel, AnchorSet};
use crate::layout::placement::{PlacementRect, place};

/// Image drawn by an overlay, referenced from its content by `name`.
#[derive(Clone, Debug)]
pub(crate) struct OverlayImage {
    pub(crate) name: String,
    pub(crate) image: Arc<PreparedImage>,
}

/// A transparent page-sized drawing layer.
///
/// Overlays are independent of any document: [`crate::compose::merge::merge`] embeds them into a
/// copy of the template page.
#[derive(Clone, Debug)]
pub struct Overlay {
    page: PageSize,
    ops: Vec<Operation>,
    images: Vec<OverlayImage>,
}

impl Overlay {
    /// Empty overlay covering `page`.
    pub fn new(page: PageSize) -> Self {
        Self {
            page,
            ops: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Page geometry the overlay was drawn for.
    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Return `true` when nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of distinct images the overlay references.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn images(&self) -> &[OverlayImage] {
        &self.images
    }

    /// Register an image and return the resource name to draw it with.
    pub(crate) fn add_image(&mut self, image: Arc<PreparedImage>) -> String {
        let name = format!("Im{}", self.images.len());
        self.images.push(OverlayImage {
            name: name.clone(),
            image,
        });
        name
    }

    /// Paint the registered image `name` into `rect`.
    pub(crate) fn draw_image(&mut self, name: &str, rect: &PlacementRect) {
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(rect.width),
                    real(0.0),
                    real(0.0),
                    real(rect.height),
                    real(rect.origin.x),
                    real(rect.origin.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Stroke `lines` with one shared style.
    pub(crate) fn stroke_lines(&mut self, lines: &[Line], style: &GuideStyle) {
        if lines.is_empty() {
            return;
        }
        let [r, g, b] = style.rgb;
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![real(style.width_pt)]),
            Operation::new(
                "RG",
                vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            ),
            Operation::new(
                "d",
                vec![
                    Object::Array(style.dash_pt.iter().copied().map(real).collect()),
                    Object::Integer(0),
                ],
            ),
        ]);
        for line in lines {
            self.ops.extend([
                Operation::new("m", vec![real(line.p0.x), real(line.p0.y)]),
                Operation::new("l", vec![real(line.p1.x), real(line.p1.y)]),
            ]);
        }
        self.ops.extend([Operation::new("S", vec![]), Operation::new("Q", vec![])]);
    }

    /// Encoded content stream of the overlay.
    pub fn content_bytes(&self) -> SheetResult<Vec<u8>> {
        let content = Content {
            operations: self.ops.clone(),
        };
        Ok(content.encode()?)
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// A slot that could not be drawn; the position stays blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderFailure {
    /// Deck slot index.
    pub slot: usize,
    /// Sheet position of the slot.
    pub label: AnchorLabel,
    /// Why the slot stayed blank.
    pub reason: String,
}

/// Result of composing one page of cards.
#[derive(Clone, Debug)]
pub struct ComposedPage {
    /// Card layer.
    pub overlay: Overlay,
    /// Positions that received an image.
    pub placed: Vec<(AnchorLabel, PlacementRect)>,
    /// Slots that had an asset but failed to draw.
    pub failures: Vec<RenderFailure>,
}

/// Draws card artwork and guide lines into overlays.
#[derive(Clone, Debug)]
pub struct OverlayComposer {
    anchors: AnchorSet,
    target_width: f64,
    page: PageSize,
}

impl OverlayComposer {
    pub fn new(anchors: AnchorSet, target_width: f64, page: PageSize) -> Self {
        Self {
            anchors,
            target_width,
            page,
        }
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// Draw every resolved slot of `group` at its anchor.
    ///
    /// A slot whose image fails to load or place is logged and left blank; the page still
    /// renders. Repeated artwork on one page is embedded once.
    pub fn compose_cards(&self, group: &PageGroup<'_>, assets: &ResolvedSlots) -> ComposedPage {
        let mut overlay = Overlay::new(self.page);
        let mut names: HashMap<PathBuf, (String, Arc<PreparedImage>)> = HashMap::new();
        let mut placed = Vec::new();
        let mut failures = Vec::new();

        for anchor in self.anchors.iter() {
            let position = anchor.label.position();
            if group.at(position).is_none() {
                continue;
            }
            let slot = group.first_slot() + position;
            let Some(path) = assets.get(slot) else {
                continue;
            };

            let drawn = self.draw_at(&mut overlay, &mut names, path, anchor.label);
            match drawn {
                Ok(rect) => {
                    tracing::debug!(
                        slot,
                        anchor = %anchor.label,
                        file = %path.display(),
                        x = rect.origin.x,
                        y = rect.origin.y,
                        "placed card"
                    );
                    placed.push((anchor.label, rect));
                }
                Err(e) => {
                    tracing::warn!(slot, anchor = %anchor.label, error = %e, "slot left blank");
                    failures.push(RenderFailure {
                        slot,
                        label: anchor.label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        ComposedPage {
            overlay,
            placed,
            failures,
        }
    }

    fn draw_at(
        &self,
        overlay: &mut Overlay,
        names: &mut HashMap<PathBuf, (String, Arc<PreparedImage>)>,
        path: &Path,
        label: AnchorLabel,
    ) -> SheetResult<PlacementRect> {
        let (name, image) = match names.get(path) {
            Some(hit) => hit.clone(),
            None => {
                let image = Arc::new(load_image(path)?);
                let name = overlay.add_image(Arc::clone(&image));
                names.insert(path.to_path_buf(), (name.clone(), Arc::clone(&image)));
                (name, image)
            }
        };
        self.draw_prepared(overlay, &name, &image, label)
    }

    fn draw_prepared(
        &self,
        overlay: &mut Overlay,
        name: &str,
        image: &PreparedImage,
        label: AnchorLabel,
    ) -> SheetResult<PlacementRect> {
        let center = self.anchors.center(label.position()).unwrap_or_default();
        let rect = place(center, self.target_width, image.width, image.height)?;
        overlay.draw_image(name, &rect);
        Ok(rect)
    }

    /// Draw the same image at all eight anchors (a sheet of card backs).
    pub fn compose_repeated(&self, image: Arc<PreparedImage>) -> SheetResult<Overlay> {
        let mut overlay = Overlay::new(self.page);
        let name = overlay.add_image(Arc::clone(&image));
        for label in AnchorLabel::ALL {
            self.draw_prepared(&mut overlay, &name, &image, label)?;
        }
        Ok(overlay)
    }

    /// Guide-line layer, `None` when no guides are configured.
    pub fn compose_guides(&self, guides: &GuidesConfig) -> Option<Overlay> {
        if guides.is_empty() {
            return None;
        }
        let mut overlay = Overlay::new(self.page);
        let lines = guides.segments(self.page, self.anchors.offset());
        overlay.stroke_lines(&lines, &guides.style);
        Some(overlay)
    }
}
