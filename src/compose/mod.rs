//! Per-sheet drawing: card and guide overlays, merged onto the cut-line template.

/// Dashed cut guides.
pub mod guides;
/// Template loading and layer merging.
pub mod merge;
/// Page-sized drawing layers.
pub mod overlay;
