//! Sheet anchors and aspect-preserving image placement.

/// The eight named card positions of the template.
pub mod anchors;
/// Centering and scaling of artwork on an anchor.
pub mod placement;
