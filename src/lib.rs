//! Cardsheet lays out a deck of card artwork onto printable 8-up sheets.
//!
//! A run reads a card manifest, assigns every card to its numbered slots, checks that each slot
//! has artwork, then draws each group of eight slots over a cut-line template page and merges the
//! pages into one PDF:
//!
//! - Parse a [`Manifest`] and build a [`SlotTable`]
//! - Resolve artwork with [`preflight`] against an [`AssetDirectory`]
//! - Render with [`render_fronts`] (or [`render_backs`] for a sheet of card backs)
#![forbid(unsafe_code)]

pub mod assets;
pub mod compose;
pub mod config;
pub mod deck;
pub mod encode;
mod foundation;
pub mod layout;
pub mod pipeline;

pub use crate::foundation::core::{PageSize, Point, Rect, Vec2, mm_to_pt, pt_to_mm};
pub use crate::foundation::error::{SheetError, SheetResult, UnresolvedSlot};

pub use crate::assets::decode::{PreparedImage, decode_image, load_image};
pub use crate::assets::resolve::{AssetDirectory, MatchMode, ResolvedSlots, preflight};
pub use crate::compose::guides::{ColumnGuides, EdgeGuides, GuideStyle, GuidesConfig};
pub use crate::compose::merge::{SheetPage, Template, merge, render_sheet};
pub use crate::compose::overlay::{ComposedPage, Overlay, OverlayComposer, RenderFailure};
pub use crate::config::{CompressionConfig, SheetConfig, SlotMatching};
pub use crate::deck::manifest::{CardRecord, MAX_SLOT, Manifest};
pub use crate::deck::slots::{PageGroup, SLOTS_PER_PAGE, SlotKey, SlotTable};
pub use crate::encode::compress::{
    CompressError, Ghostscript, GhostscriptOpts, PageOutput, Recompressor,
};
pub use crate::layout::anchors::{AnchorLabel, AnchorPoint, AnchorSet};
pub use crate::layout::placement::{PlacementRect, place};
pub use crate::pipeline::{
    BackSource, BacksJob, FrontsJob, RenderThreading, RunSummary, render_backs,
    render_backs_with, render_fronts, render_fronts_with,
};
