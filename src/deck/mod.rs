//! Card manifest parsing and the slot table built from it.

/// Manifest XML parsing into card records.
pub mod manifest;
/// Slot table construction and page partitioning.
pub mod slots;
