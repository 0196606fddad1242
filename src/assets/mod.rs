//! Asset lookup and raster decoding.

/// Image decoding into PDF-ready sample buffers.
pub mod decode;
/// Matching slot keys to files in the asset directory.
pub mod resolve;
