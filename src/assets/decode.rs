use std::path::Path;

use anyhow::Context as _;
use lopdf::{Object, Stream, dictionary};

use crate::foundation::error::{SheetError, SheetResult};

/// Raster artwork decoded and converted into PDF image streams.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
    /// 8-bit `DeviceRGB` samples, row-major.
    pub(crate) rgb: Vec<u8>,
    /// 8-bit alpha samples when the source has any transparency.
    pub(crate) alpha: Option<Vec<u8>>,
}

impl PreparedImage {
    /// Width over height.
    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Image XObject stream, plus the soft mask stream to link as `/SMask` when present.
    pub(crate) fn to_streams(&self) -> (Stream, Option<Stream>) {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(self.width)),
                "Height" => Object::Integer(i64::from(self.height)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            self.rgb.clone(),
        );
        let mask = self.alpha.as_ref().map(|alpha| {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(i64::from(self.width)),
                    "Height" => Object::Integer(i64::from(self.height)),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => Object::Integer(8),
                },
                alpha.clone(),
            )
        });
        (image, mask)
    }
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> SheetResult<PreparedImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes).map_err(|e| match e {
        SheetError::Render(msg) => SheetError::render(format!("'{}': {msg}", path.display())),
        other => other,
    })
}

/// Decode image bytes (any format the `image` crate recognises).
pub fn decode_image(bytes: &[u8]) -> SheetResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| SheetError::render(format!("decode image: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(SheetError::render("image has zero width or height"));
    }

    let raw = rgba.into_raw();
    let pixels = raw.len() / 4;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for px in raw.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    let alpha = alpha.iter().any(|&a| a != 255).then_some(alpha);

    Ok(PreparedImage {
        width,
        height,
        rgb,
        alpha,
    })
}
