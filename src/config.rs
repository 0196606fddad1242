use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::assets::resolve::MatchMode;
use crate::compose::guides::GuidesConfig;
use crate::deck::slots::SlotKey;
use crate::encode::compress::GhostscriptOpts;
use crate::foundation::core::{Vec2, mm_to_pt};
use crate::foundation::error::{SheetError, SheetResult};
use crate::layout::anchors::AnchorSet;
use crate::layout::placement::DEFAULT_TARGET_WIDTH_MM;

/// How manifest cards are matched to artwork files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMatching {
    /// Card identity, found as a substring of the filename.
    #[default]
    Identity,
    /// Card display name, equal to the whole filename.
    Name,
}

impl SlotMatching {
    pub fn slot_key(self) -> SlotKey {
        match self {
            Self::Identity => SlotKey::Identity,
            Self::Name => SlotKey::DisplayName,
        }
    }

    pub fn match_mode(self) -> MatchMode {
        match self {
            Self::Identity => MatchMode::Substring,
            Self::Name => MatchMode::Exact,
        }
    }
}

/// External recompression settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub program: String,
    pub resolution_dpi: u32,
    pub pdf_settings: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let gs = GhostscriptOpts::default();
        Self {
            enabled: true,
            program: gs.program,
            resolution_dpi: gs.resolution_dpi,
            pdf_settings: gs.pdf_settings,
        }
    }
}

impl CompressionConfig {
    pub fn ghostscript_opts(&self) -> GhostscriptOpts {
        GhostscriptOpts {
            program: self.program.clone(),
            resolution_dpi: self.resolution_dpi,
            pdf_settings: self.pdf_settings.clone(),
        }
    }
}

/// Layout and output settings, loadable from a JSON file.
///
/// Every field has a default, so `{}` is a valid config that reproduces the stock sheet.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Printed card width.
    pub target_width_mm: f64,
    /// Uniform `[x, y]` shift applied to every anchor and guide.
    pub offset_mm: [f64; 2],
    pub guides: GuidesConfig,
    pub compression: CompressionConfig,
    pub match_mode: SlotMatching,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            target_width_mm: DEFAULT_TARGET_WIDTH_MM,
            offset_mm: [0.0, 0.0],
            guides: GuidesConfig::default(),
            compression: CompressionConfig::default(),
            match_mode: SlotMatching::default(),
        }
    }
}

impl SheetConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> SheetResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| SheetError::validation(format!("parse config JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> SheetResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            SheetError::validation(format!("open config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> SheetResult<()> {
        if !self.target_width_mm.is_finite() || self.target_width_mm <= 0.0 {
            return Err(SheetError::validation(
                "target_width_mm must be finite and > 0",
            ));
        }
        if self.offset_mm.iter().any(|v| !v.is_finite()) {
            return Err(SheetError::validation("offset_mm must be finite"));
        }
        self.guides.validate()?;
        if self.compression.enabled {
            if self.compression.program.trim().is_empty() {
                return Err(SheetError::validation(
                    "compression.program must not be empty",
                ));
            }
            if self.compression.resolution_dpi == 0 {
                return Err(SheetError::validation(
                    "compression.resolution_dpi must be > 0",
                ));
            }
        }
        Ok(())
    }

    pub fn target_width_pt(&self) -> f64 {
        mm_to_pt(self.target_width_mm)
    }

    /// Anchor offset in points.
    pub fn offset_pt(&self) -> Vec2 {
        Vec2::new(mm_to_pt(self.offset_mm[0]), mm_to_pt(self.offset_mm[1]))
    }

    /// Stock anchors shifted by the configured offset.
    pub fn anchors(&self) -> AnchorSet {
        AnchorSet::letter_landscape().with_offset(self.offset_pt())
    }
}
