/// Crate-wide result alias.
pub type SheetResult<T> = Result<T, SheetError>;

/// One slot whose card identity matched no asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedSlot {
    /// 0-based slot index in the deck.
    pub slot: usize,
    /// Identity (or display name, in name mode) that failed to resolve.
    pub identity: String,
}

impl std::fmt::Display for UnresolvedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}: {}", self.slot, self.identity)
    }
}

/// Errors raised by the layout engine.
///
/// Per-slot render problems are logged and leave the slot blank. Compression problems never
/// reach this type.
#[derive(thiserror::Error, Debug)]
pub enum SheetError {
    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("unresolved assets for {} slot(s): {}", .0.len(), format_unresolved(.0))]
    Resolution(Vec<UnresolvedSlot>),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SheetError {
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Unresolved slots carried by a [`SheetError::Resolution`], empty otherwise.
    pub fn unresolved(&self) -> &[UnresolvedSlot] {
        match self {
            Self::Resolution(list) => list,
            _ => &[],
        }
    }
}

fn format_unresolved(list: &[UnresolvedSlot]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SheetError::manifest("x")
                .to_string()
                .contains("manifest error:")
        );
        assert!(
            SheetError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(SheetError::render("x").to_string().contains("render error:"));
    }

    #[test]
    fn resolution_lists_every_pair() {
        let err = SheetError::Resolution(vec![
            UnresolvedSlot {
                slot: 3,
                identity: "abc".to_string(),
            },
            UnresolvedSlot {
                slot: 9,
                identity: "xyz".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 slot(s)"));
        assert!(msg.contains("slot 3: abc"));
        assert!(msg.contains("slot 9: xyz"));
        assert_eq!(err.unresolved().len(), 2);
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = SheetError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
        assert!(err.unresolved().is_empty());
    }
}
