use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{SheetError, SheetResult};

/// Largest slot index a manifest may name.
pub const MAX_SLOT: usize = 99_999;

/// One card entry of the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardRecord {
    /// Asset identity, matched against filenames in the asset directory.
    pub identity: String,
    /// Deck slots this card occupies, in declaration order, without duplicates.
    pub slots: Vec<usize>,
    /// Human-readable card name.
    pub display_name: String,
    /// Search query the card was picked with, when the manifest records one.
    pub query: Option<String>,
}

/// Parsed card manifest.
///
/// The document is XML with a `<fronts>` collection of `<card>` elements directly under the root:
///
/// ```xml
/// <order>
///   <fronts>
///     <card><id>abc</id><slots>0,1</slots><name>Island</name><query>island</query></card>
///   </fronts>
///   <cardback>back-id</cardback>
/// </order>
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Card entries in document order.
    pub cards: Vec<CardRecord>,
    /// Identity of the shared card back, if the manifest names one.
    pub cardback: Option<String>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> SheetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest '{}'", path.display()))?;
        Self::parse(&text)
            .map_err(|e| SheetError::manifest(format!("'{}': {}", path.display(), inner(e))))
    }

    /// Parse manifest XML.
    ///
    /// Entries missing `<id>` or `<slots>` (or leaving them empty) are placeholders and are
    /// skipped. A slot list that is not a comma-separated list of non-negative integers is an
    /// error.
    pub fn parse(text: &str) -> SheetResult<Self> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| SheetError::manifest(format!("not well-formed XML: {e}")))?;
        let root = doc.root_element();

        let fronts = child(root, "fronts")
            .ok_or_else(|| SheetError::manifest("missing <fronts> element under the root"))?;

        let mut cards = Vec::new();
        for (ordinal, card) in fronts
            .children()
            .filter(|n| n.has_tag_name("card"))
            .enumerate()
        {
            let (Some(identity), Some(slots_text)) =
                (child_text(card, "id"), child_text(card, "slots"))
            else {
                tracing::debug!(ordinal, "skipping placeholder card without id or slots");
                continue;
            };

            let slots = parse_slot_list(slots_text).map_err(|e| {
                SheetError::manifest(format!("card #{ordinal} ('{identity}'): {}", inner(e)))
            })?;

            cards.push(CardRecord {
                identity: identity.to_string(),
                slots,
                display_name: child_text(card, "name").unwrap_or_default().to_string(),
                query: child(card, "query")
                    .map(|q| q.text().unwrap_or_default().trim().to_string()),
            });
        }

        let cardback = child_text(root, "cardback").map(str::to_string);
        Ok(Self { cards, cardback })
    }
}

/// Parse `"0, 1,2"` into slot indices, dropping repeats within the list.
pub fn parse_slot_list(text: &str) -> SheetResult<Vec<usize>> {
    let mut out: Vec<usize> = Vec::new();
    for part in text.split(',') {
        let part = part.trim();
        let slot: usize = part
            .parse()
            .map_err(|_| SheetError::manifest(format!("invalid slot index '{part}'")))?;
        if slot > MAX_SLOT {
            return Err(SheetError::manifest(format!(
                "slot index {slot} exceeds the maximum of {MAX_SLOT}"
            )));
        }
        if out.contains(&slot) {
            tracing::warn!(slot, "slot listed twice for the same card; keeping one");
            continue;
        }
        out.push(slot);
    }
    Ok(out)
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn inner(e: SheetError) -> String {
    match e {
        SheetError::Manifest(msg) => msg,
        other => other.to_string(),
    }
}
