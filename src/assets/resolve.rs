use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::deck::slots::SlotTable;
use crate::foundation::error::{SheetError, SheetResult, UnresolvedSlot};

/// File extensions accepted as card artwork (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// How a slot key is matched against filenames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// The filename contains the key (case-sensitive).
    #[default]
    Substring,
    /// The filename equals the key.
    Exact,
}

/// Return `true` when `name` carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image_file_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Snapshot of the image files in a flat asset directory.
///
/// Filenames are kept in lexicographic order so that substring matching is reproducible
/// regardless of the order the filesystem enumerates entries in.
#[derive(Clone, Debug)]
pub struct AssetDirectory {
    root: PathBuf,
    files: Vec<String>,
}

impl AssetDirectory {
    /// List image files directly inside `root`.
    pub fn scan(root: impl Into<PathBuf>) -> SheetResult<Self> {
        let root = root.into();
        let entries = std::fs::read_dir(&root)
            .with_context(|| format!("read asset directory '{}'", root.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("list asset directory '{}'", root.display()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(?raw, "skipping non-UTF-8 file name"),
            }
        }
        Ok(Self::from_listing(root, names))
    }

    /// Build from an explicit listing; non-image names are dropped.
    pub fn from_listing<I, S>(root: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut files: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| is_image_file_name(n))
            .collect();
        files.sort();
        files.dedup();
        Self {
            root: root.into(),
            files,
        }
    }

    /// Directory the listing was taken from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Image filenames in lexicographic order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Every filename that matches `key`.
    pub fn candidates<'a>(
        &'a self,
        key: &'a str,
        mode: MatchMode,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.files
            .iter()
            .map(String::as_str)
            .filter(move |name| match mode {
                _ if key.is_empty() => false,
                MatchMode::Substring => name.contains(key),
                MatchMode::Exact => *name == key,
            })
    }

    /// The lexicographically first filename matching `key`, if any.
    pub fn resolve<'a>(&'a self, key: &'a str, mode: MatchMode) -> Option<&'a str> {
        self.candidates(key, mode).next()
    }

    /// Full path of a file in this directory.
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

/// Asset paths for every filled slot, produced by [`preflight`].
#[derive(Clone, Debug, Default)]
pub struct ResolvedSlots {
    paths: BTreeMap<usize, PathBuf>,
}

impl ResolvedSlots {
    /// Asset for `slot`, `None` for empty slots.
    pub fn get(&self, slot: usize) -> Option<&Path> {
        self.paths.get(&slot).map(PathBuf::as_path)
    }

    /// Number of slots with an asset.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Return `true` when no slot carries an asset.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of distinct asset files referenced.
    pub fn unique_assets(&self) -> usize {
        let mut v: Vec<&PathBuf> = self.paths.values().collect();
        v.sort();
        v.dedup();
        v.len()
    }
}

/// Resolve every filled slot before anything is rendered.
///
/// All failures are gathered and returned together as [`SheetError::Resolution`], in slot order.
pub fn preflight(
    table: &SlotTable,
    dir: &AssetDirectory,
    mode: MatchMode,
) -> SheetResult<ResolvedSlots> {
    let mut resolved = ResolvedSlots::default();
    let mut missing = Vec::new();

    for (slot, key) in table.filled() {
        let mut hits = dir.candidates(key, mode);
        match hits.next() {
            Some(file) => {
                let others = hits.count();
                if others > 0 {
                    tracing::warn!(
                        slot,
                        key,
                        chosen = file,
                        others,
                        "several assets match; using the first in name order"
                    );
                }
                resolved.paths.insert(slot, dir.path_of(file));
            }
            None => missing.push(UnresolvedSlot {
                slot,
                identity: key.to_string(),
            }),
        }
    }

    if !missing.is_empty() {
        return Err(SheetError::Resolution(missing));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> AssetDirectory {
        AssetDirectory::from_listing(
            "fronts",
            [
                "zeta_abc.png",
                "abc_front.JPG",
                "notes.txt",
                "xyz.webp",
                "Island.png",
                "back.bmp",
            ],
        )
    }

    #[test]
    fn listing_is_filtered_and_sorted() {
        assert_eq!(
            dir().files(),
            &["Island.png", "abc_front.JPG", "back.bmp", "zeta_abc.png"]
        );
    }

    #[test]
    fn substring_match_is_case_sensitive_and_ordered() {
        let d = dir();
        assert_eq!(d.resolve("abc", MatchMode::Substring), Some("abc_front.JPG"));
        assert_eq!(d.resolve("ABC", MatchMode::Substring), None);
        assert_eq!(d.candidates("abc", MatchMode::Substring).count(), 2);
        assert_eq!(d.resolve("notes", MatchMode::Substring), None);
        assert_eq!(d.resolve("", MatchMode::Substring), None);
    }

    #[test]
    fn resolution_is_idempotent() {
        let d = dir();
        let first = d.resolve("abc", MatchMode::Substring);
        for _ in 0..4 {
            assert_eq!(d.resolve("abc", MatchMode::Substring), first);
        }
    }

    #[test]
    fn exact_match_needs_the_whole_name() {
        let d = dir();
        assert_eq!(d.resolve("Island.png", MatchMode::Exact), Some("Island.png"));
        assert_eq!(d.resolve("Island", MatchMode::Exact), None);
        assert_eq!(d.resolve("notes.txt", MatchMode::Exact), None);
        assert_eq!(d.path_of("Island.png"), PathBuf::from("fronts").join("Island.png"));
    }

    #[test]
    fn preflight_reports_every_missing_slot() {
        let table = SlotTable::from_slots(vec![
            Some("abc".to_string()),
            None,
            Some("nope".to_string()),
            Some("back".to_string()),
            Some("gone".to_string()),
        ]);
        let err = preflight(&table, &dir(), MatchMode::Substring).unwrap_err();
        assert_eq!(
            err.unresolved(),
            &[
                UnresolvedSlot {
                    slot: 2,
                    identity: "nope".to_string()
                },
                UnresolvedSlot {
                    slot: 4,
                    identity: "gone".to_string()
                },
            ]
        );
    }

    #[test]
    fn preflight_maps_slots_to_paths() {
        let table = SlotTable::from_slots(vec![
            Some("abc".to_string()),
            None,
            Some("abc".to_string()),
            Some("back".to_string()),
        ]);
        let ok = preflight(&table, &dir(), MatchMode::Substring).unwrap();
        assert_eq!(ok.len(), 3);
        assert_eq!(ok.unique_assets(), 2);
        assert_eq!(ok.get(1), None);
        assert_eq!(
            ok.get(3),
            Some(PathBuf::from("fronts").join("back.bmp").as_path())
        );
    }
}
