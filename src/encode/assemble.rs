use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use lopdf::{Document, Object, ObjectId, dictionary};

use crate::compose::merge::inherit_page_attributes;
use crate::encode::TempFileGuard;
use crate::encode::compress::PageOutput;
use crate::foundation::error::{SheetError, SheetResult};

/// Concatenate single-page documents, in the order given, into one document.
pub fn concat_pages<'a>(pages: impl IntoIterator<Item = &'a [u8]>) -> SheetResult<Document> {
    let mut out = Document::with_version("1.5");
    let pages_id = out.new_object_id();
    let mut kids = Vec::new();

    for bytes in pages {
        let mut doc = Document::load_mem(bytes)?;
        for id in doc.get_pages().into_values() {
            inherit_page_attributes(&mut doc, id)?;
        }
        doc.renumber_objects_with(out.max_id + 1);
        out.max_id = doc
            .objects
            .keys()
            .map(|(id, _)| *id)
            .fold(out.max_id, u32::max);

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for (id, mut object) in std::mem::take(&mut doc.objects) {
            let kind = type_of(&object).map(<[u8]>::to_vec).unwrap_or_default();
            match kind.as_slice() {
                b"Catalog" | b"Pages" | b"ObjStm" | b"XRef" | b"Outlines" | b"Outline" => continue,
                b"Page" => {
                    if let Object::Dictionary(dict) = &mut object {
                        dict.set("Parent", pages_id);
                    }
                }
                _ => {}
            }
            out.objects.insert(id, object);
        }
        kids.extend(page_ids.into_iter().map(Object::Reference));
    }

    if kids.is_empty() {
        return Err(SheetError::validation("no pages to assemble"));
    }

    let count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);
    out.prune_objects();
    out.renumber_objects();
    out.compress();
    Ok(out)
}

fn type_of(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

pub fn ensure_parent_dir(path: &Path) -> SheetResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Save `doc` to `path` through a sibling temp file, so `path` is either absent or complete.
pub fn write_document(doc: &mut Document, path: &Path) -> SheetResult<()> {
    ensure_parent_dir(path)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| SheetError::validation("output path has no file name"))?;
    let tmp = path.with_file_name(format!(
        ".{}.{}.partial",
        file_name.to_string_lossy(),
        std::process::id()
    ));
    let mut guard = TempFileGuard(Some(tmp.clone()));

    let file =
        std::fs::File::create(&tmp).with_context(|| format!("create '{}'", tmp.display()))?;
    let mut w = std::io::BufWriter::new(file);
    doc.save_to(&mut w)
        .with_context(|| format!("write '{}'", tmp.display()))?;
    w.flush().with_context(|| format!("flush '{}'", tmp.display()))?;
    drop(w);

    std::fs::rename(&tmp, path)
        .with_context(|| format!("move output into place at '{}'", path.display()))?;
    guard.0 = None;
    Ok(())
}

/// File name of a retained page, 1-based: `page_001.pdf`.
pub fn page_file_name(index: usize) -> String {
    format!("page_{:03}.pdf", index + 1)
}

/// Keep each page under `dir/uncompressed` and `dir/compressed`.
///
/// A page that was not recompressed is stored unchanged in both places.
pub fn write_intermediates(dir: &Path, pages: &[PageOutput]) -> SheetResult<Vec<PathBuf>> {
    let plain = dir.join("uncompressed");
    let packed = dir.join("compressed");
    for sub in [&plain, &packed] {
        std::fs::create_dir_all(sub).with_context(|| format!("create '{}'", sub.display()))?;
    }

    let mut written = Vec::with_capacity(pages.len() * 2);
    for page in pages {
        let name = page_file_name(page.index);
        for (path, bytes) in [
            (plain.join(&name), page.original.as_slice()),
            (packed.join(&name), page.final_bytes()),
        ] {
            std::fs::write(&path, bytes).with_context(|| format!("write '{}'", path.display()))?;
            written.push(path);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::merge::{Template, render_sheet};
    use crate::foundation::core::PageSize;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "cardsheet_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn sheets(n: usize) -> Vec<Vec<u8>> {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        (0..n)
            .map(|i| render_sheet(&t, &[], i).unwrap().bytes)
            .collect()
    }

    #[test]
    fn concatenation_keeps_every_page() {
        let pages = sheets(3);
        let mut doc = concat_pages(pages.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(doc.get_pages().len(), 3);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        let reloaded = Document::load_mem(&buf).unwrap();
        assert_eq!(reloaded.get_pages().len(), 3);
        for id in reloaded.get_pages().values() {
            let page = reloaded.get_dictionary(*id).unwrap();
            assert!(page.has(b"MediaBox"));
        }
    }

    #[test]
    fn nothing_to_assemble_is_an_error() {
        assert!(concat_pages(std::iter::empty()).is_err());
    }

    #[test]
    fn output_is_written_atomically() {
        let dir = temp_dir("assemble_atomic");
        let out = dir.join("nested").join("deck.pdf");
        let pages = sheets(1);
        let mut doc = concat_pages(pages.iter().map(Vec::as_slice)).unwrap();
        write_document(&mut doc, &out).unwrap();

        assert!(out.exists());
        let leftovers: Vec<_> = std::fs::read_dir(out.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn intermediates_mirror_uncompressed_pages() {
        let dir = temp_dir("assemble_keep");
        let pages = vec![
            PageOutput {
                index: 0,
                original: b"one".to_vec(),
                compressed: None,
            },
            PageOutput {
                index: 1,
                original: b"two".to_vec(),
                compressed: Some(b"2".to_vec()),
            },
        ];
        let written = write_intermediates(&dir, &pages).unwrap();
        assert_eq!(written.len(), 4);
        assert_eq!(
            std::fs::read(dir.join("compressed").join("page_001.pdf")).unwrap(),
            std::fs::read(dir.join("uncompressed").join("page_001.pdf")).unwrap()
        );
        assert_eq!(
            std::fs::read(dir.join("compressed").join("page_002.pdf")).unwrap(),
            b"2"
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
