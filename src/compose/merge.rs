use std::path::Path;

use anyhow::Context as _;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::compose::overlay::Overlay;
use crate::foundation::core::{PageSize, Point};
use crate::foundation::error::{SheetError, SheetResult};

/// The cut-line template page that every sheet is drawn on.
///
/// Holds a private single-page document. [`merge`] only ever works on a clone of it, so one
/// template can back any number of pages (and threads).
#[derive(Clone, Debug)]
pub struct Template {
    doc: Document,
    page_id: ObjectId,
    size: PageSize,
    origin: Point,
}

impl Template {
    pub fn from_path(path: impl AsRef<Path>) -> SheetResult<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("read template '{}'", path.display()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> SheetResult<Self> {
        Self::from_document(Document::load_mem(bytes)?)
    }

    /// Take the first page of `doc` as the template. Extra pages are dropped with a warning.
    pub fn from_document(mut doc: Document) -> SheetResult<Self> {
        let pages = doc.get_pages();
        let Some(&page_id) = pages.values().next() else {
            return Err(SheetError::validation("template document has no pages"));
        };
        if pages.len() > 1 {
            tracing::warn!(pages = pages.len(), "template has several pages; using the first");
        }

        inherit_page_attributes(&mut doc, page_id)?;
        isolate_page(&mut doc, page_id)?;

        let (size, origin) = media_box(doc.get_dictionary(page_id)?)?;
        Ok(Self {
            doc,
            page_id,
            size,
            origin,
        })
    }

    /// An empty page of the given size, for runs without a template file.
    pub fn blank(size: PageSize) -> SheetResult<Self> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(size.width as f32),
                Object::Real(size.height as f32),
            ],
            "Resources" => dictionary! {},
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Self::from_document(doc)
    }

    /// Page size taken from the template's MediaBox.
    pub fn page_size(&self) -> PageSize {
        self.size
    }

    /// Lower-left corner of the MediaBox; overlays are drawn relative to it.
    pub fn origin(&self) -> Point {
        self.origin
    }
}

/// Copy `Resources`, `MediaBox`, `CropBox` and `Rotate` from the page tree onto the page itself
/// when the page only inherits them.
pub(crate) fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) -> SheetResult<()> {
    const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

    let mut found: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        let mut missing: Vec<&[u8]> = INHERITABLE
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(id) = parent {
            if missing.is_empty() || depth > 64 {
                break;
            }
            let Ok(node) = doc.get_dictionary(id) else {
                break;
            };
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    found.push((*key, value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if found.is_empty() {
        return Ok(());
    }
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in found {
        page.set(key, value);
    }
    Ok(())
}

/// Point the catalog at a fresh page tree holding only `page_id`, then drop what is unreachable.
fn isolate_page(doc: &mut Document, page_id: ObjectId) -> SheetResult<()> {
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => Object::Integer(1),
    });
    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Parent", pages_id);
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
    doc.get_object_mut(root)?.as_dict_mut()?.set("Pages", pages_id);
    doc.prune_objects();
    Ok(())
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn media_box(page: &Dictionary) -> SheetResult<(PageSize, Point)> {
    let Ok(raw) = page.get(b"MediaBox").and_then(Object::as_array) else {
        tracing::warn!("template page has no MediaBox; assuming US Letter landscape");
        return Ok((PageSize::LETTER_LANDSCAPE, Point::ZERO));
    };
    let coords: Vec<f64> = raw.iter().filter_map(number).collect();
    let [x0, y0, x1, y1] = coords[..] else {
        return Err(SheetError::validation(
            "template MediaBox must hold four numbers",
        ));
    };
    let size = PageSize::new((x1 - x0).abs(), (y1 - y0).abs())?;
    Ok((size, Point::new(x0.min(x1), y0.min(y1))))
}

fn inline_dict(doc: &Document, obj: Option<&Object>) -> SheetResult<Dictionary> {
    match obj {
        None => Ok(Dictionary::new()),
        Some(Object::Dictionary(d)) => Ok(d.clone()),
        Some(Object::Reference(id)) => Ok(doc.get_dictionary(*id)?.clone()),
        Some(_) => Err(SheetError::validation(
            "page resources must be a dictionary or a reference to one",
        )),
    }
}

fn embed_overlay(doc: &mut Document, overlay: &Overlay) -> SheetResult<ObjectId> {
    let mut images = Dictionary::new();
    for entry in overlay.images() {
        let (mut stream, mask) = entry.image.to_streams();
        if let Some(mask) = mask {
            let mask_id = doc.add_object(mask);
            stream.dict.set("SMask", mask_id);
        }
        let image_id = doc.add_object(stream);
        images.set(entry.name.as_bytes(), image_id);
    }

    let page = overlay.page_size();
    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width as f32),
                Object::Real(page.height as f32),
            ],
            "Resources" => dictionary! { "XObject" => images },
        },
        overlay.content_bytes()?,
    );
    Ok(doc.add_object(form))
}

fn unused_name(xobjects: &Dictionary, next: &mut usize) -> String {
    loop {
        let name = format!("Ov{next}");
        *next += 1;
        if !xobjects.has(name.as_bytes()) {
            return name;
        }
    }
}

/// Layer `layers` over a copy of the template page, in order, and return the new document.
///
/// The template's own content is wrapped in `q`/`Q` so its graphics state cannot leak into the
/// layers; each layer is a Form XObject painted at the MediaBox origin. `template` is never
/// modified.
pub fn merge(template: &Template, layers: &[Overlay]) -> SheetResult<Document> {
    let mut doc = template.doc.clone();
    let page_id = template.page_id;

    let (mut resources, existing) = {
        let page = doc.get_dictionary(page_id)?;
        let resources = inline_dict(&doc, page.get(b"Resources").ok())?;
        let existing = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(item @ Object::Reference(_)) => vec![item.clone()],
            _ => Vec::new(),
        };
        (resources, existing)
    };
    let mut xobjects = inline_dict(&doc, resources.get(b"XObject").ok())?;

    let mut invoke = Vec::new();
    let mut next = 0;
    for layer in layers.iter().filter(|l| !l.is_empty()) {
        let form_id = embed_overlay(&mut doc, layer)?;
        let name = unused_name(&xobjects, &mut next);
        xobjects.set(name.as_bytes(), form_id);
        invoke.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(template.origin.x as f32),
                    Object::Real(template.origin.y as f32),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
    }

    if invoke.is_empty() {
        return Ok(doc);
    }

    let open = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let close = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
    let layer_content = Content { operations: invoke }.encode()?;
    let layered = doc.add_object(Stream::new(dictionary! {}, layer_content));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open));
    contents.extend(existing);
    contents.push(Object::Reference(close));
    contents.push(Object::Reference(layered));

    resources.set("XObject", xobjects);
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(doc)
}

/// One finished sheet, serialized.
#[derive(Clone, Debug)]
pub struct SheetPage {
    /// 0-based page index in partition order.
    pub index: usize,
    /// Single-page PDF bytes.
    pub bytes: Vec<u8>,
}

/// Merge `layers` onto the template and serialize the result as page `index`.
pub fn render_sheet(
    template: &Template,
    layers: &[Overlay],
    index: usize,
) -> SheetResult<SheetPage> {
    let mut doc = merge(template, layers)?;
    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .with_context(|| format!("serialize sheet {}", index + 1))?;
    Ok(SheetPage { index, bytes })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assets::decode::decode_image;
    use crate::compose::guides::{EdgeGuides, GuidesConfig};
    use crate::compose::overlay::OverlayComposer;
    use crate::layout::anchors::AnchorSet;
    use crate::layout::placement::default_target_width_pt;

    fn png_bytes(alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 6, image::Rgba([200, 10, 10, alpha]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn composer(template: &Template) -> OverlayComposer {
        OverlayComposer::new(
            AnchorSet::letter_landscape(),
            default_target_width_pt(),
            template.page_size(),
        )
    }

    fn page_contents(doc: &Document) -> Vec<Object> {
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone()
    }

    fn xobject_names(doc: &Document) -> Vec<Vec<u8>> {
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        resources
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    #[test]
    fn blank_template_is_letter_landscape() {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        assert_eq!(t.page_size(), PageSize::LETTER_LANDSCAPE);
        assert_eq!(t.origin(), Point::ZERO);
    }

    #[test]
    fn template_is_untouched_between_pages() {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        let image = Arc::new(decode_image(&png_bytes(255)).unwrap());
        let cards = composer(&t).compose_repeated(image).unwrap();

        let before = t.doc.objects.len();
        let first = merge(&t, std::slice::from_ref(&cards)).unwrap();
        let second = merge(&t, std::slice::from_ref(&cards)).unwrap();
        assert_eq!(t.doc.objects.len(), before);

        // Each merge sees one layer only, never the previous page's.
        assert_eq!(xobject_names(&first), vec![b"Ov0".to_vec()]);
        assert_eq!(xobject_names(&second), vec![b"Ov0".to_vec()]);
    }

    #[test]
    fn layers_stack_in_order_after_the_template() {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        let image = Arc::new(decode_image(&png_bytes(128)).unwrap());
        let c = composer(&t);
        let cards = c.compose_repeated(image).unwrap();
        let guides = c
            .compose_guides(&GuidesConfig {
                edges: Some(EdgeGuides::default()),
                ..Default::default()
            })
            .unwrap();

        let doc = merge(&t, &[cards, guides]).unwrap();
        let contents = page_contents(&doc);
        // q, template content, Q, layer invocations
        assert_eq!(contents.len(), 4);
        let last = contents[3].as_reference().unwrap();
        let stream = doc.get_object(last).unwrap().as_stream().unwrap();
        let text = String::from_utf8(stream.content.clone()).unwrap();
        let ov0 = text.find("/Ov0 Do").unwrap();
        let ov1 = text.find("/Ov1 Do").unwrap();
        assert!(ov0 < ov1);
    }

    #[test]
    fn translucent_images_carry_a_soft_mask() {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        let image = Arc::new(decode_image(&png_bytes(10)).unwrap());
        let cards = composer(&t).compose_repeated(image).unwrap();
        let doc = merge(&t, &[cards]).unwrap();

        let masked = doc.objects.values().filter_map(|o| o.as_stream().ok()).any(|s| {
            s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(&b"Image"[..])
                && s.dict.has(b"SMask")
        });
        assert!(masked);
    }

    #[test]
    fn no_layers_leaves_the_page_alone() {
        let t = Template::blank(PageSize::LETTER_LANDSCAPE).unwrap();
        let doc = merge(&t, &[]).unwrap();
        assert_eq!(doc.objects.len(), t.doc.objects.len());
    }

    #[test]
    fn multi_page_template_keeps_first_page_and_inherited_box() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..2 {
            let content =
                doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
            kids.push(Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content,
            })));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(2),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Resources" => dictionary! {},
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);

        let t = Template::from_document(doc).unwrap();
        assert_eq!(t.page_size(), PageSize::new(612.0, 792.0).unwrap());
        assert_eq!(t.doc.get_pages().len(), 1);

        let sheet = render_sheet(&t, &[], 0).unwrap();
        let reloaded = Document::load_mem(&sheet.bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }
}
