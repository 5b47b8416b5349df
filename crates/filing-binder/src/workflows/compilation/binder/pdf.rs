use std::collections::BTreeMap;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::{
    AssembledBinder, BinderAssembler, BinderAssemblyError, BinderRequest, BinderSource,
    CancellationFlag,
};

const STAMP_FONT: &str = "FbStamp";
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const REBUILT_TYPES: [&[u8]; 4] = [b"Catalog", b"Pages", b"Outlines", b"Outline"];
const MAX_TREE_DEPTH: usize = 64;

/// lopdf-backed assembler: merges sources in order, bookmarks each entry, stamps page numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfBinderAssembler;

struct MergedPage {
    id: ObjectId,
    dictionary: Dictionary,
}

impl BinderAssembler for PdfBinderAssembler {
    fn assemble(
        &self,
        request: &BinderRequest,
        cancel: &CancellationFlag,
    ) -> Result<AssembledBinder, BinderAssemblyError> {
        let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
        let mut pages: Vec<MergedPage> = Vec::new();
        let mut first_pages: Vec<ObjectId> = Vec::with_capacity(request.sources.len());
        let mut next_id = 1;

        for source in &request.sources {
            cancel.check()?;
            let malformed = |err: lopdf::Error| BinderAssemblyError::Malformed {
                file_id: source.entry.file_id.clone(),
                reason: err.to_string(),
            };

            let mut document = Document::load_mem(&source.bytes).map_err(malformed)?;
            document.renumber_objects_with(next_id);
            next_id = document.max_id + 1;

            let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
            let expected = source.entry.page_count();
            let actual = page_ids.len() as u32;
            if actual != expected {
                return Err(BinderAssemblyError::PageCountMismatch {
                    scope: source.entry.filename.clone(),
                    expected,
                    actual,
                });
            }
            if let Some(first) = page_ids.first() {
                first_pages.push(*first);
            }

            for id in page_ids {
                let dictionary = inherited_page(&document, id).map_err(malformed)?;
                pages.push(MergedPage { id, dictionary });
            }
            objects.extend(
                document
                    .objects
                    .into_iter()
                    .filter(|(_, object)| !is_rebuilt(object)),
            );
        }
        cancel.check()?;

        let mut binder = Document::with_version("1.5");
        binder.objects = objects;
        binder.max_id = next_id - 1;

        let pages_id = binder.new_object_id();
        let font_id = binder.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let save_state_id = binder.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

        let page_count = pages.len();
        let mut kids = Vec::with_capacity(page_count);
        for (index, page) in pages.into_iter().enumerate() {
            let MergedPage { id, mut dictionary } = page;
            let stamp = format!(
                "Q\nBT /{STAMP_FONT} 9 Tf 520 20 Td (Page {}) Tj ET\n",
                index + 1
            );
            let stamp_id = binder.add_object(Stream::new(Dictionary::new(), stamp.into_bytes()));

            let mut contents = vec![Object::Reference(save_state_id)];
            match dictionary.get(b"Contents") {
                Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
                Ok(other) => contents.push(other.clone()),
                Err(_) => {}
            }
            contents.push(Object::Reference(stamp_id));
            dictionary.set("Contents", Object::Array(contents));
            dictionary.set("Parent", pages_id);

            add_stamp_font(&mut binder, &mut dictionary, font_id).map_err(|err| {
                BinderAssemblyError::Malformed {
                    file_id: format!("page {}", index + 1),
                    reason: err.to_string(),
                }
            })?;

            binder.objects.insert(id, Object::Dictionary(dictionary));
            kids.push(Object::Reference(id));
        }

        binder.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );
        let outlines_id = add_outline(&mut binder, &request.sources, &first_pages);
        let catalog_id = binder.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Outlines" => outlines_id,
            "PageMode" => "UseOutlines",
        });
        binder.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        binder
            .save_to(&mut bytes)
            .map_err(|err| BinderAssemblyError::Worker(err.to_string()))?;

        debug!(
            matter_id = %request.matter_id,
            pages = page_count,
            bytes = bytes.len(),
            "binder assembled"
        );
        Ok(AssembledBinder {
            bytes,
            page_count: page_count as u32,
        })
    }
}

fn is_rebuilt(object: &Object) -> bool {
    match object {
        Object::Dictionary(dictionary) => dictionary
            .get(b"Type")
            .and_then(Object::as_name)
            .map(|name| REBUILT_TYPES.contains(&name))
            .unwrap_or(false),
        _ => false,
    }
}

/// Copy of the page dictionary with attributes inherited from the page tree made explicit.
fn inherited_page(document: &Document, page_id: ObjectId) -> Result<Dictionary, lopdf::Error> {
    let mut page = document.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if depth == MAX_TREE_DEPTH {
            break;
        }
        let node = document.get_dictionary(parent_id)?;
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                page.set(key.to_vec(), value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(page)
}

fn add_stamp_font(
    binder: &mut Document,
    page: &mut Dictionary,
    font_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let shared_resources = match page.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let resources = match shared_resources {
        Some(id) => binder.get_object_mut(id)?.as_dict_mut()?,
        None => {
            if !matches!(page.get(b"Resources"), Ok(Object::Dictionary(_))) {
                page.set("Resources", Dictionary::new());
            }
            page.get_mut(b"Resources")?.as_dict_mut()?
        }
    };

    let shared_fonts = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    match shared_fonts {
        Some(id) => {
            binder
                .get_object_mut(id)?
                .as_dict_mut()?
                .set(STAMP_FONT, font_id);
        }
        None => {
            if !matches!(resources.get(b"Font"), Ok(Object::Dictionary(_))) {
                resources.set("Font", Dictionary::new());
            }
            resources
                .get_mut(b"Font")?
                .as_dict_mut()?
                .set(STAMP_FONT, font_id);
        }
    }
    Ok(())
}

fn add_outline(
    binder: &mut Document,
    sources: &[BinderSource],
    first_pages: &[ObjectId],
) -> ObjectId {
    let outlines_id = binder.new_object_id();
    let item_ids: Vec<ObjectId> = first_pages.iter().map(|_| binder.new_object_id()).collect();

    for (index, (source, page_id)) in sources.iter().zip(first_pages).enumerate() {
        let entry = &source.entry;
        let title = format!(
            "{}. {} (pp. {}-{})",
            entry.position, entry.filename, entry.start_page, entry.end_page
        );
        let mut item = dictionary! {
            "Title" => Object::string_literal(title),
            "Parent" => outlines_id,
            "Dest" => vec![Object::Reference(*page_id), Object::Name(b"Fit".to_vec())],
        };
        if index > 0 {
            item.set("Prev", item_ids[index - 1]);
        }
        if let Some(next) = item_ids.get(index + 1) {
            item.set("Next", *next);
        }
        binder.objects.insert(item_ids[index], Object::Dictionary(item));
    }

    let mut outlines = dictionary! {
        "Type" => "Outlines",
        "Count" => item_ids.len() as i64,
    };
    if let (Some(first), Some(last)) = (item_ids.first(), item_ids.last()) {
        outlines.set("First", *first);
        outlines.set("Last", *last);
    }
    binder.objects.insert(outlines_id, Object::Dictionary(outlines));
    outlines_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::compilation::domain::{DocumentType, MatterId};
    use crate::workflows::compilation::planner::TocEntry;

    fn pdf_with_pages(count: u32) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let kids: Vec<Object> = (0..count)
            .map(|_| {
                let content =
                    document.add_object(Stream::new(Dictionary::new(), b"BT ET\n".to_vec()));
                let page = document.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content,
                });
                Object::Reference(page)
            })
            .collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(count),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }),
        );
        let catalog = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("fixture saves");
        bytes
    }

    fn source(position: usize, start_page: u32, pages: u32) -> BinderSource {
        BinderSource {
            entry: TocEntry {
                position,
                file_id: format!("f-{position}"),
                document_type: DocumentType::from("exhibit"),
                filename: format!("exhibit-{position}.pdf"),
                section_id: None,
                start_page,
                end_page: start_page + pages - 1,
                page_count_estimated: false,
            },
            bytes: pdf_with_pages(pages),
        }
    }

    #[test]
    fn merges_sources_with_bookmarks() {
        let request = BinderRequest {
            matter_id: MatterId::new("m-1"),
            filename: "m-1-binder.pdf".to_string(),
            sources: vec![source(1, 1, 1), source(2, 2, 2)],
        };

        let binder = PdfBinderAssembler
            .assemble(&request, &CancellationFlag::default())
            .expect("binder assembles");
        assert_eq!(binder.page_count, 3);

        let merged = Document::load_mem(&binder.bytes).expect("binder parses");
        assert_eq!(merged.get_pages().len(), 3);
        let catalog_id = merged
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .expect("catalog reference");
        let catalog = merged.get_dictionary(catalog_id).expect("catalog");
        let outlines_id = catalog
            .get(b"Outlines")
            .and_then(Object::as_reference)
            .expect("outline root");
        let outlines = merged.get_dictionary(outlines_id).expect("outlines");
        assert_eq!(
            outlines.get(b"Count").and_then(Object::as_i64).expect("count"),
            2
        );
    }

    #[test]
    fn rejects_unparseable_sources() {
        let mut broken = source(1, 1, 1);
        broken.bytes = b"not a pdf".to_vec();
        let request = BinderRequest {
            matter_id: MatterId::new("m-1"),
            filename: "m-1-binder.pdf".to_string(),
            sources: vec![broken],
        };

        let error = PdfBinderAssembler
            .assemble(&request, &CancellationFlag::default())
            .expect_err("garbage is rejected");
        assert!(matches!(error, BinderAssemblyError::Malformed { .. }));
    }

    #[test]
    fn page_count_must_match_the_plan() {
        let mut mismatched = source(1, 1, 2);
        mismatched.entry.end_page = 1;
        let request = BinderRequest {
            matter_id: MatterId::new("m-1"),
            filename: "m-1-binder.pdf".to_string(),
            sources: vec![mismatched],
        };

        let error = PdfBinderAssembler
            .assemble(&request, &CancellationFlag::default())
            .expect_err("mismatch is rejected");
        assert!(matches!(
            error,
            BinderAssemblyError::PageCountMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }
}
