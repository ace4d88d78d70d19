use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::LabelError;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic Parent chains in broken files
const MAX_TREE_DEPTH: usize = 64;

fn parent_of(dict: &Dictionary) -> Option<ObjectId> {
    dict.get(b"Parent").and_then(Object::as_reference).ok()
}

/// Copy inherited attributes from the page tree onto the page itself.
///
/// Cloned pages can then be re-parented without losing their size or fonts.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), LabelError> {
    let page = doc.get_dictionary(page_id)?;
    let mut found: Vec<(&[u8], Object)> = Vec::new();
    let mut missing: Vec<&[u8]> = INHERITABLE.iter().copied().filter(|key| !page.has(key)).collect();

    let mut parent = parent_of(page);
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if missing.is_empty() || depth == MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_dictionary(parent_id)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
        depth += 1;
    }

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in found {
        page.set(key, value);
    }
    Ok(())
}

/// Page MediaBox as [llx, lly, urx, ury].
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], LabelError> {
    let unsupported = || LabelError::UnsupportedTemplate("page has no usable MediaBox".to_string());

    let page = doc.get_dictionary(page_id)?;
    let mut value = page.get(b"MediaBox").map_err(|_| unsupported())?;
    if let Object::Reference(id) = value {
        value = doc.get_object(*id)?;
    }
    let values = value.as_array().map_err(|_| unsupported())?;
    if values.len() != 4 {
        return Err(unsupported());
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = value.as_float().map_err(|_| unsupported())?;
    }
    Ok(rect)
}

/// Register `font_id` under `resource_name` in the page's font resources.
///
/// Shared resource dictionaries are updated in place. A referenced Font
/// subdictionary is copied inline first so other users of it are untouched.
pub fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    resource_name: &str,
    font_id: ObjectId,
) -> Result<(), LabelError> {
    let resources = doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();

    let with_font = |doc: &Document, res: &Dictionary| -> Dictionary {
        let mut fonts = match res.get(b"Font") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
            Ok(Object::Dictionary(d)) => d.clone(),
            _ => Dictionary::new(),
        };
        fonts.set(resource_name, Object::Reference(font_id));
        fonts
    };

    match resources {
        Some(Object::Reference(res_id)) => {
            let fonts = with_font(doc, doc.get_dictionary(res_id)?);
            doc.get_dictionary_mut(res_id)?.set("Font", fonts);
        }
        Some(Object::Dictionary(mut res)) => {
            let fonts = with_font(doc, &res);
            res.set("Font", fonts);
            doc.get_dictionary_mut(page_id)?.set("Resources", res);
        }
        _ => {
            let mut res = Dictionary::new();
            res.set("Font", with_font(doc, &Dictionary::new()));
            doc.get_dictionary_mut(page_id)?.set("Resources", res);
        }
    }
    Ok(())
}

/// Draw `overlay` on top of the page's existing content.
///
/// The existing content is bracketed by q/Q so any graphics state it
/// leaves behind does not shift the overlay.
pub fn append_overlay(doc: &mut Document, page_id: ObjectId, overlay: Stream) -> Result<(), LabelError> {
    let unsupported = || LabelError::UnsupportedTemplate("page Contents is neither a stream nor an array".to_string());

    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned() {
        None => Vec::new(),
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Array(items) => items.clone(),
            Object::Stream(_) => vec![Object::Reference(id)],
            _ => return Err(unsupported()),
        },
        Some(_) => return Err(unsupported()),
    };

    let overlay_id = doc.add_object(overlay);
    let contents = if existing.is_empty() {
        vec![Object::Reference(overlay_id)]
    } else {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(overlay_id));
        contents
    };

    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

/// Insert `page_id` as the last kid of `parent_id`, updating Count up the tree.
pub fn append_page(doc: &mut Document, parent_id: ObjectId, page_id: ObjectId) -> Result<(), LabelError> {
    doc.get_dictionary_mut(page_id)?.set("Parent", Object::Reference(parent_id));

    let parent = doc.get_dictionary_mut(parent_id)?;
    let mut kids = parent
        .get(b"Kids")
        .and_then(Object::as_array)
        .cloned()
        .unwrap_or_default();
    kids.push(Object::Reference(page_id));
    parent.set("Kids", kids);

    let mut node = Some(parent_id);
    let mut depth = 0;
    while let Some(node_id) = node {
        if depth == MAX_TREE_DEPTH {
            break;
        }
        let dict = doc.get_dictionary_mut(node_id)?;
        let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        dict.set("Count", count + 1);
        node = parent_of(dict);
        depth += 1;
    }
    Ok(())
}
