use lopdf::{Document, Object, ObjectId};

use super::content::OverlayBuilder;
use super::fonts::{LabelFont, FONT_RESOURCE};
use super::resources::{append_overlay, append_page, materialize_inherited, media_box, register_font};
use crate::error::LabelError;
use crate::slots::{Sheet, SlotTemplate};

/// Reduce the document to its first page and return that page's id.
fn keep_first_page(doc: &mut Document) -> Result<ObjectId, LabelError> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(LabelError::UnsupportedTemplate("template has no pages".to_string()));
    }

    if page_count > 1 {
        log::info!("Template has {} pages; only the first is used", page_count);
        let extra: Vec<u32> = (2..=page_count).collect();
        doc.delete_pages(&extra);
        doc.prune_objects();
    }

    doc.get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| LabelError::UnsupportedTemplate("template has no pages".to_string()))
}

fn warn_outside_page(template: &SlotTemplate, media_box: [f32; 4]) {
    let [llx, lly, urx, ury] = media_box;
    for (ordinal, slot) in template.slots.iter().enumerate() {
        if slot.x < llx || slot.x > urx || slot.y < lly || slot.y > ury {
            log::warn!(
                "Slot {} of template '{}' at ({}, {}) lies outside the page [{} {} {} {}]",
                ordinal,
                template.name,
                slot.x,
                slot.y,
                llx,
                lly,
                urx,
                ury
            );
        }
    }
}

/// Merge each sheet's overlay onto a copy of the background's first page.
///
/// Sheet 0 is drawn on the background page itself; later sheets go on
/// clones of the untouched page, appended in order.
pub fn compose(
    background: &Document,
    template: &SlotTemplate,
    sheets: &[Sheet<'_>],
    font: &LabelFont,
) -> Result<Document, LabelError> {
    if sheets.is_empty() {
        return Err(LabelError::NoInputValues);
    }

    let mut output_doc = background.clone();
    let page_id = keep_first_page(&mut output_doc)?;
    materialize_inherited(&mut output_doc, page_id)?;
    warn_outside_page(template, media_box(&output_doc, page_id)?);

    let font_id = font.install(&mut output_doc)?;
    let base_page = output_doc.get_dictionary(page_id)?.clone();
    let parent_id = base_page
        .get(b"Parent")
        .and_then(Object::as_reference)
        .map_err(|_| LabelError::UnsupportedTemplate("page is not attached to a page tree".to_string()))?;

    for (index, sheet) in sheets.iter().enumerate() {
        let target_id = if index == 0 {
            page_id
        } else {
            let copy_id = output_doc.add_object(Object::Dictionary(base_page.clone()));
            append_page(&mut output_doc, parent_id, copy_id)?;
            copy_id
        };

        let overlay = OverlayBuilder::for_sheet(FONT_RESOURCE, font.encoding(), sheet);
        append_overlay(&mut output_doc, target_id, overlay.build_stream()?)?;
        register_font(&mut output_doc, target_id, FONT_RESOURCE, font_id)?;
    }

    log::info!("Composed {} page(s) on template '{}'", sheets.len(), template.name);
    Ok(output_doc)
}

/// Serialize a document to PDF bytes
pub fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>, LabelError> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}
