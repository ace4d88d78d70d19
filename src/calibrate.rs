//! Calibration sheets: print a template's slot positions on plain A4 so
//! they can be laid over a physical label sheet and checked by eye.

use printpdf::{BuiltinFont, Color, Greyscale, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb};

use crate::config::Dimension;
use crate::error::LabelError;
use crate::slots::{Paging, SlotTemplate};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);

/// Half the arm length of an anchor cross, in points
const CROSS_ARM: f32 = 4.0;

/// PDF points to millimetres
fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn segment(layer: &PdfLayerReference, from: (Mm, Mm), to: (Mm, Mm)) {
    layer.add_line(Line {
        points: vec![(Point::new(from.0, from.1), false), (Point::new(to.0, to.1), false)],
        is_closed: false,
    });
}

fn draw_grid(layer: &PdfLayerReference, font: &IndirectFontRef, spacing: Mm) {
    layer.set_outline_color(Color::Greyscale(Greyscale::new(0.8, None)));
    layer.set_outline_thickness(0.2);

    let mut x = 0.0;
    while x <= PAGE_WIDTH.0 {
        segment(layer, (Mm(x), Mm(0.0)), (Mm(x), PAGE_HEIGHT));
        layer.use_text(format!("{:.0}", x), 5.0, Mm(x + 0.5), Mm(1.0), font);
        x += spacing.0;
    }
    let mut y = 0.0;
    while y <= PAGE_HEIGHT.0 {
        segment(layer, (Mm(0.0), Mm(y)), (PAGE_WIDTH, Mm(y)));
        layer.use_text(format!("{:.0}", y), 5.0, Mm(0.5), Mm(y + 0.5), font);
        y += spacing.0;
    }
}

/// Render an A4 page marking every slot of `template`.
///
/// Each slot gets a cross at its text anchor, its ordinal and field index,
/// and the outline of its mask box if it has one. A light grid at
/// `grid` spacing, labelled in millimetres, sits underneath.
pub fn calibration_sheet(template: &SlotTemplate, grid: Dimension) -> Result<Vec<u8>, LabelError> {
    if grid.as_points() <= 0.0 {
        return Err(LabelError::PdfGeneration(format!(
            "grid spacing must be positive, got {} pt",
            grid.as_points()
        )));
    }

    let title = format!("Calibration: {}", template.name);
    let (doc, page, layer) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Slots");
    let layer = doc.get_page(page).get_layer(layer);

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| LabelError::PdfGeneration(e.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| LabelError::PdfGeneration(e.to_string()))?;

    draw_grid(&layer, &font, Mm(grid.as_mm() as f32));

    layer.use_text(&title, 12.0, Mm(15.0), Mm(288.0), &font_bold);
    layer.use_text(template.description, 8.0, Mm(15.0), Mm(283.0), &font);

    layer.set_outline_color(Color::Rgb(Rgb::new(0.85, 0.1, 0.1, None)));
    layer.set_outline_thickness(0.6);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.85, 0.1, 0.1, None)));

    for (ordinal, slot) in template.slots.iter().enumerate() {
        let (x, y) = (slot.x, slot.y);
        segment(&layer, (mm(x - CROSS_ARM), mm(y)), (mm(x + CROSS_ARM), mm(y)));
        segment(&layer, (mm(x), mm(y - CROSS_ARM)), (mm(x), mm(y + CROSS_ARM)));

        let marker = match template.paging {
            Paging::Repeat => format!("#{} f{}", ordinal, template.field_index(ordinal, template.field_count)),
            Paging::Sequential => format!("#{}", ordinal),
        };
        layer.use_text(marker, 6.0, mm(x + CROSS_ARM + 1.0), mm(y + 1.0), &font);

        if let Some(mask) = &slot.mask {
            let (left, bottom) = (x - mask.offset, y - mask.offset);
            let (right, top) = (left + mask.width, bottom + mask.height);
            layer.add_line(Line {
                points: vec![
                    (Point::new(mm(left), mm(bottom)), false),
                    (Point::new(mm(right), mm(bottom)), false),
                    (Point::new(mm(right), mm(top)), false),
                    (Point::new(mm(left), mm(top)), false),
                ],
                is_closed: true,
            });
        }
    }

    doc.save_to_bytes()
        .map_err(|e| LabelError::PdfGeneration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{DISPATCH_4, SCRAP};

    #[test]
    fn test_points_to_mm() {
        assert!((mm(72.0).0 - 25.4).abs() < 1e-4);
        assert!((mm(595.28).0 - 210.0).abs() < 0.01);
    }

    #[test]
    fn test_calibration_sheet_is_single_a4_page() {
        let bytes = calibration_sheet(&DISPATCH_4, Dimension(28.35)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let mut doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().unwrap();
        crate::pdf::resources::materialize_inherited(&mut doc, page_id).unwrap();
        let [_, _, width, height] = crate::pdf::resources::media_box(&doc, page_id).unwrap();
        assert!((width - 595.28).abs() < 0.5);
        assert!((height - 841.89).abs() < 0.5);
    }

    #[test]
    fn test_calibration_sheet_with_masks() {
        assert!(calibration_sheet(&SCRAP, Dimension(72.0)).is_ok());
    }

    #[test]
    fn test_calibration_rejects_zero_grid() {
        let err = calibration_sheet(&SCRAP, Dimension(0.0)).unwrap_err();
        assert!(matches!(err, LabelError::PdfGeneration(_)));
    }
}
