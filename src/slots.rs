//! Slot tables for the supported label sheets.
//!
//! Every template is a fixed list of anchor points in PDF user space
//! (points, origin bottom-left) matching a physical, pre-printed sheet.
//! Values are handed to slots positionally:
//! - repeating templates fill every slot on a single sheet, slot `k`
//!   taking `values[k % values.len()]`
//! - sequential templates hand out one value per slot and start a new
//!   sheet once all slots are used

use crate::error::LabelError;

/// Font size for dispatch label text
pub const DISPATCH_FONT_SIZE: f32 = 10.0;

/// Font size for scrap numbers
pub const SCRAP_FONT_SIZE: f32 = 58.0;

/// Opaque box painted under a slot's text to hide pre-printed content.
///
/// The box's lower-left corner sits `offset` points left of and below the
/// text anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskBox {
    pub width: f32,
    pub height: f32,
    pub offset: f32,
}

/// Covers the placeholder number printed on the scrap sheet
pub const SCRAP_MASK: MaskBox = MaskBox {
    width: 80.0,
    height: 75.0,
    offset: 5.0,
};

/// One writable position on a label sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub x: f32,
    pub y: f32,
    /// Overrides the template's font size
    pub font_size: Option<f32>,
    pub mask: Option<MaskBox>,
}

impl Slot {
    const fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            font_size: None,
            mask: None,
        }
    }

    const fn masked(x: f32, y: f32, mask: MaskBox) -> Self {
        Self {
            x,
            y,
            font_size: None,
            mask: Some(mask),
        }
    }
}

/// How a value list is spread over a template's slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// One sheet; values wrap around to fill every slot
    Repeat,
    /// One value per slot, one sheet per `slots_per_sheet` values
    Sequential,
}

#[derive(Debug)]
pub struct SlotTemplate {
    pub name: &'static str,
    pub description: &'static str,
    /// Number of distinct values the sheet was laid out for
    pub field_count: usize,
    pub font_size: f32,
    pub paging: Paging,
    pub slots: &'static [Slot],
}

/// A value bound to a slot, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement<'a> {
    pub ordinal: usize,
    pub slot: &'a Slot,
    pub text: &'a str,
    pub font_size: f32,
}

/// Placements destined for one output page.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet<'a> {
    pub placements: Vec<Placement<'a>>,
}

impl SlotTemplate {
    pub fn slots_per_sheet(&self) -> usize {
        self.slots.len()
    }

    /// Index of the value feeding slot `ordinal` when `value_count` values
    /// are supplied.
    pub fn field_index(&self, ordinal: usize, value_count: usize) -> usize {
        ordinal % value_count
    }

    /// Number of output pages `value_count` values produce.
    pub fn sheet_count(&self, value_count: usize) -> usize {
        match self.paging {
            Paging::Repeat => usize::from(value_count > 0),
            Paging::Sequential => value_count.div_ceil(self.slots_per_sheet()),
        }
    }

    fn placement<'a>(&'a self, ordinal: usize, slot: &'a Slot, text: &'a str) -> Placement<'a> {
        Placement {
            ordinal,
            slot,
            text,
            font_size: slot.font_size.unwrap_or(self.font_size),
        }
    }

    /// Bind values to slots, one `Sheet` per output page.
    pub fn assign<'a, S: AsRef<str>>(&'a self, values: &'a [S]) -> Result<Vec<Sheet<'a>>, LabelError> {
        if values.is_empty() {
            return Err(LabelError::NoInputValues);
        }

        match self.paging {
            Paging::Repeat => {
                if values.len() != self.field_count {
                    log::warn!(
                        "Template '{}' is laid out for {} fields but {} values were supplied; values will wrap",
                        self.name,
                        self.field_count,
                        values.len()
                    );
                }
                let placements = self
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(ordinal, slot)| {
                        let text = values[self.field_index(ordinal, values.len())].as_ref();
                        self.placement(ordinal, slot, text)
                    })
                    .collect();
                Ok(vec![Sheet { placements }])
            }
            Paging::Sequential => Ok(values
                .chunks(self.slots_per_sheet())
                .map(|chunk| Sheet {
                    placements: chunk
                        .iter()
                        .zip(self.slots)
                        .enumerate()
                        .map(|(ordinal, (value, slot))| self.placement(ordinal, slot, value.as_ref()))
                        .collect(),
                })
                .collect()),
        }
    }
}

// Eight labels in a 2 x 4 grid. Per label: customer, product, litho, PO.
const DISPATCH_4_SLOTS: [Slot; 32] = [
    Slot::at(109.33, 781.51),
    Slot::at(109.35, 762.71),
    Slot::at(109.33, 743.10),
    Slot::at(109.33, 706.16),
    Slot::at(407.84, 781.51),
    Slot::at(405.16, 762.19),
    Slot::at(405.15, 743.09),
    Slot::at(405.15, 706.16),
    Slot::at(109.33, 570.31),
    Slot::at(109.34, 553.29),
    Slot::at(109.32, 533.69),
    Slot::at(109.33, 496.80),
    Slot::at(405.15, 570.31),
    Slot::at(405.15, 553.29),
    Slot::at(405.14, 533.69),
    Slot::at(405.15, 496.80),
    Slot::at(109.33, 358.48),
    Slot::at(109.33, 341.05),
    Slot::at(109.32, 321.45),
    Slot::at(109.33, 284.93),
    Slot::at(405.15, 358.48),
    Slot::at(405.15, 341.05),
    Slot::at(405.13, 321.45),
    Slot::at(405.15, 284.93),
    Slot::at(109.33, 150.07),
    Slot::at(109.32, 131.64),
    Slot::at(109.31, 112.04),
    Slot::at(109.33, 75.56),
    Slot::at(405.15, 150.07),
    Slot::at(405.14, 131.64),
    Slot::at(405.12, 112.04),
    Slot::at(405.15, 75.56),
];

// Same grid, customer and product lines only.
const DISPATCH_2_SLOTS: [Slot; 16] = [
    Slot::at(109.33, 781.51),
    Slot::at(109.35, 762.71),
    Slot::at(407.84, 781.51),
    Slot::at(405.16, 762.19),
    Slot::at(109.33, 570.31),
    Slot::at(109.34, 553.29),
    Slot::at(405.15, 570.31),
    Slot::at(405.15, 553.29),
    Slot::at(109.33, 358.48),
    Slot::at(109.33, 341.05),
    Slot::at(405.15, 358.48),
    Slot::at(405.15, 341.05),
    Slot::at(109.33, 150.07),
    Slot::at(109.32, 131.64),
    Slot::at(405.15, 150.07),
    Slot::at(405.14, 131.64),
];

// Number boxes down the right-hand column, top to bottom.
const SCRAP_SLOTS: [Slot; 4] = [
    Slot::masked(455.0, 745.0, SCRAP_MASK),
    Slot::masked(455.0, 535.0, SCRAP_MASK),
    Slot::masked(455.0, 325.0, SCRAP_MASK),
    Slot::masked(455.0, 115.0, SCRAP_MASK),
];

pub static DISPATCH_4: SlotTemplate = SlotTemplate {
    name: "dispatch-4",
    description: "Dispatch label: customer, product, litho number, PO number",
    field_count: 4,
    font_size: DISPATCH_FONT_SIZE,
    paging: Paging::Repeat,
    slots: &DISPATCH_4_SLOTS,
};

pub static DISPATCH_2: SlotTemplate = SlotTemplate {
    name: "dispatch-2",
    description: "Dispatch label: customer, product",
    field_count: 2,
    font_size: DISPATCH_FONT_SIZE,
    paging: Paging::Repeat,
    slots: &DISPATCH_2_SLOTS,
};

pub static SCRAP: SlotTemplate = SlotTemplate {
    name: "scrap",
    description: "Scrap label: one running number per box, four per sheet",
    field_count: 1,
    font_size: SCRAP_FONT_SIZE,
    paging: Paging::Sequential,
    slots: &SCRAP_SLOTS,
};

/// Every registered template
pub static TEMPLATES: [&SlotTemplate; 3] = [&DISPATCH_4, &DISPATCH_2, &SCRAP];

/// Look up a template by name.
pub fn resolve(template_id: &str) -> Result<&'static SlotTemplate, LabelError> {
    let template = TEMPLATES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(template_id.trim()))
        .ok_or_else(|| LabelError::UnknownTemplate(template_id.to_string()))?;
    log::debug!("Resolved template '{}' ({} slots)", template.name, template.slots.len());
    Ok(template)
}
