pub mod calibrate;
pub mod config;
pub mod error;
pub mod labels;
pub mod pdf;
pub mod slots;

pub use config::Settings;
pub use error::{LabelError, ValidationError};
pub use labels::{DispatchLabel, FieldSet, ProductType, ScrapRange};
pub use pdf::LabelFont;
pub use slots::{resolve, SlotTemplate};

use lopdf::Document;

/// Draw `values` into `template`'s slots on top of the background's first
/// page and return the finished PDF.
///
/// # Example
///
/// ```no_run
/// use label_print::{render_template, resolve, LabelFont};
///
/// let background = lopdf::Document::load("LABELX.pdf").unwrap();
/// let template = resolve("dispatch-2").unwrap();
/// let pdf = render_template(template, &["ACME", "WIDGET 200 ML"], &background, &LabelFont::default()).unwrap();
/// std::fs::write("labels.pdf", pdf).unwrap();
/// ```
pub fn render_template<S: AsRef<str>>(
    template: &SlotTemplate,
    values: &[S],
    background: &Document,
    font: &LabelFont,
) -> Result<Vec<u8>, LabelError> {
    let sheets = template.assign(values)?;
    let mut doc = pdf::compose(background, template, &sheets, font)?;
    pdf::save_to_bytes(&mut doc)
}

/// Render one dispatch label sheet.
pub fn render_dispatch(
    label: &DispatchLabel,
    fields: FieldSet,
    background: &Document,
    font: &LabelFont,
) -> Result<Vec<u8>, LabelError> {
    let values = label.values(fields)?;
    render_template(fields.template(), &values, background, font)
}

/// Render scrap numbers, four per sheet, one page per sheet.
pub fn render_scrap(range: &ScrapRange, background: &Document, font: &LabelFont) -> Result<Vec<u8>, LabelError> {
    let values = range.values();
    log::info!(
        "Numbering scrap labels {} to {}: {} labels on {} sheet(s)",
        range.start(),
        range.end(),
        range.count(),
        slots::SCRAP.sheet_count(values.len())
    );
    render_template(&slots::SCRAP, &values, background, font)
}
