use std::path::PathBuf;

use thiserror::Error;

/// Input problems caught before any drawing happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("end number {end} is less than start number {start}")]
    InvalidRange { start: u32, end: u32 },

    #[error("unknown product type '{0}' (expected DEO or AIR FRESHENER)")]
    UnknownProductType(String),
}

#[derive(Error, Debug)]
pub enum LabelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Template file not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Unsupported template: {0}")]
    UnsupportedTemplate(String),

    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("No input values supplied")]
    NoInputValues,

    #[error("Failed to load font: {0}")]
    FontLoad(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF generation error: {0}")]
    PdfGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
