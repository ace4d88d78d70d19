//! Overlay compositing onto background template pages.

pub mod content;
pub mod document;
pub mod fonts;
pub mod resources;

pub use document::{compose, save_to_bytes};
pub use fonts::{LabelFont, StandardFont};
