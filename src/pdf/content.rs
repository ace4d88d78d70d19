//! Overlay content stream generation.
//!
//! This module provides:
//! - Text drawing at fixed anchors
//! - Opaque mask boxes that hide pre-printed template content
//! - WinAnsi string encoding for PDF literal strings
//! - Identity-H hex strings for embedded TrueType fonts
//! - Flate-compressed overlay streams

use std::io::Write;

use lopdf::{Dictionary, Stream};

use crate::error::LabelError;
use crate::slots::{MaskBox, Sheet};

/// How text strings are written for the overlay font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Single-byte literal strings for the base-14 fonts
    WinAnsi,
    /// Two-byte hex strings holding Unicode code points, for Type0 fonts
    IdentityH,
}

/// Builder for one page's overlay content stream
pub struct OverlayBuilder {
    pub content_parts: Vec<String>,
    font_name: String,
    encoding: TextEncoding,
}

impl OverlayBuilder {
    /// Create a new OverlayBuilder drawing with the given font resource name
    pub fn new(font_name: &str, encoding: TextEncoding) -> Self {
        Self {
            content_parts: Vec::new(),
            font_name: font_name.to_string(),
            encoding,
        }
    }

    /// Build the overlay for every placement on a sheet.
    ///
    /// A masked slot gets its white box immediately before its text so the
    /// two always pair up.
    pub fn for_sheet(font_name: &str, encoding: TextEncoding, sheet: &Sheet<'_>) -> Self {
        let mut builder = Self::new(font_name, encoding);
        for placement in &sheet.placements {
            let slot = placement.slot;
            if let Some(mask) = &slot.mask {
                builder.add_mask(slot.x, slot.y, mask);
            }
            builder.add_text(placement.text, slot.x, slot.y, placement.font_size);
        }
        builder
    }

    /// Paint an opaque white box anchored relative to (x, y)
    pub fn add_mask(&mut self, x: f32, y: f32, mask: &MaskBox) {
        self.content_parts.push(format!(
            "q 1 g {} {} {} {} re f Q ",
            x - mask.offset,
            y - mask.offset,
            mask.width,
            mask.height
        ));
    }

    /// Draw black text with its baseline starting at (x, y)
    pub fn add_text(&mut self, value: &str, x: f32, y: f32, font_size: f32) {
        let string = match self.encoding {
            TextEncoding::WinAnsi => format!("({})", encode_win_ansi(value)),
            TextEncoding::IdentityH => format!("<{}>", encode_cid_text(value)),
        };
        self.content_parts.push(format!(
            "q BT 0 g /{} {} Tf {} {} Td {} Tj ET Q ",
            self.font_name, font_size, x, y, string
        ));
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.concat().into_bytes()
    }

    /// Build a Flate-compressed content stream
    pub fn build_stream(&self) -> Result<Stream, LabelError> {
        let compressed = compress_data(&self.build_content_bytes())?;
        let mut dict = Dictionary::new();
        dict.set("Filter", "FlateDecode");
        Ok(Stream::new(dict, compressed))
    }
}

/// WinAnsiEncoding codes in 0x80..=0x9F that differ from Latin-1
const WIN_ANSI_SPECIALS: [(char, u8); 12] = [
    ('€', 0x80),
    ('‚', 0x82),
    ('„', 0x84),
    ('…', 0x85),
    ('‘', 0x91),
    ('’', 0x92),
    ('“', 0x93),
    ('”', 0x94),
    ('•', 0x95),
    ('–', 0x96),
    ('—', 0x97),
    ('™', 0x99),
];

/// Byte for `c` in WinAnsiEncoding, if it has one.
pub fn win_ansi_byte(c: char) -> Option<u8> {
    match c as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        _ => WIN_ANSI_SPECIALS
            .iter()
            .find(|(special, _)| *special == c)
            .map(|(_, byte)| *byte),
    }
}

/// Encode text as the body of a PDF literal string in WinAnsiEncoding.
///
/// Delimiters are escaped, bytes above 0x7E are written as octal escapes
/// and characters outside the encoding become `?`.
pub fn encode_win_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => result.push_str(r"\("),
            ')' => result.push_str(r"\)"),
            '\\' => result.push_str(r"\\"),
            '\n' => result.push_str(r"\n"),
            '\r' => result.push_str(r"\r"),
            '\t' => result.push_str(r"\t"),
            _ => match win_ansi_byte(c) {
                Some(byte) if byte.is_ascii() => result.push(byte as char),
                Some(byte) => result.push_str(&format!("\\{:03o}", byte)),
                None => result.push('?'),
            },
        }
    }
    result
}

/// Encode text for a Type0 font with Identity-H encoding.
///
/// Each character becomes its Unicode code point as a big-endian CID in
/// hex. Characters outside the Basic Multilingual Plane have no two-byte
/// CID and are written as U+FFFD.
pub fn encode_cid_text(s: &str) -> String {
    s.chars()
        .map(|c| {
            let code = u16::try_from(u32::from(c)).unwrap_or(0xFFFD);
            format!("{:04X}", code)
        })
        .collect()
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>, LabelError> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{SCRAP, SCRAP_MASK};
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_encode_plain_and_delimiters() {
        assert_eq!(encode_win_ansi("YARA DEO 200 ML"), "YARA DEO 200 ML");
        assert_eq!(encode_win_ansi("(hello)"), r"\(hello\)");
        assert_eq!(encode_win_ansi(r"a\b"), r"a\\b");
        assert_eq!(encode_win_ansi("line1\nline2"), r"line1\nline2");
    }

    #[test]
    fn test_encode_non_ascii() {
        assert_eq!(encode_win_ansi("Café"), r"Caf\351");
        assert_eq!(encode_win_ansi("5€"), r"5\200");
        assert_eq!(encode_win_ansi("日本"), "??");
    }

    #[test]
    fn test_encode_cid_text() {
        assert_eq!(encode_cid_text("AB"), "00410042");
        assert_eq!(encode_cid_text("Ünal"), "00DC006E0061006C");
        assert_eq!(encode_cid_text("日本"), "65E5672C");
        assert_eq!(encode_cid_text("a😀"), "0061FFFD");
    }

    #[test]
    fn test_add_text() {
        let mut builder = OverlayBuilder::new("LblF1", TextEncoding::WinAnsi);
        builder.add_text("LATTAFA PERFUME", 109.33, 781.51, 10.0);
        assert_eq!(
            builder.content_parts,
            ["q BT 0 g /LblF1 10 Tf 109.33 781.51 Td (LATTAFA PERFUME) Tj ET Q "]
        );
    }

    #[test]
    fn test_add_text_identity_h() {
        let mut builder = OverlayBuilder::new("LblF1", TextEncoding::IdentityH);
        builder.add_text("Łódź", 10.0, 20.0, 10.0);
        assert_eq!(
            builder.content_parts,
            ["q BT 0 g /LblF1 10 Tf 10 20 Td <014100F30064017A> Tj ET Q "]
        );
    }

    #[test]
    fn test_add_mask_offsets_box() {
        let mut builder = OverlayBuilder::new("LblF1", TextEncoding::WinAnsi);
        builder.add_mask(100.0, 200.0, &SCRAP_MASK);
        assert_eq!(builder.content_parts, ["q 1 g 95 195 80 75 re f Q "]);
    }

    #[test]
    fn test_sheet_pairs_mask_with_text() {
        let values = ["41", "42"];
        let sheets = SCRAP.assign(&values).unwrap();
        let builder = OverlayBuilder::for_sheet("LblF1", TextEncoding::WinAnsi, &sheets[0]);

        assert_eq!(builder.content_parts.len(), 4);
        assert!(builder.content_parts[0].contains("re f"));
        assert!(builder.content_parts[1].contains("58 Tf"));
        assert!(builder.content_parts[1].contains("(41) Tj"));
        assert!(builder.content_parts[2].contains("re f"));
        assert!(builder.content_parts[3].contains("(42) Tj"));
    }

    #[test]
    fn test_overlay_is_deterministic() {
        let values = ["A", "B", "C", "D"];
        let sheets = crate::slots::DISPATCH_4.assign(&values).unwrap();
        let first = OverlayBuilder::for_sheet("LblF1", TextEncoding::WinAnsi, &sheets[0]).build_content_bytes();
        let second = OverlayBuilder::for_sheet("LblF1", TextEncoding::WinAnsi, &sheets[0]).build_content_bytes();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_stream_is_compressed() {
        let mut builder = OverlayBuilder::new("LblF1", TextEncoding::WinAnsi);
        builder.add_text("X", 1.0, 2.0, 10.0);
        let stream = builder.build_stream().unwrap();

        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        let mut decoded = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, builder.build_content_bytes());
    }
}
