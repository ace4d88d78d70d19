use std::fs;
use std::path::Path;

use fontdb::Database;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::{Face, GlyphId, Tag};

use super::content::{compress_data, TextEncoding};
use crate::config::FontSetting;
use crate::error::LabelError;

/// Resource name the overlay uses for its font.
///
/// Chosen so it does not clash with the background page's own fonts.
pub const FONT_RESOURCE: &str = "LblF1";

/// CIDs are Basic Multilingual Plane code points
const MAX_CID: u16 = 0xFFFF;

/// Standard PDF Type1 fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
    Courier,
    CourierBold,
}

impl StandardFont {
    /// Get the PDF BaseFont name for this font
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
        }
    }

    /// Parse a font name into a StandardFont
    pub fn from_name(name: &str) -> Option<StandardFont> {
        match name.trim().to_lowercase().as_str() {
            "helvetica" => Some(StandardFont::Helvetica),
            "helvetica-bold" => Some(StandardFont::HelveticaBold),
            "times" | "times-roman" => Some(StandardFont::TimesRoman),
            "times-bold" => Some(StandardFont::TimesBold),
            "courier" => Some(StandardFont::Courier),
            "courier-bold" => Some(StandardFont::CourierBold),
            _ => None,
        }
    }
}

/// The font label text is drawn with.
#[derive(Debug, Clone)]
pub enum LabelFont {
    Standard(StandardFont),
    /// Single-face TrueType program embedded in the output as a Type0 font
    TrueType { name: String, data: Vec<u8> },
}

impl Default for LabelFont {
    fn default() -> Self {
        LabelFont::Standard(StandardFont::HelveticaBold)
    }
}

impl LabelFont {
    /// Resolve the configured font. Relative font files are looked up in `base_dir`.
    pub fn from_setting(setting: &FontSetting, base_dir: &Path) -> Result<Self, LabelError> {
        match setting {
            FontSetting::Standard(name) => StandardFont::from_name(name)
                .map(LabelFont::Standard)
                .ok_or_else(|| LabelError::FontLoad(format!("'{}' is not a supported standard font", name))),
            FontSetting::File(path) => {
                let path = base_dir.join(path);
                let data = fs::read(&path)
                    .map_err(|e| LabelError::FontLoad(format!("Failed to read font file {:?}: {}", path, e)))?;
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("LabelFont")
                    .to_string();
                LabelFont::true_type(name, data, 0)
            }
            FontSetting::Family(family) => match find_system_font(family) {
                Some((data, index, name)) => LabelFont::true_type(name, data, index),
                None => {
                    log::warn!("Font family '{}' not found, falling back to Helvetica-Bold", family);
                    Ok(LabelFont::default())
                }
            },
        }
    }

    /// Check that `data` holds a TrueType face we can embed.
    ///
    /// For a font collection, face `index` is extracted into a standalone
    /// font file first.
    pub fn true_type(name: String, data: Vec<u8>, index: u32) -> Result<Self, LabelError> {
        let data = if data.starts_with(b"ttcf") {
            extract_from_ttc(&data, index).ok_or_else(|| {
                LabelError::FontLoad(format!("Failed to extract face {} from collection '{}'", index, name))
            })?
        } else {
            data
        };

        let face = Face::parse(&data, 0)
            .map_err(|e| LabelError::FontLoad(format!("Failed to parse '{}': {}", name, e)))?;
        if face.raw_face().table(Tag::from_bytes(b"glyf")).is_none() {
            return Err(LabelError::FontLoad(format!(
                "'{}' has no TrueType outlines (CFF-based fonts are not supported)",
                name
            )));
        }

        Ok(LabelFont::TrueType {
            name: name.replace(' ', "-"),
            data,
        })
    }

    /// How overlay text must be encoded for this font
    pub fn encoding(&self) -> TextEncoding {
        match self {
            LabelFont::Standard(_) => TextEncoding::WinAnsi,
            LabelFont::TrueType { .. } => TextEncoding::IdentityH,
        }
    }

    /// Add the font objects to `doc` and return the font dictionary's id
    pub fn install(&self, doc: &mut Document) -> Result<ObjectId, LabelError> {
        match self {
            LabelFont::Standard(font) => {
                let mut font_dict = Dictionary::new();
                font_dict.set("Type", "Font");
                font_dict.set("Subtype", "Type1");
                font_dict.set("BaseFont", font.base_font_name());
                font_dict.set("Encoding", "WinAnsiEncoding");
                Ok(doc.add_object(Object::Dictionary(font_dict)))
            }
            LabelFont::TrueType { name, data } => embed_cid_font(doc, data, name),
        }
    }
}

/// Scale a font-unit value to the PDF glyph space of 1000 units per em
fn to_glyph_space(value: f32, units_per_em: f32) -> i64 {
    (value * 1000.0 / units_per_em).round() as i64
}

/// Scan every BMP code point once.
///
/// Returns the CIDToGIDMap bytes (one big-endian glyph id per CID) and the
/// advance width of each CID the font maps.
fn cid_metrics(face: &Face<'_>) -> (Vec<u8>, Vec<(u16, i64)>) {
    let units_per_em = f32::from(face.units_per_em());
    let mut gid_map = Vec::with_capacity((usize::from(MAX_CID) + 1) * 2);
    let mut widths = Vec::new();

    for cid in 0..=MAX_CID {
        let glyph = char::from_u32(u32::from(cid)).and_then(|c| face.glyph_index(c));
        gid_map.extend_from_slice(&glyph.map_or(0, |g| g.0).to_be_bytes());
        if let Some(advance) = glyph.and_then(|g| face.glyph_hor_advance(g)) {
            widths.push((cid, to_glyph_space(f32::from(advance), units_per_em)));
        }
    }
    (gid_map, widths)
}

/// Group ascending (cid, width) pairs into `c [w1 w2 ...]` runs for a W array
fn width_array(widths: &[(u16, i64)]) -> Vec<Object> {
    let mut array = Vec::new();
    let mut run: Vec<Object> = Vec::new();
    let mut run_start = 0u16;
    let mut expected = None;

    for &(cid, width) in widths {
        if expected != Some(cid) && !run.is_empty() {
            array.push(Object::Integer(i64::from(run_start)));
            array.push(Object::Array(std::mem::take(&mut run)));
        }
        if run.is_empty() {
            run_start = cid;
        }
        run.push(Object::Integer(width));
        expected = cid.checked_add(1);
    }
    if !run.is_empty() {
        array.push(Object::Integer(i64::from(run_start)));
        array.push(Object::Array(run));
    }
    array
}

/// ToUnicode CMap for fonts whose CIDs are Unicode code points
fn identity_to_unicode_cmap() -> Vec<u8> {
    let ranges: Vec<String> = (0u16..=0xFF)
        .filter(|high| !(0xD8..=0xDF).contains(high))
        .map(|high| format!("<{:02X}00> <{:02X}FF> <{:02X}00>", high, high, high))
        .collect();

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    // At most 100 entries per bfrange block
    for block in ranges.chunks(100) {
        cmap.push_str(&format!("{} beginbfrange\n", block.len()));
        for range in block {
            cmap.push_str(range);
            cmap.push('\n');
        }
        cmap.push_str("endbfrange\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}

fn flate_stream(data: &[u8]) -> Result<Stream, LabelError> {
    let mut dict = Dictionary::new();
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, compress_data(data)?))
}

/// Embed a TrueType font as a Type0 font with Identity-H encoding.
///
/// CIDs are Unicode code points; a CIDToGIDMap built from the font's cmap
/// maps them to glyphs. Widths and descriptor metrics come from the font's
/// own tables so text advances match what a viewer draws.
pub fn embed_cid_font(doc: &mut Document, font_data: &[u8], font_name: &str) -> Result<ObjectId, LabelError> {
    let face = Face::parse(font_data, 0)
        .map_err(|e| LabelError::FontLoad(format!("Failed to parse '{}': {}", font_name, e)))?;
    let upem = f32::from(face.units_per_em());
    let bbox = face.global_bounding_box();
    let (gid_map, widths) = cid_metrics(&face);
    let default_width = face
        .glyph_hor_advance(GlyphId(0))
        .map_or(1000, |w| to_glyph_space(f32::from(w), upem));

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", "FontDescriptor");
    font_descriptor.set("FontName", font_name);
    font_descriptor.set("Flags", 4i64); // Symbolic
    font_descriptor.set(
        "FontBBox",
        [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max]
            .into_iter()
            .map(|v| Object::Integer(to_glyph_space(f32::from(v), upem)))
            .collect::<Vec<_>>(),
    );
    font_descriptor.set("ItalicAngle", 0i64);
    font_descriptor.set("Ascent", to_glyph_space(f32::from(face.ascender()), upem));
    font_descriptor.set("Descent", to_glyph_space(f32::from(face.descender()), upem));
    let cap_height = face.capital_height().unwrap_or(face.ascender());
    font_descriptor.set("CapHeight", to_glyph_space(f32::from(cap_height), upem));
    font_descriptor.set("StemV", if face.is_bold() { 120i64 } else { 80i64 });

    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", font_data.len() as i64);
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font_data.to_vec()));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));
    let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

    let cidtogid_id = doc.add_object(flate_stream(&gid_map)?);

    let mut cid_system = Dictionary::new();
    cid_system.set("Registry", Object::String("Adobe".into(), StringFormat::Literal));
    cid_system.set("Ordering", Object::String("Identity".into(), StringFormat::Literal));
    cid_system.set("Supplement", 0i64);

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", "Font");
    cid_font.set("Subtype", "CIDFontType2");
    cid_font.set("BaseFont", font_name);
    cid_font.set("CIDSystemInfo", cid_system);
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("CIDToGIDMap", Object::Reference(cidtogid_id));
    cid_font.set("DW", default_width);
    cid_font.set("W", width_array(&widths));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode_id = doc.add_object(flate_stream(&identity_to_unicode_cmap())?);

    let mut type0_font = Dictionary::new();
    type0_font.set("Type", "Font");
    type0_font.set("Subtype", "Type0");
    type0_font.set("BaseFont", font_name);
    type0_font.set("Encoding", "Identity-H");
    type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);
    type0_font.set("ToUnicode", Object::Reference(to_unicode_id));

    log::debug!("Embedded '{}' with {} mapped characters", font_name, widths.len());
    Ok(doc.add_object(Object::Dictionary(type0_font)))
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes(bytes.try_into().ok()?))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// Extract face `index` of a TrueType Collection as a standalone font file.
///
/// The face's tables are copied out of the collection and its table
/// directory is rewritten with offsets into the new file.
fn extract_from_ttc(ttc_data: &[u8], index: u32) -> Option<Vec<u8>> {
    if !ttc_data.starts_with(b"ttcf") || index >= read_u32(ttc_data, 8)? {
        return None;
    }
    let face_offset = read_u32(ttc_data, 12 + 4 * index as usize)? as usize;
    let num_tables = usize::from(read_u16(ttc_data, face_offset + 4)?);
    let directory_len = 12 + 16 * num_tables;
    let mut out = ttc_data
        .get(face_offset..face_offset.checked_add(directory_len)?)?
        .to_vec();

    for table in 0..num_tables {
        let record = 12 + 16 * table;
        let offset = read_u32(&out, record + 8)? as usize;
        let length = read_u32(&out, record + 12)? as usize;
        let body = ttc_data.get(offset..offset.checked_add(length)?)?;

        let new_offset = u32::try_from(out.len()).ok()?;
        out[record + 8..record + 12].copy_from_slice(&new_offset.to_be_bytes());
        out.extend_from_slice(body);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    Some(out)
}

/// Find the bold face of an installed font family.
///
/// Returns the font data, the face index within it and its PostScript name.
pub fn find_system_font(family: &str) -> Option<(Vec<u8>, u32, String)> {
    let mut db = Database::new();
    db.load_system_fonts();

    let families = [fontdb::Family::Name(family)];
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight::BOLD,
        ..Default::default()
    };

    let id = db.query(&query)?;
    let name = db.face(id)?.post_script_name.clone();
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    log::debug!("Using system font '{}' (face {}) for family '{}'", name, index, family);
    Some((data, index, name))
}
