//! Configuration loading and parsing.
//!
//! This module handles:
//! - Loading settings.json (font choice, template file names)
//! - Loading data.csv for batch dispatch labels
//! - Loading background template PDFs
//! - Dimension values with units (mm, cm, in, pt)

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use lopdf::Document;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::LabelError;
use crate::labels::ProductType;

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1 in" (inches)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }

    pub fn as_mm(&self) -> f64 {
        self.0 * 25.4 / 72.0
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let split = value
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(value.len());
        let (num_str, unit) = value.split_at(split);
        let num_str = num_str.trim();
        let unit = unit.trim().to_lowercase();

        let num: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid number in dimension: {}", num_str))?;

        // 1 inch = 72 points (PDF default unit)
        let points = match unit.as_str() {
            "" | "pt" | "point" | "points" => num,
            "mm" => num * 72.0 / 25.4,
            "cm" => num * 72.0 / 2.54,
            "in" | "inch" | "inches" => num * 72.0,
            _ => {
                return Err(format!(
                    "unknown unit '{}'. Supported: mm, cm, in, pt",
                    unit
                ))
            }
        };

        Ok(Dimension(points))
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a number or a string with unit (e.g., \"100 mm\", \"10 cm\", \"1 in\")")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

/// Font used for all label text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSetting {
    /// One of the PDF base-14 fonts, e.g. "Helvetica-Bold"
    Standard(String),
    /// TrueType file, relative to the target directory
    File(PathBuf),
    /// Family name looked up among installed system fonts
    Family(String),
}

impl Default for FontSetting {
    fn default() -> Self {
        FontSetting::Standard("Helvetica-Bold".to_string())
    }
}

/// Background template files, relative to the target directory
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateFiles {
    pub deo: PathBuf,
    pub air_freshener: PathBuf,
    pub scrap: PathBuf,
}

impl Default for TemplateFiles {
    fn default() -> Self {
        Self {
            deo: PathBuf::from("LABELX.pdf"),
            air_freshener: PathBuf::from("LABELX_AIR.pdf"),
            scrap: PathBuf::from("SCRAP.pdf"),
        }
    }
}

impl TemplateFiles {
    pub fn for_product(&self, product_type: ProductType) -> &Path {
        match product_type {
            ProductType::Deo => &self.deo,
            ProductType::AirFreshener => &self.air_freshener,
        }
    }
}

fn default_calibration_grid() -> Dimension {
    Dimension(10.0 * 72.0 / 25.4)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub font: FontSetting,
    #[serde(default)]
    pub templates: TemplateFiles,
    #[serde(default = "default_calibration_grid")]
    pub calibration_grid: Dimension,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font: FontSetting::default(),
            templates: TemplateFiles::default(),
            calibration_grid: default_calibration_grid(),
        }
    }
}

/// One row of data.csv for batch dispatch labels
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRow {
    pub customer: String,
    pub product: String,
    #[serde(default)]
    pub litho_number: String,
    #[serde(default)]
    pub po_number: String,
    pub product_type: String,
}

/// Helper function to open a file with consistent error context
fn open_file_with_context(path: &Path, description: &str) -> Result<File> {
    File::open(path)
        .with_context(|| format!("Failed to open {} at {:?}", description, path))
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let file = open_file_with_context(path, "settings.json")?;
    let reader = BufReader::new(file);
    let settings: Settings = serde_json::from_reader(reader)
        .with_context(|| "Failed to parse settings.json")?;
    Ok(settings)
}

/// Load `settings.json` from `dir`, or the defaults if there is none.
pub fn load_settings_or_default(dir: &Path) -> Result<Settings> {
    let path = dir.join("settings.json");
    if path.exists() {
        log::info!("Loading configuration from {:?}", path);
        load_settings(&path)
    } else {
        log::info!("No settings.json in {:?}, using defaults", dir);
        Ok(Settings::default())
    }
}

pub fn load_dispatch_rows(path: &Path) -> Result<Vec<DispatchRow>> {
    let file = open_file_with_context(path, "data.csv")?;
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(file);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<DispatchRow>().enumerate() {
        let row = result.with_context(|| format!("Invalid row {} in {:?}", i + 1, path))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read and parse a background template PDF.
pub fn load_template(path: &Path) -> Result<Document, LabelError> {
    if !path.is_file() {
        return Err(LabelError::TemplateNotFound(path.to_path_buf()));
    }
    let doc = Document::load(path)
        .map_err(|e| LabelError::UnsupportedTemplate(format!("{} is not a readable PDF: {}", path.display(), e)))?;
    log::debug!("Loaded template {:?} ({} pages)", path, doc.get_pages().len());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dimension_from_number() {
        let dim: Dimension = serde_json::from_value(json!(100)).unwrap();
        assert_eq!(dim.as_points(), 100.0);
    }

    #[test]
    fn test_dimension_from_f64() {
        let dim: Dimension = serde_json::from_value(json!(12.5)).unwrap();
        assert_eq!(dim.as_points(), 12.5);
    }

    #[test]
    fn test_dimension_from_mm() {
        let dim: Dimension = serde_json::from_value(json!("100 mm")).unwrap();
        assert!((dim.as_points() - 283.46).abs() < 0.01);
        assert!((dim.as_mm() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_without_space() {
        let dim: Dimension = "10cm".parse().unwrap();
        assert!((dim.as_points() - 283.46).abs() < 0.01);
        let dim: Dimension = "36pt".parse().unwrap();
        assert_eq!(dim.as_points(), 36.0);
    }

    #[test]
    fn test_dimension_inches() {
        for text in ["1 in", "1 inch", "1 inches", " 1   IN "] {
            let dim: Dimension = text.parse().unwrap();
            assert_eq!(dim.as_points(), 72.0, "{}", text);
        }
    }

    #[test]
    fn test_dimension_invalid() {
        assert!("100 foo".parse::<Dimension>().is_err());
        assert!("abc mm".parse::<Dimension>().is_err());
        let result: Result<Dimension, _> = serde_json::from_value(json!("12 furlongs"));
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.font, FontSetting::Standard("Helvetica-Bold".to_string()));
        assert_eq!(settings.templates, TemplateFiles::default());
        assert!((settings.calibration_grid.as_mm() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_settings_full() {
        let settings: Settings = serde_json::from_value(json!({
            "font": { "file": "Arial-Bold.ttf" },
            "templates": { "deo": "deo.pdf", "scrap": "numbers.pdf" },
            "calibration_grid": "5 mm"
        }))
        .unwrap();
        assert_eq!(settings.font, FontSetting::File(PathBuf::from("Arial-Bold.ttf")));
        assert_eq!(settings.templates.deo, PathBuf::from("deo.pdf"));
        assert_eq!(settings.templates.air_freshener, PathBuf::from("LABELX_AIR.pdf"));
        assert_eq!(settings.templates.scrap, PathBuf::from("numbers.pdf"));
        assert!((settings.calibration_grid.as_mm() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_font_setting_family() {
        let font: FontSetting = serde_json::from_value(json!({ "family": "Arial" })).unwrap();
        assert_eq!(font, FontSetting::Family("Arial".to_string()));
    }

    #[test]
    fn test_template_for_product() {
        let files = TemplateFiles::default();
        assert_eq!(files.for_product(ProductType::Deo), Path::new("LABELX.pdf"));
        assert_eq!(files.for_product(ProductType::AirFreshener), Path::new("LABELX_AIR.pdf"));
    }

    #[test]
    fn test_load_template_missing() {
        let path = Path::new("/nonexistent/LABELX.pdf");
        let err = load_template(path).unwrap_err();
        assert!(matches!(err, LabelError::TemplateNotFound(ref p) if p == path));
    }

    #[test]
    fn test_load_template_malformed() {
        let path = std::env::temp_dir().join(format!("label_print_bad_{}.pdf", std::process::id()));
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = load_template(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        match err {
            LabelError::UnsupportedTemplate(message) => assert!(message.contains("label_print_bad_")),
            other => panic!("expected UnsupportedTemplate, got {:?}", other),
        }
    }

    #[test]
    fn test_load_dispatch_rows() {
        let path = std::env::temp_dir().join(format!("label_print_rows_{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "customer, product, litho_number, po_number, product_type\n\
             ACME,YARA DEO 200 ML,AA531,PO-1,DEO\n\
             ACME,FRESH 300 ML,,,AIR FRESHENER\n",
        )
        .unwrap();

        let rows = load_dispatch_rows(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product, "YARA DEO 200 ML");
        assert_eq!(rows[0].po_number, "PO-1");
        assert_eq!(rows[1].litho_number, "");
        assert_eq!(rows[1].product_type, "AIR FRESHENER");
    }
}
