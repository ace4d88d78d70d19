//! Label requests: the values a caller supplies for each sheet kind,
//! their validation, and output file naming.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::config::DispatchRow;
use crate::error::ValidationError;
use crate::slots::{self, SlotTemplate};

/// Fixed output name for scrap number sheets
pub const SCRAP_FILENAME: &str = "scrap_labels.pdf";

/// Stem used when nothing printable is left of the product name
const FALLBACK_STEM: &str = "LABEL";

/// Characters that cannot appear in a file name on common filesystems
fn is_name_separator(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Product line; selects the background sheet for dispatch labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Deo,
    AirFreshener,
}

impl ProductType {
    pub fn label(&self) -> &'static str {
        match self {
            ProductType::Deo => "DEO",
            ProductType::AirFreshener => "AIR FRESHENER",
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            ProductType::Deo => "DEO",
            ProductType::AirFreshener => "AIR_FRESHENER",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProductType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_uppercase() })
            .collect();
        match normalized.as_str() {
            "DEO" => Ok(ProductType::Deo),
            "AIR FRESHENER" => Ok(ProductType::AirFreshener),
            _ => Err(ValidationError::UnknownProductType(s.to_string())),
        }
    }
}

/// Which dispatch fields are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FieldSet {
    /// Customer, product, litho number and PO number
    #[default]
    Full,
    /// Customer and product only
    Reduced,
}

impl FieldSet {
    pub fn template(&self) -> &'static SlotTemplate {
        match self {
            FieldSet::Full => &slots::DISPATCH_4,
            FieldSet::Reduced => &slots::DISPATCH_2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchLabel {
    pub customer: String,
    pub product: String,
    pub litho_number: String,
    pub po_number: String,
}

fn require(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(name))
    } else {
        Ok(())
    }
}

impl DispatchLabel {
    pub fn validate(&self, fields: FieldSet) -> Result<(), ValidationError> {
        require("customer", &self.customer)?;
        require("product", &self.product)?;
        if fields == FieldSet::Full {
            require("litho number", &self.litho_number)?;
            require("PO number", &self.po_number)?;
        }
        Ok(())
    }

    /// Values in template field order.
    pub fn values(&self, fields: FieldSet) -> Result<Vec<String>, ValidationError> {
        self.validate(fields)?;
        let values = match fields {
            FieldSet::Full => vec![
                self.customer.clone(),
                self.product.clone(),
                self.litho_number.clone(),
                self.po_number.clone(),
            ],
            FieldSet::Reduced => vec![self.customer.clone(), self.product.clone()],
        };
        Ok(values)
    }

    /// e.g. "YARA DEO 200 ML" + DEO -> "YARA_DEO_200_ML_DEO.pdf"
    ///
    /// Runs of whitespace and characters not allowed in file names become a
    /// single `_`.
    pub fn output_filename(&self, product_type: ProductType) -> String {
        let stem = self
            .product
            .split(is_name_separator)
            .filter(|part| !part.is_empty() && part.chars().any(|c| c != '.'))
            .collect::<Vec<_>>()
            .join("_");
        let stem = if stem.is_empty() { FALLBACK_STEM } else { stem.as_str() };
        format!("{}_{}.pdf", stem, product_type.file_suffix())
    }
}

/// Output names already claimed by earlier rows of a batch.
#[derive(Debug, Default)]
pub struct OutputNames {
    taken: HashSet<String>,
}

impl OutputNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for row `row`, suffixing it with the row number when
    /// an earlier row already wrote a file of that name.
    pub fn claim(&mut self, name: String, row: usize) -> String {
        if self.taken.insert(name.to_lowercase()) {
            return name;
        }

        let (stem, extension) = name.rsplit_once('.').unwrap_or((name.as_str(), "pdf"));
        let mut attempt = 0;
        loop {
            let candidate = match attempt {
                0 => format!("{}_row{}.{}", stem, row, extension),
                n => format!("{}_row{}_{}.{}", stem, row, n, extension),
            };
            if self.taken.insert(candidate.to_lowercase()) {
                log::warn!("Row {}: {} is already used by an earlier row, writing {}", row, name, candidate);
                return candidate;
            }
            attempt += 1;
        }
    }
}

impl DispatchRow {
    pub fn into_label(self) -> Result<(DispatchLabel, ProductType), ValidationError> {
        let product_type = self.product_type.parse()?;
        let label = DispatchLabel {
            customer: self.customer,
            product: self.product,
            litho_number: self.litho_number,
            po_number: self.po_number,
        };
        Ok((label, product_type))
    }
}

/// Inclusive run of scrap numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapRange {
    start: u32,
    end: u32,
}

impl ScrapRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of labels in the range; `u64` so `0..=u32::MAX` fits
    pub fn count(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn values(&self) -> Vec<String> {
        (self.start..=self.end).map(|n| n.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> DispatchLabel {
        DispatchLabel {
            customer: "LATTAFA PERFUME".to_string(),
            product: "YARA DEO 200 ML".to_string(),
            litho_number: "AA53140ADF0001-01".to_string(),
            po_number: "DEO-09-2024".to_string(),
        }
    }

    #[test]
    fn test_product_type_parsing() {
        assert_eq!("DEO".parse::<ProductType>().unwrap(), ProductType::Deo);
        assert_eq!(" deo ".parse::<ProductType>().unwrap(), ProductType::Deo);
        assert_eq!("AIR FRESHENER".parse::<ProductType>().unwrap(), ProductType::AirFreshener);
        assert_eq!("air_freshener".parse::<ProductType>().unwrap(), ProductType::AirFreshener);
        assert_eq!(
            "SOAP".parse::<ProductType>(),
            Err(ValidationError::UnknownProductType("SOAP".to_string()))
        );
    }

    #[test]
    fn test_full_values_in_field_order() {
        let values = label().values(FieldSet::Full).unwrap();
        assert_eq!(values, ["LATTAFA PERFUME", "YARA DEO 200 ML", "AA53140ADF0001-01", "DEO-09-2024"]);
    }

    #[test]
    fn test_reduced_values_ignore_litho_and_po() {
        let label = DispatchLabel {
            litho_number: String::new(),
            po_number: String::new(),
            ..label()
        };
        assert_eq!(label.values(FieldSet::Reduced).unwrap().len(), 2);
        assert_eq!(
            label.values(FieldSet::Full),
            Err(ValidationError::MissingField("litho number"))
        );
    }

    #[test]
    fn test_blank_field_rejected() {
        let label = DispatchLabel {
            customer: "   ".to_string(),
            ..label()
        };
        assert_eq!(label.validate(FieldSet::Reduced), Err(ValidationError::MissingField("customer")));
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(label().output_filename(ProductType::Deo), "YARA_DEO_200_ML_DEO.pdf");

        let label = DispatchLabel {
            product: "  FRESH  LINEN 300/ML ".to_string(),
            ..label()
        };
        assert_eq!(
            label.output_filename(ProductType::AirFreshener),
            "FRESH_LINEN_300_ML_AIR_FRESHENER.pdf"
        );
    }

    #[test]
    fn test_output_filename_sanitizes_reserved_characters() {
        let named = |product: &str| DispatchLabel {
            product: product.to_string(),
            ..label()
        };
        assert_eq!(named("A:B*C?\"D\"").output_filename(ProductType::Deo), "A_B_C_D_DEO.pdf");
        assert_eq!(named("<ROSE> | 50ml").output_filename(ProductType::Deo), "ROSE_50ml_DEO.pdf");
        assert_eq!(named("///").output_filename(ProductType::Deo), "LABEL_DEO.pdf");
        assert_eq!(named("../..").output_filename(ProductType::Deo), "LABEL_DEO.pdf");
    }

    #[test]
    fn test_output_names_disambiguate_repeats() {
        let mut names = OutputNames::new();
        assert_eq!(names.claim("WIDGET_DEO.pdf".to_string(), 1), "WIDGET_DEO.pdf");
        assert_eq!(names.claim("GADGET_DEO.pdf".to_string(), 2), "GADGET_DEO.pdf");
        assert_eq!(names.claim("WIDGET_DEO.pdf".to_string(), 3), "WIDGET_DEO_row3.pdf");
        assert_eq!(names.claim("widget_deo.pdf".to_string(), 4), "widget_deo_row4.pdf");
        assert_eq!(names.claim("WIDGET_DEO_row3.pdf".to_string(), 5), "WIDGET_DEO_row3_row5.pdf");
        assert_eq!(names.claim("WIDGET_DEO.pdf".to_string(), 3), "WIDGET_DEO_row3_1.pdf");
    }

    #[test]
    fn test_row_conversion() {
        let row = DispatchRow {
            customer: "ACME".to_string(),
            product: "WIDGET".to_string(),
            litho_number: "L1".to_string(),
            po_number: "P1".to_string(),
            product_type: "air freshener".to_string(),
        };
        let (label, product_type) = row.into_label().unwrap();
        assert_eq!(label.customer, "ACME");
        assert_eq!(product_type, ProductType::AirFreshener);
    }

    #[test]
    fn test_scrap_range() {
        let range = ScrapRange::new(1, 5).unwrap();
        assert_eq!(range.count(), 5);
        assert_eq!(range.values(), ["1", "2", "3", "4", "5"]);
        assert_eq!(ScrapRange::new(7, 7).unwrap().values(), ["7"]);
        assert_eq!(ScrapRange::new(0, u32::MAX).unwrap().count(), 1 << 32);
    }

    #[test]
    fn test_scrap_range_reversed() {
        assert_eq!(
            ScrapRange::new(10, 9),
            Err(ValidationError::InvalidRange { start: 10, end: 9 })
        );
    }
}
