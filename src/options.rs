//! Render options – the caller-facing wire shape and its resolved form.
//!
//! [`RenderOptions`] is what requests carry (every field optional);
//! [`PageSetup`] is the fully merged result. Merging is an explicit
//! field-by-field operation, with margins merged per side, so a partial
//! `margin` object behaves predictably.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Paper format for the generated PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperFormat {
    A4,
    #[default]
    Letter,
    Legal,
}

impl PaperFormat {
    /// Page size in inches, portrait orientation.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
        }
    }
}

/// Caller-supplied options; unspecified fields take documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub format: Option<PaperFormat>,
    pub landscape: Option<bool>,
    pub margin: Option<MarginOptions>,
    pub file_name: Option<String>,
}

/// Per-side margin overrides, each a CSS-style length string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarginOptions {
    pub top: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
}

pub const DEFAULT_MARGIN: &str = "0.5in";
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// A margin length, validated at merge time.
#[derive(Debug, Clone, PartialEq)]
pub struct Length {
    pub text: String,
    pub inches: f64,
}

impl Length {
    /// Parse a CSS-style length. Accepts `in`, `cm`, `mm`, and `px`
    /// suffixes; a bare number is taken as inches.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        let (number, unit) = match trimmed.find(|c: char| c.is_ascii_alphabetic()) {
            Some(split) => trimmed.split_at(split),
            None => (trimmed, "in"),
        };
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidLength(text.to_string()))?;
        if value < 0.0 {
            return Err(ValidationError::InvalidLength(text.to_string()));
        }
        let inches = match unit {
            "in" => value,
            "cm" => value / 2.54,
            "mm" => value / 25.4,
            "px" => value / 96.0,
            _ => return Err(ValidationError::InvalidLength(text.to_string())),
        };
        Ok(Self {
            text: trimmed.to_string(),
            inches,
        })
    }
}

/// Fully resolved page margins.
#[derive(Debug, Clone, PartialEq)]
pub struct Margins {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

/// Fully resolved render configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub format: PaperFormat,
    pub landscape: bool,
    pub margin: Margins,
    pub file_name: String,
}

impl PageSetup {
    /// Merge caller options over the documented defaults. Margin sides merge
    /// independently; every other field is a whole-value override.
    pub fn resolve(options: &RenderOptions) -> Result<Self, ValidationError> {
        let margin = options.margin.clone().unwrap_or_default();
        let side = |value: &Option<String>| -> Result<Length, ValidationError> {
            Length::parse(value.as_deref().unwrap_or(DEFAULT_MARGIN))
        };
        Ok(Self {
            format: options.format.unwrap_or_default(),
            landscape: options.landscape.unwrap_or(false),
            margin: Margins {
                top: side(&margin.top)?,
                right: side(&margin.right)?,
                bottom: side(&margin.bottom)?,
                left: side(&margin.left)?,
            },
            file_name: options
                .file_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        })
    }

    /// Document title derived from the output file name.
    pub fn title(&self) -> &str {
        self.file_name
            .strip_suffix(".pdf")
            .unwrap_or(&self.file_name)
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        let side = || Length {
            text: DEFAULT_MARGIN.to_string(),
            inches: 0.5,
        };
        Self {
            format: PaperFormat::default(),
            landscape: false,
            margin: Margins {
                top: side(),
                right: side(),
                bottom: side(),
                left: side(),
            },
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_yield_documented_defaults() {
        let setup = PageSetup::resolve(&RenderOptions::default()).unwrap();
        assert_eq!(setup.format, PaperFormat::Letter);
        assert!(!setup.landscape);
        for side in [
            &setup.margin.top,
            &setup.margin.right,
            &setup.margin.bottom,
            &setup.margin.left,
        ] {
            assert_eq!(side.text, "0.5in");
            assert_eq!(side.inches, 0.5);
        }
        assert_eq!(setup.file_name, "document.pdf");
    }

    #[test]
    fn margins_merge_per_side() {
        let options = RenderOptions {
            margin: Some(MarginOptions {
                left: Some("1in".to_string()),
                ..MarginOptions::default()
            }),
            ..RenderOptions::default()
        };
        let setup = PageSetup::resolve(&options).unwrap();
        assert_eq!(setup.margin.left.inches, 1.0);
        assert_eq!(setup.margin.top.text, "0.5in");
        assert_eq!(setup.margin.right.text, "0.5in");
        assert_eq!(setup.margin.bottom.text, "0.5in");
    }

    #[test]
    fn caller_fields_override_defaults() {
        let options = RenderOptions {
            format: Some(PaperFormat::A4),
            landscape: Some(true),
            file_name: Some("report.pdf".to_string()),
            ..RenderOptions::default()
        };
        let setup = PageSetup::resolve(&options).unwrap();
        assert_eq!(setup.format, PaperFormat::A4);
        assert!(setup.landscape);
        assert_eq!(setup.title(), "report");
    }

    #[test]
    fn length_units_convert_to_inches() {
        assert_eq!(Length::parse("1in").unwrap().inches, 1.0);
        assert_eq!(Length::parse("25.4mm").unwrap().inches, 1.0);
        assert_eq!(Length::parse("2.54cm").unwrap().inches, 1.0);
        assert_eq!(Length::parse("96px").unwrap().inches, 1.0);
        assert_eq!(Length::parse("0.75").unwrap().inches, 0.75);
    }

    #[test]
    fn bad_lengths_are_rejected() {
        for bad in ["abc", "1.2.3in", "-1in", "10pt", ""] {
            assert!(Length::parse(bad).is_err(), "`{bad}` should be invalid");
        }
    }

    #[test]
    fn paper_sizes() {
        assert_eq!(PaperFormat::Letter.size_inches(), (8.5, 11.0));
        assert_eq!(PaperFormat::Legal.size_inches(), (8.5, 14.0));
        assert_eq!(PaperFormat::A4.size_inches(), (8.27, 11.69));
    }

    #[test]
    fn format_names_deserialize_from_wire() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"format": "A4", "landscape": true}"#).unwrap();
        assert_eq!(options.format, Some(PaperFormat::A4));
        assert_eq!(options.landscape, Some(true));
    }
}
