//! Output formatting for CLI results

use serde::Serialize;
use tabled::Tabled;

use crate::cli::OutputFormat;
use crate::error::Result;

pub mod formatters;
pub mod json;
pub mod table;

/// A single labelled value in a report
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct Field {
    #[tabled(rename = "FIELD")]
    pub label: String,
    #[tabled(rename = "VALUE")]
    pub value: String,
}

impl Field {
    pub fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// Command results that print in every output format.
///
/// JSON output serializes the value itself; pretty and table output use
/// the labelled [`fields`](Report::fields).
pub trait Report: Serialize {
    /// Heading for pretty output
    fn title(&self) -> &str;

    fn fields(&self) -> Vec<Field>;
}

/// Render a report in the given format
pub fn render<T: Report>(report: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(json::format_json(report)?),
        OutputFormat::Table => Ok(table::format_table(&report.fields())),
        OutputFormat::Pretty => Ok(table::format_pretty(report.title(), &report.fields())),
    }
}

/// Render a report and print it to stdout
pub fn print<T: Report>(report: &T, format: OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        role: String,
    }

    impl Report for Sample {
        fn title(&self) -> &str {
            "Sample"
        }

        fn fields(&self) -> Vec<Field> {
            vec![Field::new("Role", self.role.clone())]
        }
    }

    #[test]
    fn test_render_json_wraps_value() {
        let out = render(&Sample { role: "ADMIN".into() }, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["data"]["role"], "ADMIN");
        assert!(value["meta"]["timestamp"].is_string());
    }

    #[test]
    fn test_render_table_uses_fields() {
        let out = render(&Sample { role: "ADMIN".into() }, OutputFormat::Table).unwrap();

        assert!(out.contains("FIELD"));
        assert!(out.contains("Role"));
        assert!(out.contains("ADMIN"));
    }

    #[test]
    fn test_render_pretty_has_title() {
        colored::control::set_override(false);
        let out = render(&Sample { role: "ADMIN".into() }, OutputFormat::Pretty).unwrap();

        assert!(out.starts_with("Sample"));
        assert!(out.contains("Role: ADMIN"));
    }
}
