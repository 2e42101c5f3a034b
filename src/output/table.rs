//! Table and pretty output formatting

use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

use super::Field;

/// Format rows as a rounded table with a centered header
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// Format fields as a bold title followed by aligned `label: value` lines
pub fn format_pretty(title: &str, fields: &[Field]) -> String {
    let width = fields.iter().map(|f| f.label.len()).max().unwrap_or(0);

    let mut out = format!("{}\n", title.bold());
    for field in fields {
        out.push_str(&format!(
            "\n{}{} {}",
            field.label.dimmed(),
            ":".dimmed(),
            " ".repeat(width - field.label.len()) + &field.value
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "PATH")]
        path: String,
    }

    #[test]
    fn test_format_table_empty() {
        let rows: Vec<Row> = vec![];
        assert_eq!(format_table(&rows), "No results found.");
    }

    #[test]
    fn test_format_table_uses_rounded_style() {
        let rows = vec![Row {
            path: "/pages/doctor".to_string(),
        }];

        let out = format_table(&rows);

        assert!(out.contains("PATH"));
        assert!(out.contains("/pages/doctor"));
        assert!(out.contains('╭'));
    }

    #[test]
    fn test_format_pretty_aligns_values() {
        colored::control::set_override(false);
        let fields = vec![Field::new("Role", "ADMIN"), Field::new("Expires", "soon")];

        let out = format_pretty("Session", &fields);

        assert_eq!(out, "Session\n\nRole:    ADMIN\nExpires: soon");
    }
}
