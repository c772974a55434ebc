//! Plain-text rendering of a response envelope for terminal output.

use std::fmt::Write as _;

use crate::envelope::{NamedTable, ResponseEnvelope};

pub fn render_envelope(envelope: &ResponseEnvelope) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", envelope.general);
    for list in &envelope.lists {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}:", list.title);
        for item in &list.items {
            let _ = writeln!(output, "  - {item}");
        }
    }
    for table in &envelope.tables {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", render_table(table));
    }
    output
}

fn render_table(table: &NamedTable) -> String {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", table.title);
    let _ = writeln!(output, "{}", format_row(&table.columns, &widths));
    let separators: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
    let _ = writeln!(output, "{}", separators.join("  "));
    for row in &table.rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let padding = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NamedList;

    #[test]
    fn renders_summary_lists_and_tables() {
        let envelope = ResponseEnvelope {
            ok: true,
            general: "Two students".to_string(),
            lists: vec![NamedList {
                title: "Did you mean".to_string(),
                items: vec!["Ana Ruiz".to_string()],
            }],
            tables: vec![NamedTable {
                title: "Scores".to_string(),
                columns: vec!["NOMBRE".to_string(), "NOTA".to_string()],
                rows: vec![vec!["Ana".to_string(), "80".to_string()]],
            }],
        };
        let text = render_envelope(&envelope);
        assert!(text.contains("Two students"));
        assert!(text.contains("  - Ana Ruiz"));
        assert!(text.contains("NOMBRE  NOTA"));
        assert!(text.contains("Ana     80"));
    }
}
