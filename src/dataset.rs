//! Tabular loader: parses delimited text into a typed, in-memory dataset.
//!
//! Loading never fails on malformed content: an empty file, a missing header,
//! or a ragged row all degrade to "less data" rather than an error, because
//! every caller must still be able to answer with a well-formed envelope.

use std::path::Path;

use anyhow::Result;
use encoding_rs::Encoding;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{io_utils, normalize};

/// Number of leading non-empty samples examined per column during inference.
const TYPE_SAMPLE_SIZE: usize = 25;
/// Fraction of samples that must parse as numbers for a column to be Numeric.
const NUMERIC_THRESHOLD: f64 = 0.6;

const NAME_COLUMN_ALIASES: &[&str] = &["nombre", "name", "estudiante", "student", "alumno"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

/// One cell. Numeric columns hold `Number` or `Missing` (unparseable or empty);
/// text columns hold `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }
}

pub type Record = Vec<Value>;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub rows: Vec<Record>,
    name_column: Option<usize>,
}

impl Dataset {
    /// Parse delimited text into a dataset. Empty input yields an empty
    /// dataset, not an error.
    pub fn parse(text: &str, delimiter: Option<u8>) -> Dataset {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let Some(header_line) = text.lines().next().filter(|l| !l.trim().is_empty()) else {
            return Dataset::default();
        };
        let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(header_line));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .double_quote(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let Ok(record) = record else { continue };
            raw_rows.push(record.iter().map(|f| f.trim().to_string()).collect());
        }
        if raw_rows.is_empty() {
            return Dataset::default();
        }

        let headers = raw_rows.remove(0);
        if headers.iter().all(|h| h.is_empty()) {
            return Dataset::default();
        }
        for row in &mut raw_rows {
            row.resize(headers.len(), String::new());
        }

        let columns = infer_columns(&headers, &raw_rows);
        debug!(
            "Parsed {} row(s) across {} column(s) with delimiter '{}'",
            raw_rows.len(),
            columns.len(),
            delimiter as char
        );

        let rows = raw_rows
            .into_iter()
            .map(|raw| {
                columns
                    .iter()
                    .zip(raw)
                    .map(|(column, cell)| coerce(&cell, column.data_type))
                    .collect()
            })
            .collect();

        let name_column = detect_name_column(&columns);
        Dataset {
            columns,
            rows,
            name_column,
        }
    }

    pub fn load(
        path: &Path,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Dataset> {
        let text = io_utils::read_to_string(path, encoding)?;
        Ok(Dataset::parse(&text, delimiter))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// Index of the column whose header matches `name` case/accent-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| normalize::eq_fold(&c.name, name))
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = (usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.data_type == ColumnType::Numeric)
    }

    /// Index of the column holding entity names, when one could be detected.
    pub fn name_column(&self) -> Option<usize> {
        self.name_column
    }

    pub fn entity_name(&self, row: &Record) -> Option<String> {
        let idx = self.name_column?;
        match row.get(idx)? {
            Value::Text(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn numeric_value(&self, row: &Record, column: usize) -> Option<f64> {
        row.get(column).and_then(Value::as_number)
    }

    pub fn display_value(&self, row: &Record, column: usize) -> String {
        row.get(column).map(Value::as_display).unwrap_or_default()
    }
}

/// The more frequent of `;` and `,` in the header line wins for the whole
/// file; ties fall back to the comma.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas { b';' } else { b',' }
}

/// Parse a free-form numeric cell: strips currency/unit symbols, accepts both
/// decimal comma and decimal dot.
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ','))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains(',') {
        if cleaned.contains('.') {
            // Both present: treat the comma as a thousands separator.
            cleaned = cleaned.replace(',', "");
        } else {
            cleaned = cleaned.replace(',', ".");
        }
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn infer_columns(headers: &[String], rows: &[Vec<String>]) -> Vec<Column> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut sampled = 0usize;
            let mut numeric = 0usize;
            for row in rows {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                if cell.is_empty() {
                    continue;
                }
                sampled += 1;
                if parse_number(cell).is_some() {
                    numeric += 1;
                }
                if sampled >= TYPE_SAMPLE_SIZE {
                    break;
                }
            }
            let data_type = if sampled > 0 && (numeric as f64 / sampled as f64) >= NUMERIC_THRESHOLD
            {
                ColumnType::Numeric
            } else {
                ColumnType::Text
            };
            Column {
                name: unquote(name),
                data_type,
            }
        })
        .collect()
}

fn coerce(cell: &str, data_type: ColumnType) -> Value {
    let cell = unquote(cell);
    match data_type {
        ColumnType::Numeric => match parse_number(&cell) {
            Some(n) => Value::Number(n),
            None => Value::Missing,
        },
        ColumnType::Text => Value::Text(cell),
    }
}

fn unquote(cell: &str) -> String {
    let trimmed = cell.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

fn detect_name_column(columns: &[Column]) -> Option<usize> {
    for alias in NAME_COLUMN_ALIASES {
        if let Some(idx) = columns
            .iter()
            .position(|c| normalize::fold(&c.name).contains(alias))
        {
            return Some(idx);
        }
    }
    columns.iter().position(|c| c.data_type == ColumnType::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "NOMBRE;PARALELO;AUTOESTIMA\nAna Ruiz;A;80\nBeto Paz;B;30\n";

    #[test]
    fn detects_semicolon_delimiter_from_header() {
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("plain header"), b',');
    }

    #[test]
    fn parses_typed_columns() {
        let dataset = Dataset::parse(SAMPLE, None);
        assert_eq!(dataset.columns.len(), 3);
        assert_eq!(dataset.columns[0].data_type, ColumnType::Text);
        assert_eq!(dataset.columns[2].data_type, ColumnType::Numeric);
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.numeric_value(&dataset.rows[0], 2), Some(80.0));
        assert_eq!(dataset.name_column(), Some(0));
    }

    #[test]
    fn empty_input_yields_empty_dataset() {
        assert!(Dataset::parse("", None).is_empty());
        assert!(Dataset::parse("   \n", None).is_empty());
    }

    #[test]
    fn short_rows_are_padded_with_missing() {
        let dataset = Dataset::parse("NOMBRE,NOTA\nAna\n", None);
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.rows[0][1], Value::Missing);
    }

    #[test]
    fn bom_is_stripped_from_header() {
        let dataset = Dataset::parse("\u{feff}NOMBRE,NOTA\nAna,7\n", None);
        assert_eq!(dataset.columns[0].name, "NOMBRE");
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let dataset = Dataset::parse("NOMBRE,NOTA\n\"Ruiz, Ana\",7\n", None);
        assert_eq!(dataset.display_value(&dataset.rows[0], 0), "Ruiz, Ana");
    }

    #[test]
    fn doubled_quotes_unescape() {
        assert_eq!(unquote("\"say \"\"hi\"\"\""), "say \"hi\"");
    }

    #[test]
    fn parse_number_accepts_decimal_comma_and_symbols() {
        assert_eq!(parse_number("7,5"), Some(7.5));
        assert_eq!(parse_number(" 80 pts"), Some(80.0));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn non_numeric_values_in_numeric_column_become_missing() {
        let dataset = Dataset::parse("NOMBRE,NOTA\nAna,7\nBeto,N/A\nCarla,9\n", None);
        assert_eq!(dataset.columns[1].data_type, ColumnType::Numeric);
        assert_eq!(dataset.rows[1][1], Value::Missing);
    }
}
