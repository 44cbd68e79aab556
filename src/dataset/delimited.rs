//! CSV loading with per-column type inference.
//!
//! Every cell is read as text first; each column then gets the narrowest type
//! that fits all of its non-missing cells (integer, then float, then boolean,
//! falling back to string).

use super::record::{Record, Scalar};
use crate::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Cell contents treated as missing values.
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "<NA>", "#N/A",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    /// Only missing cells seen so far.
    Empty,
    Int,
    Float,
    Bool,
    Str,
}

impl ColumnType {
    fn widen(self, cell: &str) -> ColumnType {
        if is_missing(cell) {
            return self;
        }
        let cell_type = classify(cell);
        match (self, cell_type) {
            (ColumnType::Empty, t) => t,
            (a, b) if a == b => a,
            (ColumnType::Int, ColumnType::Float) | (ColumnType::Float, ColumnType::Int) => {
                ColumnType::Float
            }
            _ => ColumnType::Str,
        }
    }

    fn convert(self, cell: &str) -> Scalar {
        if is_missing(cell) {
            return Scalar::Null;
        }
        let trimmed = cell.trim();
        match self {
            ColumnType::Int => trimmed
                .parse()
                .map(Scalar::Int)
                .unwrap_or_else(|_| Scalar::Str(cell.to_string())),
            ColumnType::Float => trimmed
                .parse()
                .map(Scalar::Float)
                .unwrap_or_else(|_| Scalar::Str(cell.to_string())),
            ColumnType::Bool => parse_bool(trimmed)
                .map(Scalar::Bool)
                .unwrap_or_else(|| Scalar::Str(cell.to_string())),
            ColumnType::Empty | ColumnType::Str => Scalar::Str(cell.to_string()),
        }
    }
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

fn classify(cell: &str) -> ColumnType {
    let trimmed = cell.trim();
    if trimmed.parse::<i64>().is_ok() {
        ColumnType::Int
    } else if trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
        ColumnType::Float
    } else if parse_bool(trimmed).is_some() {
        ColumnType::Bool
    } else {
        ColumnType::Str
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn load(path: &Path) -> Result<Vec<Record>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    read(reader)
}

pub(crate) fn read<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Record>> {
    let columns: Arc<[String]> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() != columns.len() {
            return Err(Error::Dataset {
                message: format!(
                    "row {} has {} fields, header has {}",
                    line + 1,
                    row.len(),
                    columns.len()
                ),
            });
        }
        rows.push(row);
    }

    let mut types = vec![ColumnType::Empty; columns.len()];
    for row in &rows {
        for (column_type, cell) in types.iter_mut().zip(row.iter()) {
            *column_type = column_type.widen(cell);
        }
    }
    debug!(?columns, ?types, "Inferred CSV column types");

    Ok(rows
        .iter()
        .map(|row| {
            let values = types
                .iter()
                .zip(row.iter())
                .map(|(column_type, cell)| column_type.convert(cell))
                .collect();
            Record::new(columns.clone(), values)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_str(input: &str) -> Result<Vec<Record>> {
        read(csv::ReaderBuilder::new().from_reader(input.as_bytes()))
    }

    #[test]
    fn test_infers_column_types() {
        let records = read_str("id,price,active,name\n1,2.5,true,apple\n2,3,FALSE,pear\n").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&Scalar::Int(1)));
        assert_eq!(records[1].get("price"), Some(&Scalar::Float(3.0)));
        assert_eq!(records[1].get("active"), Some(&Scalar::Bool(false)));
        assert_eq!(records[0].get("name"), Some(&Scalar::Str("apple".to_string())));
    }

    #[test]
    fn test_missing_cells_become_null() {
        let records = read_str("id,score\n1,\n2,NaN\n3,4\n").unwrap();

        assert_eq!(records[0].get("score"), Some(&Scalar::Null));
        assert_eq!(records[1].get("score"), Some(&Scalar::Null));
        assert_eq!(records[2].get("score"), Some(&Scalar::Int(4)));
    }

    #[test]
    fn test_mixed_column_falls_back_to_string() {
        let records = read_str("code\n10\nA7\n").unwrap();

        assert_eq!(records[0].get("code"), Some(&Scalar::Str("10".to_string())));
        assert_eq!(records[1].get("code"), Some(&Scalar::Str("A7".to_string())));
    }

    #[test]
    fn test_header_only_yields_no_records() {
        let records = read_str("id,name\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_preserves_header_order_in_payload() {
        let records = read_str("z,a\n1,x\n").unwrap();
        let json = String::from_utf8(records[0].to_json_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x"}"#);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let result = read(
            csv::ReaderBuilder::new()
                .flexible(true)
                .from_reader("a,b\n1,2\n3\n".as_bytes()),
        );
        assert!(matches!(result, Err(Error::Dataset { .. })));
    }
}
