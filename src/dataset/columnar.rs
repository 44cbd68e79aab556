//! Parquet loading through the row-oriented record API.

use super::record::{Record, Scalar};
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn load(path: &Path) -> Result<Vec<Record>> {
    let reader = SerializedFileReader::new(File::open(path)?)?;

    let columns: Arc<[String]> = reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut records = Vec::with_capacity(reader.metadata().file_metadata().num_rows().max(0) as usize);
    for row in reader.get_row_iter(None)? {
        let row = row?;
        let values = row
            .get_column_iter()
            .map(|(_, field)| to_scalar(field))
            .collect();
        records.push(Record::new(columns.clone(), values));
    }
    Ok(records)
}

/// Maps a parquet cell onto the JSON-compatible scalar set.
///
/// Dates and timestamps become epoch milliseconds. Nested values keep their
/// textual rendering.
fn to_scalar(field: &Field) -> Scalar {
    match field {
        Field::Null => Scalar::Null,
        Field::Bool(b) => Scalar::Bool(*b),
        Field::Byte(v) => Scalar::Int(i64::from(*v)),
        Field::Short(v) => Scalar::Int(i64::from(*v)),
        Field::Int(v) => Scalar::Int(i64::from(*v)),
        Field::Long(v) => Scalar::Int(*v),
        Field::UByte(v) => Scalar::Int(i64::from(*v)),
        Field::UShort(v) => Scalar::Int(i64::from(*v)),
        Field::UInt(v) => Scalar::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Scalar::Int)
            .unwrap_or(Scalar::Float(*v as f64)),
        Field::Float16(v) => float(f64::from(v.to_f32())),
        Field::Float(v) => float(f64::from(*v)),
        Field::Double(v) => float(*v),
        Field::Decimal(_) => {
            let text = field.to_string();
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Scalar::Float(v),
                _ => Scalar::Str(text),
            }
        }
        Field::Str(s) => Scalar::Str(s.clone()),
        Field::Bytes(bytes) => match std::str::from_utf8(bytes.data()) {
            Ok(s) => Scalar::Str(s.to_string()),
            Err(_) => Scalar::Str(STANDARD.encode(bytes.data())),
        },
        Field::Date(days) => Scalar::Int(i64::from(*days) * MILLIS_PER_DAY),
        Field::TimestampMillis(ms) => Scalar::Int(*ms),
        Field::TimestampMicros(us) => Scalar::Int(us.div_euclid(1000)),
        other => Scalar::Str(other.to_string()),
    }
}

/// NaN and infinities have no JSON form; they load as null.
fn float(v: f64) -> Scalar {
    if v.is_finite() {
        Scalar::Float(v)
    } else {
        Scalar::Null
    }
}
