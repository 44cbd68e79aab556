pub mod columnar;
pub mod delimited;
pub mod record;

pub use record::{Record, Scalar};

use crate::{Error, Result};
use std::fmt;
use std::path::Path;

/// On-disk dataset formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Parquet,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(DatasetFormat::Csv),
            Some("parquet") => Ok(DatasetFormat::Parquet),
            _ => Err(Error::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFormat::Csv => write!(f, "CSV"),
            DatasetFormat::Parquet => write!(f, "Parquet"),
        }
    }
}

/// Reads the whole dataset into memory, in file order.
pub fn load(path: &Path) -> Result<(DatasetFormat, Vec<Record>)> {
    let format = DatasetFormat::from_path(path)?;
    let records = match format {
        DatasetFormat::Csv => delimited::load(path)?,
        DatasetFormat::Parquet => columnar::load(path)?,
    };
    Ok((format, records))
}
