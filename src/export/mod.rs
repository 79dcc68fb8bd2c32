//! CSV assembly of harvested schools.

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::harvest::Enrichment;
use crate::models::SchoolRecord;

/// Column order of the exported file
pub const CSV_HEADERS: [&str; 5] = ["school_name", "address", "city", "province", "phone"];

const FILE_PREFIX: &str = "sekolah_kita";

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One output line; absent values are written as empty cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub school_name: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub phone: String,
}

impl ExportRow {
    pub fn from_record(record: &SchoolRecord, phone: Option<&str>) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            school_name: text(&record.name),
            address: text(&record.address),
            city: text(&record.locality),
            province: text(&record.region),
            phone: phone.unwrap_or_default().to_string(),
        }
    }
}

/// Join records with their contacts, one row per record in collection order
pub fn assemble(records: &[SchoolRecord], enrichment: &Enrichment) -> Vec<ExportRow> {
    records
        .iter()
        .map(|record| {
            let phone = record
                .identifier()
                .and_then(|school_id| enrichment.contact(school_id));
            ExportRow::from_record(record, phone)
        })
        .collect()
}

/// Write the header and every row to `writer`
pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<(), ExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(CSV_HEADERS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write rows to a new file at `path`, replacing any existing file
pub fn write_csv_file(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), rows)?;
    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Lowercase `name` and collapse every run of non-alphanumerics into `_`
pub fn slugify(name: &str) -> String {
    let mut slug = name.to_lowercase();
    if let Ok(re) = Regex::new(r"[^a-z0-9]+") {
        slug = re.replace_all(&slug, "_").into_owned();
    }
    slug.trim_matches('_').to_string()
}

/// `<dir>/sekolah_kita[_<region slug>]_<YYYYmmdd_HHMMSS>.csv`
pub fn build_output_path(dir: &Path, region: &str, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let slug = slugify(region);
    let file_name = if slug.is_empty() {
        format!("{}_{}.csv", FILE_PREFIX, stamp)
    } else {
        format!("{}_{}_{}.csv", FILE_PREFIX, slug, stamp)
    };
    dir.join(file_name)
}
