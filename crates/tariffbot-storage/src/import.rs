//! Catalog import from the USITC HTS JSON export.
//!
//! The export is a JSON array of rows shaped like
//! `{"htsno": "0101.30.00.00", "indent": "1", "description": "Asses",
//!   "units": ["No."], "general": "6.8%", "special": "Free (A+,AU)", "other": "15%"}`.
//! Rows without an `htsno` are section and chapter captions and are skipped.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use tariffbot_core::error::TariffError;
use tariffbot_core::types::{CandidateRecord, HtsCode};

use crate::catalog::TariffCatalog;

#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(default)]
    htsno: String,
    #[serde(default)]
    indent: Value,
    #[serde(default)]
    description: String,
    #[serde(default)]
    units: Value,
    #[serde(default)]
    general: Option<String>,
    #[serde(default)]
    special: Option<String>,
    #[serde(default)]
    other: Option<String>,
}

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Caption rows without a code.
    pub skipped: usize,
    /// Rows whose code could not be parsed.
    pub invalid: usize,
}

/// Import the export at `path` into `catalog`.
pub fn import_file(catalog: &TariffCatalog, path: &Path) -> Result<ImportSummary, TariffError> {
    let content = std::fs::read_to_string(path)?;
    let summary = import_json(catalog, &content)?;
    info!(
        path = %path.display(),
        imported = summary.imported,
        skipped = summary.skipped,
        invalid = summary.invalid,
        "Catalog import finished"
    );
    Ok(summary)
}

/// Import an export document held in memory. Idempotent: rows are upserted
/// by code in a single transaction.
pub fn import_json(catalog: &TariffCatalog, content: &str) -> Result<ImportSummary, TariffError> {
    let rows: Vec<ExportRow> = serde_json::from_str(content)
        .map_err(|e| TariffError::Import(format!("Malformed HTS export: {}", e)))?;

    let mut summary = ImportSummary::default();
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        if row.htsno.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }
        match HtsCode::parse(&row.htsno) {
            Ok(code) => records.push(to_record(code, row)),
            Err(_) => {
                warn!(htsno = %row.htsno, "Skipping row with invalid HTS number");
                summary.invalid += 1;
            }
        }
    }

    summary.imported = catalog.upsert_many(&records)?;
    Ok(summary)
}

fn to_record(hts_code: HtsCode, row: ExportRow) -> CandidateRecord {
    let indent = match &row.indent {
        Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let unit_of_quantity = match &row.units {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        _ => String::new(),
    };

    CandidateRecord {
        hts_code,
        indent,
        description: row.description.trim().to_string(),
        unit_of_quantity,
        general_rate: row.general.unwrap_or_default().trim().to_string(),
        special_rate: row.special.unwrap_or_default().trim().to_string(),
        other_rate: row.other.unwrap_or_default().trim().to_string(),
    }
}
