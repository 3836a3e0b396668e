//! Tariff catalog: lookups over the `hts_records` table.

use std::sync::Arc;

use rusqlite::{OptionalExtension, Row};
use tracing::debug;

use tariffbot_core::error::TariffError;
use tariffbot_core::types::{CandidateRecord, HtsCode};

use crate::db::Database;
use crate::keywords::{description_matches, extract_keywords, words, Keyword};

const RECORD_COLUMNS: &str =
    "hts_code, indent, description, unit_of_quantity, general_rate, special_rate, other_rate";

/// Read and write access to the HTS catalog.
#[derive(Debug, Clone)]
pub struct TariffCatalog {
    db: Arc<Database>,
}

impl TariffCatalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Structured lookup for free text.
    ///
    /// Results are ordered exact code matches first, then prefix matches in
    /// code order, then description keyword matches, capped at `limit`.
    /// Keyword matches rank by keywords matched, then by description length
    /// (the most specific description wins), then code order. No match is
    /// `Ok(vec![])`.
    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<CandidateRecord>, TariffError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let codes = HtsCode::find_all(text);
        let mut results = self.find_by_codes(&codes, limit)?;

        if results.len() < limit {
            for record in self.find_by_keywords(&extract_keywords(text), limit)? {
                push_unique(&mut results, record);
            }
        }

        results.truncate(limit);
        debug!(
            query = text,
            codes = codes.len(),
            results = results.len(),
            "Catalog search"
        );
        Ok(results)
    }

    /// Exact hits for `codes` in the order given, then records below them in
    /// code order, capped at `limit`.
    pub fn find_by_codes(
        &self,
        codes: &[HtsCode],
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, TariffError> {
        let mut results: Vec<CandidateRecord> = Vec::new();
        for code in codes {
            if let Some(record) = self.find_by_code(code)? {
                push_unique(&mut results, record);
            }
        }
        for code in codes {
            for record in self.find_by_prefix(code, limit)? {
                push_unique(&mut results, record);
            }
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Exact lookup by code.
    pub fn find_by_code(&self, code: &HtsCode) -> Result<Option<CandidateRecord>, TariffError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM hts_records WHERE hts_code = ?1", RECORD_COLUMNS);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![code.as_str()], |row| Ok(row_to_record(row)))
                .optional()
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// Records strictly below `code` in the hierarchy, in code order.
    pub fn find_by_prefix(
        &self,
        code: &HtsCode,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, TariffError> {
        let digits = code.digits();
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM hts_records
                 WHERE digits LIKE ?1 AND digits <> ?2
                 ORDER BY digits ASC
                 LIMIT ?3",
                RECORD_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![format!("{}%", digits), digits, limit as i64],
                    |row| Ok(row_to_record(row)),
                )
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| TariffError::Storage(e.to_string()))??);
            }
            Ok(records)
        })
    }

    /// Records whose description mentions any of `keywords`, most matches
    /// first, then the shortest description, then code order.
    pub fn find_by_keywords(
        &self,
        keywords: &[Keyword],
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, TariffError> {
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // LIKE narrows the scan; word-level matching below decides.
        let patterns: Vec<String> = keywords
            .iter()
            .flat_map(|k| k.variants.iter())
            .map(|v| format!("%{}%", v))
            .collect();
        let filter = vec!["description LIKE ?"; patterns.len()].join(" OR ");

        let candidates = self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM hts_records WHERE {} ORDER BY digits ASC",
                RECORD_COLUMNS, filter
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params_from_iter(patterns.iter()), |row| {
                    Ok(row_to_record(row))
                })
                .map_err(|e| TariffError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| TariffError::Storage(e.to_string()))??);
            }
            Ok(records)
        })?;

        let mut scored: Vec<(usize, usize, CandidateRecord)> = candidates
            .into_iter()
            .filter_map(|record| {
                let matched = keywords
                    .iter()
                    .filter(|k| description_matches(&record.description, k))
                    .count();
                let length = words(&record.description).len();
                (matched > 0).then_some((matched, length, record))
            })
            .collect();

        // Candidates arrive in code order and the sort is stable, so equal
        // scores stay in code order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, _, record)| record).collect())
    }

    /// Insert or replace records in one transaction. Returns the number written.
    pub fn upsert_many(&self, records: &[CandidateRecord]) -> Result<usize, TariffError> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| TariffError::Storage(format!("Failed to begin transaction: {}", e)))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO hts_records
                            (hts_code, digits, indent, description, unit_of_quantity,
                             general_rate, special_rate, other_rate)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(hts_code) DO UPDATE SET
                            indent = excluded.indent,
                            description = excluded.description,
                            unit_of_quantity = excluded.unit_of_quantity,
                            general_rate = excluded.general_rate,
                            special_rate = excluded.special_rate,
                            other_rate = excluded.other_rate,
                            updated_at = strftime('%s', 'now')",
                    )
                    .map_err(|e| TariffError::Storage(e.to_string()))?;

                for record in records {
                    stmt.execute(rusqlite::params![
                        record.hts_code.as_str(),
                        record.hts_code.digits(),
                        record.indent,
                        record.description,
                        record.unit_of_quantity,
                        record.general_rate,
                        record.special_rate,
                        record.other_rate,
                    ])
                    .map_err(|e| {
                        TariffError::Storage(format!(
                            "Failed to upsert {}: {}",
                            record.hts_code, e
                        ))
                    })?;
                }
            }
            tx.commit()
                .map_err(|e| TariffError::Storage(format!("Failed to commit import: {}", e)))?;
            Ok(records.len())
        })
    }

    /// Number of records in the catalog.
    pub fn count(&self) -> Result<u64, TariffError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM hts_records", [], |row| row.get(0))
                .map_err(|e| TariffError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn push_unique(results: &mut Vec<CandidateRecord>, record: CandidateRecord) {
    if !results.iter().any(|r| r.hts_code == record.hts_code) {
        results.push(record);
    }
}

fn row_to_record(row: &Row<'_>) -> Result<CandidateRecord, TariffError> {
    let code: String = row
        .get(0)
        .map_err(|e| TariffError::Storage(e.to_string()))?;
    let indent: i64 = row
        .get(1)
        .map_err(|e| TariffError::Storage(e.to_string()))?;

    Ok(CandidateRecord {
        hts_code: HtsCode::parse(&code)?,
        indent: indent.max(0) as u32,
        description: row.get(2).map_err(|e| TariffError::Storage(e.to_string()))?,
        unit_of_quantity: row.get(3).map_err(|e| TariffError::Storage(e.to_string()))?,
        general_rate: row.get(4).map_err(|e| TariffError::Storage(e.to_string()))?,
        special_rate: row.get(5).map_err(|e| TariffError::Storage(e.to_string()))?,
        other_rate: row.get(6).map_err(|e| TariffError::Storage(e.to_string()))?,
    })
}
