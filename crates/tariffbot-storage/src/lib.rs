//! TariffBot storage crate: the SQLite-backed HTS catalog.
//!
//! Provides a WAL-mode database with migrations, the `TariffCatalog`
//! lookup used for structured questions, keyword extraction for
//! description matching, and the USITC JSON import.

pub mod catalog;
pub mod db;
pub mod import;
pub mod keywords;
pub mod migrations;

pub use catalog::TariffCatalog;
pub use db::Database;
pub use import::{import_file, import_json, ImportSummary};
pub use keywords::{extract_keywords, Keyword};
