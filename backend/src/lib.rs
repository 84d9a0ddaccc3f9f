//! # Reestr - SIM registry preparation
//!
//! Reestr turns an uploaded spreadsheet (CSV or XLSX) into a two-column
//! registry file: an identifier column (usually an ICCID, optionally with a
//! Luhn check digit appended) and a phone column, renamed to `ZSIM_ID` and
//! `ZSIM_PHNR` and written as `;`-separated windows-1251 text.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV / XLSX │────▶│   Parser    │────▶│   Session   │────▶│  Registry   │
//! │  (any enc.) │     │  (auto-enc) │     │ (select+ops)│     │ (cp1251 CSV)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reestr::{process_file, ProcessOptions, Step};
//!
//! let options = ProcessOptions::new("ICCID", "Phone")
//!     .with_steps(["id:append-check-digit".parse::<Step>()?]);
//! let result = process_file("sims.xlsx".as_ref(), &options)?;
//! println!("{}: {} rows", result.registry.file_name, result.registry.row_count());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`checksum`] - Luhn check digit
//! - [`models`] - Table, selection and target types
//! - [`parser`] - CSV/XLSX parsing with auto-detection
//! - [`transform`] - Column operations and pipeline
//! - [`session`] - Interactive editing state
//! - [`export`] - Registry file writer
//! - [`cache`] - Session registry
//! - [`config`] - Server configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod checksum;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Editing state and output
pub mod export;
pub mod session;

// Session storage
pub mod cache;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ChecksumError, ExportError, ParseError, PipelineError, ServerError, SessionError, TableError,
    TransformError,
};

// =============================================================================
// Re-exports - Checksum
// =============================================================================

pub use checksum::{compute_check_digit, is_luhn_valid, with_check_digit};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Row, Selection, Table, Target, OUTPUT_ID_COLUMN, OUTPUT_PHONE_COLUMN};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, parse_csv_bytes,
    parse_csv_str, parse_file, parse_xlsx_bytes, FileFormat, ParsedFile,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    operations_description, process_bytes, process_file, Operation, ProcessOptions,
    ProcessResult, SourceInfo, Step,
};

// =============================================================================
// Re-exports - Session / Export
// =============================================================================

pub use cache::{SessionRegistry, StoredSession};
pub use export::{build_registry, registry_file_name, ExportOptions, OutputEncoding, Registry};
pub use session::{SelectionChange, Session};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::ServerConfig;

// Server
pub mod server {
    pub use crate::api::server::{build_router, start_server, AppState};
}
