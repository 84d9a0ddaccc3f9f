//! Error types for the reestr pipeline.
//!
//! One error enum per layer:
//!
//! - [`ChecksumError`] - Luhn input precondition violations
//! - [`TableError`] - Malformed tables
//! - [`ParseError`] - Reading `.csv` / `.xlsx` uploads
//! - [`TransformError`] - Column operations
//! - [`SessionError`] - Column selection and working-table state
//! - [`ExportError`] - Writing the registry file
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Checksum Errors
// =============================================================================

/// Input to the check digit computation is not a digit string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    /// Nothing to compute a check digit from.
    #[error("cannot compute a check digit of an empty digit string")]
    Empty,

    /// A character other than `0-9` was found.
    #[error("non-digit character '{found}' at position {position}")]
    NonDigit { position: usize, found: char },
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised when building a [`crate::models::Table`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A row does not have one value per column.
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Column lookup failed.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while reading an uploaded file into a table.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is neither `.csv` nor `.xlsx`.
    #[error("Unsupported file type '{0}', expected .csv or .xlsx")]
    UnsupportedFormat(String),

    /// Bytes could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid delimited text.
    #[error("Invalid CSV format: {0}")]
    Csv(String),

    /// Invalid or unreadable workbook.
    #[error("Invalid XLSX workbook: {0}")]
    Xlsx(String),

    /// Nothing to read.
    #[error("File is empty")]
    EmptyFile,

    /// Header row could not form a table.
    #[error(transparent)]
    Table(#[from] TableError),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors while applying operations to a table column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Target column is not in the table.
    #[error("Missing column: {0}")]
    UnknownColumn(String),

    /// Operation name not recognized.
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    /// Target name not recognized.
    #[error("Unknown target '{0}', expected 'id' or 'phone'")]
    UnknownTarget(String),

    /// Operation failed on one value; the table was not modified.
    #[error("Operation '{operation}' failed on row {row}, column '{column}': {source}")]
    RowFailed {
        operation: String,
        row: usize,
        column: String,
        #[source]
        source: ChecksumError,
    },
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors from the editing session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operations need an ID and a phone column first.
    #[error("No columns selected yet")]
    NoSelection,

    /// ID and phone must be different columns.
    #[error("Column '{0}' cannot be both the ID and the phone column")]
    SameColumn(String),

    /// Selected column is not in the uploaded table.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Operation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// No session under this id (or it expired).
    #[error("Session not found: {0}")]
    NotFound(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the registry file.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Label does not name a supported output encoding.
    #[error("Unsupported output encoding: {0}")]
    UnsupportedEncoding(String),

    /// The text contains a character the output encoding cannot represent.
    #[error("Character '{character}' cannot be written as {encoding}")]
    Unencodable { character: char, encoding: String },

    /// Output columns could not be formed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// CSV writer failure.
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::process_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No rows to export.
    #[error("No rows to process")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Session error.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload over the configured limit.
    #[error("Upload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for checksum operations.
pub type ChecksumResult<T> = Result<T, ChecksumError>;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
