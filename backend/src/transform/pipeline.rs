//! High-level pipeline API: upload file in, registry file out.
//!
//! Combines all steps: parsing, column selection, operations and export.
//!
//! # Example
//!
//! ```rust,ignore
//! use reestr::{process_file, ProcessOptions};
//! use std::path::Path;
//!
//! let options = ProcessOptions::new("ICCID", "Phone")
//!     .with_steps(["id:strip-non-digits".parse()?, "id:append-check-digit".parse()?]);
//! let result = process_file(Path::new("sims.xlsx"), &options)?;
//! std::fs::write(&result.registry.file_name, &result.registry.content)?;
//! ```

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::export::{ExportOptions, OutputEncoding, Registry};
use crate::models::Selection;
use crate::parser::{parse_bytes, parse_file, ParsedFile};
use crate::session::Session;

use super::operations::Step;

/// Options for the processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Identifier and phone columns
    pub selection: Selection,

    /// Operations to apply, in order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Output charset
    #[serde(default)]
    pub encoding: OutputEncoding,

    /// Date used in the file name (today when unset)
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Refuse to write a registry with no rows
    #[serde(default)]
    pub reject_empty: bool,
}

impl ProcessOptions {
    pub fn new(id_column: impl Into<String>, phone_column: impl Into<String>) -> Self {
        Self {
            selection: Selection::new(id_column, phone_column),
            steps: Vec::new(),
            encoding: OutputEncoding::default(),
            date: None,
            reject_empty: false,
        }
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Source file information
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub format: String,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub columns: Vec<String>,
    pub row_count: usize,
}

impl From<&ParsedFile> for SourceInfo {
    fn from(parsed: &ParsedFile) -> Self {
        Self {
            format: parsed.format.as_str().to_string(),
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            columns: parsed.table.columns().to_vec(),
            row_count: parsed.table.len(),
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Upload metadata
    pub source: SourceInfo,
    /// Steps applied, in order
    pub steps: Vec<Step>,
    /// The registry file
    pub registry: Registry,
}

/// Process a file from disk.
///
/// This is the main entry point for batch use. It:
/// 1. Parses the file (format from its extension)
/// 2. Selects the ID and phone columns
/// 3. Applies each step in order
/// 4. Renames the columns and encodes the registry
pub fn process_file(path: &Path, options: &ProcessOptions) -> PipelineResult<ProcessResult> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_file(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    process_parsed(name, parsed, options)
}

/// Process uploaded bytes.
///
/// Same as `process_file` but accepts raw bytes and the original file name.
pub fn process_bytes(
    bytes: &[u8],
    file_name: &str,
    options: &ProcessOptions,
) -> PipelineResult<ProcessResult> {
    log_info(format!("📖 Reading {} ({} bytes)...", file_name, bytes.len()));
    let parsed = parse_bytes(bytes, file_name)?;
    process_parsed(file_name, parsed, options)
}

/// Internal: run a parsed file through a fresh session
fn process_parsed(
    file_name: &str,
    parsed: ParsedFile,
    options: &ProcessOptions,
) -> PipelineResult<ProcessResult> {
    let source = SourceInfo::from(&parsed);
    print_source_info(&source);

    if options.reject_empty && parsed.table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut session = Session::new(file_name, parsed);
    session.select_columns(options.selection.clone())?;
    log_success(format!(
        "Selected ID column '{}' and phone column '{}'",
        options.selection.id_column, options.selection.phone_column
    ));

    if options.steps.is_empty() {
        log_warning("No operations requested, exporting columns as they are");
    }
    for step in &options.steps {
        log_info(format!("⚙️  Applying {}...", step));
        session.apply_step(*step)?;
    }

    let date = options.date.unwrap_or_else(|| Local::now().date_naive());
    let registry = session.export(
        &ExportOptions {
            encoding: options.encoding,
        },
        date,
    )?;
    log_success(format!(
        "Registry {} ready: {} rows, {} bytes ({})",
        registry.file_name,
        registry.row_count(),
        registry.content.len(),
        registry.encoding
    ));

    Ok(ProcessResult {
        source,
        steps: session.history().to_vec(),
        registry,
    })
}

/// Print source information
fn print_source_info(source: &SourceInfo) {
    if let Some(ref enc) = source.encoding {
        log_success(format!("Detected encoding: {}", enc));
    }
    if let Some(d) = source.delimiter {
        log_success(format!("Detected separator: '{}'", format_delimiter(d)));
    }
    log_success(format!("Read {} rows", source.row_count));
    log_info(format!("📋 {} columns:", source.columns.len()));
    for (i, col) in source.columns.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::compute_check_digit;
    use crate::error::{SessionError, TransformError};
    use crate::transform::operations::Operation;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn test_end_to_end_check_digit() {
        let csv = "ID;Phone\n89161234567;9161234567\n";
        let options = ProcessOptions::new("ID", "Phone")
            .with_steps([
                Step::new(crate::models::Target::Id, Operation::StripNonDigits),
                Step::new(crate::models::Target::Id, Operation::AppendCheckDigit),
                Step::from(Operation::PrefixPlusSeven),
            ])
            .with_encoding(OutputEncoding::Utf8)
            .with_date(date());

        let result = process_bytes(csv.as_bytes(), "sims.csv", &options).unwrap();

        let expected_id = format!("89161234567{}", compute_check_digit("89161234567").unwrap());
        assert_eq!(
            result.registry.table.column_values("ZSIM_ID").unwrap(),
            vec![expected_id.as_str()]
        );
        assert_eq!(
            result.registry.table.column_values("ZSIM_PHNR").unwrap(),
            vec!["+79161234567"]
        );
        assert_eq!(result.registry.file_name, "reestr_1_31122024.csv");
        assert_eq!(
            String::from_utf8(result.registry.content).unwrap(),
            format!("ZSIM_ID;ZSIM_PHNR\n{};+79161234567\n", expected_id)
        );
        assert_eq!(result.steps.len(), 3);
    }

    #[test]
    fn test_extra_columns_dropped() {
        let csv = "Name,ICCID,Phone\nIvan,897,916\nPetr,898,917\n";
        let options = ProcessOptions::new("ICCID", "Phone").with_date(date());

        let result = process_bytes(csv.as_bytes(), "x.CSV", &options).unwrap();
        assert_eq!(result.source.columns, vec!["Name", "ICCID", "Phone"]);
        assert_eq!(result.source.delimiter, Some(','));
        assert_eq!(result.registry.table.columns(), &["ZSIM_ID", "ZSIM_PHNR"]);
        assert_eq!(result.registry.file_name, "reestr_2_31122024.csv");
    }

    #[test]
    fn test_failing_step_aborts() {
        let csv = "ID;Phone\nn/a;916\n";
        let options = ProcessOptions::new("ID", "Phone")
            .with_steps([Step::from(Operation::AppendCheckDigit)]);

        let err = process_bytes(csv.as_bytes(), "sims.csv", &options).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Session(SessionError::Transform(TransformError::RowFailed { row: 0, .. }))
        ));
    }

    #[test]
    fn test_unknown_column() {
        let options = ProcessOptions::new("ICCID", "Phone");
        let err = process_bytes(b"ID;Phone\n1;2\n", "sims.csv", &options).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Session(SessionError::UnknownColumn(ref c)) if c == "ICCID"
        ));
    }

    #[test]
    fn test_reject_empty() {
        let mut options = ProcessOptions::new("ID", "Phone");
        options.reject_empty = true;
        let err = process_bytes(b"ID;Phone\n", "sims.csv", &options).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));

        options.reject_empty = false;
        let ok = process_bytes(b"ID;Phone\n", "sims.csv", &options).unwrap();
        assert_eq!(ok.registry.row_count(), 0);
    }

    #[test]
    fn test_process_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sims.csv");
        std::fs::write(&path, "ID;Phone\n7992739871;9161234567\n").unwrap();

        let options = ProcessOptions::new("ID", "Phone")
            .with_steps(["append-check-digit".parse::<Step>().unwrap()])
            .with_date(date());
        let result = process_file(&path, &options).unwrap();

        let (text, _, _) = encoding_rs::WINDOWS_1251.decode(&result.registry.content);
        assert_eq!(text, "ZSIM_ID;ZSIM_PHNR\n79927398713;9161234567\n");
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter('\t'), "TAB");
        assert_eq!(format_delimiter(';'), ";");
    }
}
