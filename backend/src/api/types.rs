//! REST API types for frontend integration.
//!
//! All bodies are camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::export::OutputEncoding;
use crate::models::{Selection, Table, Target};
use crate::session::Session;
use crate::transform::operations::{Operation, Step};

/// First rows of a table plus its full size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

impl TablePreview {
    pub fn of(table: &Table, rows: usize) -> Self {
        Self {
            columns: table.columns().to_vec(),
            rows: table.head(rows).raw_rows().to_vec(),
            total_rows: table.len(),
        }
    }
}

/// State of an editing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub file_name: String,
    pub format: String,
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// Uploaded table preview
    pub preview: TablePreview,
    pub selection: Option<Selection>,
    /// Working table preview, once columns are selected
    pub working: Option<TablePreview>,
    pub history: Vec<String>,
}

impl SessionResponse {
    pub fn new(session_id: &str, session: &Session, source_rows: usize, working_rows: usize) -> Self {
        let source = session.source();
        Self {
            session_id: session_id.to_string(),
            file_name: session.file_name().to_string(),
            format: source.format.as_str().to_string(),
            encoding: source.encoding.clone(),
            delimiter: source.delimiter.map(|d| d.to_string()),
            columns: source.table.columns().to_vec(),
            row_count: source.table.len(),
            preview: TablePreview::of(&source.table, source_rows),
            selection: session.selection().cloned(),
            working: session.working().map(|t| TablePreview::of(t, working_rows)),
            history: history_labels(session.history()),
        }
    }
}

/// Column choice for a session.
pub type SelectionRequest = Selection;

/// Result of a selection change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub session_id: String,
    pub selection: Selection,
    /// True when the working table was rebuilt from the upload
    pub reset: bool,
    pub preview: TablePreview,
}

/// Operation to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Column to rewrite (the operation's default when omitted)
    #[serde(default)]
    pub target: Option<Target>,
    pub operation: Operation,
}

impl OperationRequest {
    pub fn step(&self) -> Step {
        match self.target {
            Some(target) => Step::new(target, self.operation),
            None => Step::from(self.operation),
        }
    }
}

/// Result of an applied operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub session_id: String,
    pub applied: String,
    pub history: Vec<String>,
    pub preview: TablePreview,
}

/// Operation descriptor for `/api/operations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    pub default_target: Target,
    pub idempotent: bool,
}

impl From<Operation> for OperationInfo {
    fn from(op: Operation) -> Self {
        Self {
            name: op.name().to_string(),
            description: op.description().to_string(),
            default_target: op.default_target(),
            idempotent: op.is_idempotent(),
        }
    }
}

/// All operations, in display order.
pub fn operation_infos() -> Vec<OperationInfo> {
    Operation::ALL.iter().copied().map(OperationInfo::from).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    pub rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    pub encoding: Option<OutputEncoding>,
}

fn history_labels(history: &[Step]) -> Vec<String> {
    history.iter().map(Step::to_string).collect()
}

/// Step labels for a session history.
pub fn history_of(session: &Session) -> Vec<String> {
    history_labels(session.history())
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
