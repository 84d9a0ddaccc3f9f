//! Editing session: the state between upload and download.
//!
//! A [`Session`] owns the uploaded table, the current column
//! [`Selection`] and the working table derived from it. Changing the
//! selection throws the working table away and rebuilds it from the
//! source, so edits never leak from one pair of columns to another.
//!
//! ```text
//! upload ─▶ Session::new ─▶ select_columns ─▶ apply* ─▶ export
//!                               │ (changed)
//!                               └─▶ working table reset
//! ```

use chrono::NaiveDate;

use crate::error::{PipelineResult, SessionError, SessionResult};
use crate::export::{self, ExportOptions, Registry};
use crate::models::{Selection, Table, Target};
use crate::parser::ParsedFile;
use crate::transform::executor;
use crate::transform::operations::{Operation, Step};

/// Rows shown right after upload.
pub const UPLOAD_PREVIEW_ROWS: usize = 2;

/// Rows shown after each operation.
pub const RESULT_PREVIEW_ROWS: usize = 10;

/// Outcome of [`Session::select_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Same columns as before, working table kept.
    Unchanged,
    /// New columns, working table rebuilt from the source.
    Reset,
}

/// State of one upload being edited.
#[derive(Debug, Clone)]
pub struct Session {
    file_name: String,
    source: ParsedFile,
    selection: Option<Selection>,
    working: Option<Table>,
    history: Vec<Step>,
}

impl Session {
    pub fn new(file_name: impl Into<String>, source: ParsedFile) -> Self {
        Self {
            file_name: file_name.into(),
            source,
            selection: None,
            working: None,
            history: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The uploaded file as parsed.
    pub fn source(&self) -> &ParsedFile {
        &self.source
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Working table (selected columns only), if columns are selected.
    pub fn working(&self) -> Option<&Table> {
        self.working.as_ref()
    }

    /// Steps applied since the last reset.
    pub fn history(&self) -> &[Step] {
        &self.history
    }

    /// Pick the ID and phone columns.
    ///
    /// Selecting a different pair rebuilds the working table from the
    /// source and clears the step history; selecting the same pair again
    /// keeps both.
    pub fn select_columns(&mut self, selection: Selection) -> SessionResult<SelectionChange> {
        let table = &self.source.table;
        for column in [&selection.id_column, &selection.phone_column] {
            if !table.has_column(column) {
                return Err(SessionError::UnknownColumn(column.clone()));
            }
        }
        if selection.id_column == selection.phone_column {
            return Err(SessionError::SameColumn(selection.id_column));
        }

        if self.selection.as_ref() == Some(&selection) && self.working.is_some() {
            return Ok(SelectionChange::Unchanged);
        }

        let working = table
            .select(&[selection.id_column.as_str(), selection.phone_column.as_str()])
            .map_err(|_| SessionError::UnknownColumn(selection.id_column.clone()))?;

        self.working = Some(working);
        self.selection = Some(selection);
        self.history.clear();
        Ok(SelectionChange::Reset)
    }

    /// Forget the selection and the working table.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.working = None;
        self.history.clear();
    }

    /// Apply an operation to one of the selected columns.
    ///
    /// On failure the working table is unchanged.
    pub fn apply(&mut self, target: Target, operation: Operation) -> SessionResult<&Table> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let working = self.working.as_mut().ok_or(SessionError::NoSelection)?;

        executor::apply_in_place(working, selection.column(target), operation)?;
        self.history.push(Step::new(target, operation));
        Ok(working)
    }

    /// Apply a step.
    pub fn apply_step(&mut self, step: Step) -> SessionResult<&Table> {
        self.apply(step.target, step.operation)
    }

    /// First rows of the uploaded table.
    pub fn source_preview(&self, rows: usize) -> Table {
        self.source.table.head(rows)
    }

    /// First rows of the working table.
    pub fn preview(&self, rows: usize) -> SessionResult<Table> {
        self.working
            .as_ref()
            .map(|t| t.head(rows))
            .ok_or(SessionError::NoSelection)
    }

    /// Build the downloadable registry for the working table.
    pub fn export(&self, options: &ExportOptions, date: NaiveDate) -> PipelineResult<Registry> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let working = self.working.as_ref().ok_or(SessionError::NoSelection)?;
        Ok(export::build_registry(working, selection, options, date)?)
    }
}
