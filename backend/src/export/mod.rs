//! Registry export.
//!
//! Renames the selected columns to their fixed output labels, writes the
//! table as `;`-separated text and names the file
//! `reestr_<rowcount>_<ddmmyyyy>.csv`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, ExportResult};
use crate::models::{Selection, Table, OUTPUT_ID_COLUMN, OUTPUT_PHONE_COLUMN};

/// Field separator of the registry file.
pub const OUTPUT_DELIMITER: u8 = b';';

/// Character set of the written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputEncoding {
    /// cp1251, what the registry consumers expect.
    #[default]
    #[serde(rename = "windows-1251")]
    Windows1251,
    #[serde(rename = "utf-8")]
    Utf8,
}

impl OutputEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            OutputEncoding::Windows1251 => "windows-1251",
            OutputEncoding::Utf8 => "utf-8",
        }
    }

    /// Encode text, failing on the first character the charset lacks.
    pub fn encode(&self, text: &str) -> ExportResult<Vec<u8>> {
        match self {
            OutputEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            OutputEncoding::Windows1251 => {
                let enc = encoding_rs::WINDOWS_1251;
                let (bytes, _, had_errors) = enc.encode(text);
                if !had_errors {
                    return Ok(bytes.into_owned());
                }

                let mut buf = [0u8; 4];
                let character = text
                    .chars()
                    .find(|c| enc.encode(c.encode_utf8(&mut buf)).2)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Err(ExportError::Unencodable {
                    character,
                    encoding: self.label().to_string(),
                })
            }
        }
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputEncoding {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows-1251" | "cp1251" | "win1251" => Ok(OutputEncoding::Windows1251),
            "utf-8" | "utf8" => Ok(OutputEncoding::Utf8),
            _ => Err(ExportError::UnsupportedEncoding(s.to_string())),
        }
    }
}

/// Options for writing the registry file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    pub encoding: OutputEncoding,
}

/// A ready-to-download registry file.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Generated file name
    pub file_name: String,
    /// Encoded file content
    pub content: Vec<u8>,
    /// Table as written (output column labels)
    pub table: Table,
    pub encoding: OutputEncoding,
}

impl Registry {
    pub fn row_count(&self) -> usize {
        self.table.len()
    }
}

/// `reestr_<rowcount>_<ddmmyyyy>.csv`
pub fn registry_file_name(row_count: usize, date: NaiveDate) -> String {
    format!("reestr_{}_{}.csv", row_count, date.format("%d%m%Y"))
}

/// Rename the selected columns to `ZSIM_ID` / `ZSIM_PHNR`, keeping order.
pub fn rename_for_output(table: &Table, selection: &Selection) -> ExportResult<Table> {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            if *c == selection.id_column {
                OUTPUT_ID_COLUMN.to_string()
            } else if *c == selection.phone_column {
                OUTPUT_PHONE_COLUMN.to_string()
            } else {
                c.clone()
            }
        })
        .collect();

    Ok(Table::new(columns, table.raw_rows().to_vec())?)
}

/// Write a table as `;`-separated text with a header row.
pub fn to_delimited(table: &Table) -> ExportResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(table.columns())?;
    for row in table.raw_rows() {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;

    String::from_utf8(bytes)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Build the downloadable registry from a working table.
pub fn build_registry(
    table: &Table,
    selection: &Selection,
    options: &ExportOptions,
    date: NaiveDate,
) -> ExportResult<Registry> {
    let output = rename_for_output(table, selection)?;
    let text = to_delimited(&output)?;
    let content = options.encoding.encode(&text)?;

    Ok(Registry {
        file_name: registry_file_name(output.len(), date),
        content,
        table: output,
        encoding: options.encoding,
    })
}
