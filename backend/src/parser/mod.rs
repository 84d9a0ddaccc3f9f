//! Upload parser: `.csv` and `.xlsx` into a [`Table`].
//!
//! CSV files get encoding and delimiter auto-detection; XLSX files are read
//! from their first worksheet. Every cell ends up as a string.

use calamine::{Data, Reader, Xlsx};
use encoding_rs::Encoding;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::Table;

/// Supported upload formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Pick the format from a file name (case-insensitive extension).
    pub fn from_file_name(name: &str) -> ParseResult<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") => Ok(FileFormat::Xlsx),
            Some(other) => Err(ParseError::UnsupportedFormat(format!(".{}", other))),
            None => Err(ParseError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Parsed table
    pub table: Table,
    /// Format picked from the extension
    pub format: FileFormat,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "windows-1251" | "cp1251" => "windows-1251".to_string(),
        "koi8-r" => "koi8-r".to_string(),
        "ibm866" | "cp866" => "ibm866".to_string(),
        _ => charset.to_lowercase(),
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown labels fall back to lossy UTF-8. A leading BOM is removed.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ParseResult<String> {
    let label = match encoding.to_lowercase().as_str() {
        "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "cp1251" => "windows-1251".to_string(),
        "cp866" => "ibm866".to_string(),
        other => other.to_string(),
    };

    match Encoding::for_label(label.as_bytes()) {
        Some(enc) => {
            let (text, _, had_errors) = enc.decode(bytes);
            if had_errors && enc == encoding_rs::UTF_8 {
                // chardet said UTF-8 but the bytes disagree; windows-1251 is
                // the usual culprit for registry exports.
                let (text, _, had_errors) = encoding_rs::WINDOWS_1251.decode(bytes);
                if had_errors {
                    return Err(ParseError::Encoding(
                        "content is neither UTF-8 nor windows-1251".to_string(),
                    ));
                }
                return Ok(text.into_owned());
            }
            Ok(text.into_owned())
        }
        None => Ok(String::from_utf8_lossy(bytes)
            .trim_start_matches('\u{feff}')
            .to_string()),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Name blank headers `Unnamed: <index>`, trim the rest.
fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.as_ref().trim();
            if h.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h.to_string()
            }
        })
        .collect()
}

/// Fit a record to the header width: pad short rows, drop extra fields.
fn fit_row<I, S>(values: I, width: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut row: Vec<String> = values.into_iter().take(width).map(Into::into).collect();
    row.resize(width, String::new());
    row
}

/// Parse delimited text with an explicit delimiter.
///
/// # Example
/// ```
/// use reestr::parse_csv_str;
///
/// let table = parse_csv_str("name;phone\nAlice;9161234567", ';').unwrap();
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.columns(), &["name", "phone"]);
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> ParseResult<Table> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter)
        .map_err(|_| ParseError::Csv(format!("delimiter '{}' is not ASCII", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .clone();
    let columns = normalize_headers(headers.iter());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| ParseError::Csv(format!("line {}: {}", i + 2, e)))?;

        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        rows.push(fit_row(record.iter(), columns.len()));
    }

    Ok(Table::new(columns, rows)?)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8]) -> ParseResult<ParsedFile> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    // Detect encoding
    let encoding = detect_encoding(bytes);

    // Decode content
    let content = decode_content(bytes, &encoding)?;

    // Detect delimiter
    let delimiter = detect_delimiter(&content);

    let table = parse_csv_str(&content, delimiter)?;

    Ok(ParsedFile {
        table,
        format: FileFormat::Csv,
        encoding: Some(encoding),
        delimiter: Some(delimiter),
    })
}

/// Render one worksheet cell as text.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Parse the first worksheet of an XLSX workbook.
pub fn parse_xlsx_bytes(bytes: &[u8]) -> ParseResult<ParsedFile> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ParseError::Xlsx(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ParseError::Xlsx("No sheets found in workbook".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ParseError::Xlsx(e.to_string()))?;

    let mut rows_iter = range.rows();
    let header = rows_iter.next().ok_or(ParseError::EmptyFile)?;
    let columns = normalize_headers(header.iter().map(cell_to_string));

    let rows = rows_iter
        .map(|r| r.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|r| r.iter().any(|v| !v.trim().is_empty()))
        .map(|r| fit_row(r, columns.len()))
        .collect();

    Ok(ParsedFile {
        table: Table::new(columns, rows)?,
        format: FileFormat::Xlsx,
        encoding: None,
        delimiter: None,
    })
}

/// Parse an upload, picking the format from its file name.
pub fn parse_bytes(bytes: &[u8], file_name: &str) -> ParseResult<ParsedFile> {
    match FileFormat::from_file_name(file_name)? {
        FileFormat::Csv => parse_csv_bytes(bytes),
        FileFormat::Xlsx => parse_xlsx_bytes(bytes),
    }
}

/// Parse a file from disk.
///
/// # Example
/// ```ignore
/// let parsed = parse_file("/path/to/sims.xlsx")?;
/// println!("Rows: {}", parsed.table.len());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<ParsedFile> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    // Reject by extension before touching the disk
    FileFormat::from_file_name(name)?;

    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.len(), 2);
        let first = table.rows().next().unwrap();
        assert_eq!(first.get("name"), Some("Alice"));
        assert_eq!(first.get("age"), Some("30"));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let table = parse_csv_str(csv, ';').unwrap();

        assert_eq!(table.column_values("value").unwrap(), vec!["Hello; World"]);
    }

    #[test]
    fn test_values_are_not_trimmed() {
        let table = parse_csv_str("id,phone\n 0012 ,916", ',').unwrap();
        assert_eq!(table.column_values("id").unwrap(), vec![" 0012 "]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_values_padded() {
        let table = parse_csv_str("a;b;c\n1;;3\n4", ';').unwrap();
        assert_eq!(table.raw_rows()[0], vec!["1", "", "3"]);
        assert_eq!(table.raw_rows()[1], vec!["4", "", ""]);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let table = parse_csv_str("a;b\n1;2;3;4", ';').unwrap();
        assert_eq!(table.raw_rows()[0], vec!["1", "2"]);
    }

    #[test]
    fn test_blank_header_named() {
        let table = parse_csv_str(";id\n1;2", ';').unwrap();
        assert_eq!(table.columns(), &["Unnamed: 0", "id"]);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = parse_csv_str("id;id\n1;2", ';').unwrap_err();
        assert!(matches!(
            err,
            ParseError::Table(TableError::DuplicateColumn(ref c)) if c == "id"
        ));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv_str("", ';'), Err(ParseError::EmptyFile)));
        assert!(matches!(parse_csv_bytes(b""), Err(ParseError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ';');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_csv_bytes(b"ICCID,Phone\n8970101,9161234567\n").unwrap();

        assert_eq!(result.delimiter, Some(','));
        assert_eq!(result.encoding.as_deref(), Some("utf-8"));
        assert_eq!(result.format, FileFormat::Csv);
        assert_eq!(result.table.columns(), &["ICCID", "Phone"]);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("ID;Телефон\n1;2".as_bytes());
        let result = parse_csv_bytes(&bytes).unwrap();
        assert_eq!(result.table.columns(), &["ID", "Телефон"]);
    }

    #[test]
    fn test_windows_1251_decoding() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Номер;Телефон\n1;2");
        let decoded = decode_content(&bytes, "windows-1251").unwrap();
        assert!(decoded.starts_with("Номер"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(FileFormat::from_file_name("a.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("A.XLSX").unwrap(), FileFormat::Xlsx);
        assert!(matches!(
            FileFormat::from_file_name("a.xls"),
            Err(ParseError::UnsupportedFormat(ref e)) if e == ".xls"
        ));
        assert!(FileFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_corrupt_xlsx_rejected() {
        let err = parse_bytes(b"definitely not a zip", "sims.xlsx").unwrap_err();
        assert!(matches!(err, ParseError::Xlsx(_)));
    }

    fn sample_workbook() -> Vec<u8> {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "ICCID").unwrap();
        sheet.write_string(0, 1, " Phone ").unwrap();
        sheet.write_string(0, 3, "Note").unwrap();
        sheet.write_number(1, 0, 8970101234567.0).unwrap();
        sheet.write_string(1, 1, "9161234567").unwrap();
        sheet.write_string(1, 3, "x").unwrap();
        sheet.write_string(2, 0, "8970101234567890123").unwrap();
        sheet.write_string(2, 1, "+7 916").unwrap();
        // row 3 left blank
        sheet.write_number(4, 0, 12.5).unwrap();

        let other = workbook.add_worksheet();
        other.write_string(0, 0, "Ignored").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_xlsx_first_sheet() {
        let parsed = parse_bytes(&sample_workbook(), "sims.XLSX").unwrap();

        assert_eq!(parsed.format, FileFormat::Xlsx);
        assert_eq!(parsed.encoding, None);
        assert_eq!(parsed.delimiter, None);
        assert_eq!(parsed.table.columns(), &["ICCID", "Phone", "Unnamed: 2", "Note"]);
        assert_eq!(
            parsed.table.raw_rows(),
            &[
                vec!["8970101234567", "9161234567", "", "x"],
                vec!["8970101234567890123", "+7 916", "", ""],
                vec!["12.5", "", "", ""],
            ]
        );
    }

    #[test]
    fn test_xlsx_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sims.xlsx");
        std::fs::write(&path, sample_workbook()).unwrap();

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.table.len(), 3);
        assert_eq!(
            parsed.table.column_values("ICCID").unwrap()[0],
            "8970101234567"
        );
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::Float(89161234567.0)), "89161234567");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::String("x".into())), "x");
    }

    #[test]
    fn test_parse_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sims.csv");
        std::fs::write(&path, "ID;Phone\n123;456\n").unwrap();

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.table.len(), 1);

        let bad = dir.path().join("sims.txt");
        assert!(matches!(parse_file(&bad), Err(ParseError::UnsupportedFormat(_))));
    }
}
