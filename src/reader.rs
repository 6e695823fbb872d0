//! Table reader for MIB `.dat` files
//!
//! Each MIB table is a text file with one record per line and columns
//! separated by a single character (tab by default). A first line starting
//! with `#` is a header comment and is skipped. Trailing columns may be
//! omitted; an omitted or empty column is "unset".

use crate::error::{Location, MibError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sequential reader over the records of one table file
///
/// The file handle is owned by the reader and released when it is dropped.
pub struct TableReader {
    file_name: String,
    input: BufReader<File>,
    buffer: Vec<u8>,
    line_number: usize,
    separator: char,
}

impl TableReader {
    /// Open `<root>/<table>.<extension>`
    pub fn open(root: &Path, table: &str, extension: &str, separator: char) -> Result<Self> {
        let file_name = format!("{}.{}", table, extension);
        let path: PathBuf = root.join(&file_name);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MibError::TableNotFound { path: path.clone() },
            _ => MibError::Io(e),
        })?;
        debug!("Reading table {}", path.display());

        Ok(Self {
            file_name,
            input: BufReader::new(file),
            buffer: Vec::new(),
            line_number: 0,
            separator,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Read the next record, or `None` at end of file
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            self.buffer.clear();
            if self.input.read_until(b'\n', &mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let line = decode_line(&self.buffer);
            let line = line.trim_end_matches('\n');

            if self.line_number == 1 && line.starts_with('#') {
                continue;
            }
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let fields = line.split(self.separator).map(str::to_string).collect();
            return Ok(Some(Row {
                fields,
                location: Location::new(self.file_name.clone(), self.line_number),
            }));
        }
    }
}

/// Decode a line as UTF-8, falling back to ISO-8859-1 for legacy files
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// One record of a table, with the position it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<String>,
    location: Location,
}

impl Row {
    pub fn new(fields: Vec<String>, location: Location) -> Self {
        Self { fields, location }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if the column is present and non-empty
    pub fn has(&self, col: usize) -> bool {
        self.fields.get(col).is_some_and(|v| !v.is_empty())
    }

    /// Fail with the first (1-based) mandatory column missing from the record
    pub fn require(&self, cols: &[usize]) -> Result<()> {
        match cols.iter().find(|&&col| col >= self.fields.len()) {
            Some(&col) => Err(MibError::MissingColumn {
                location: self.location.clone(),
                column: col + 1,
            }),
            None => Ok(()),
        }
    }

    /// Value of a column that must be present
    pub fn str(&self, col: usize) -> Result<&str> {
        self.require(&[col])?;
        Ok(&self.fields[col])
    }

    pub fn opt_str(&self, col: usize) -> Option<&str> {
        self.fields
            .get(col)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn string_or(&self, col: usize, default: &str) -> String {
        self.opt_str(col).unwrap_or(default).to_string()
    }

    /// First character of a flag column, or `default` when unset
    pub fn flag_or(&self, col: usize, default: char) -> char {
        self.opt_str(col)
            .and_then(|v| v.chars().next())
            .unwrap_or(default)
    }

    pub fn int(&self, col: usize) -> Result<i64> {
        let value = self.str(col)?;
        self.parse_int(col, value)
    }

    pub fn int_or(&self, col: usize, default: i64) -> Result<i64> {
        match self.opt_str(col) {
            Some(value) => self.parse_int(col, value),
            None => Ok(default),
        }
    }

    /// Small integer column (type and format codes, sizes)
    pub fn i32(&self, col: usize) -> Result<i32> {
        let value = self.str(col)?;
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| self.invalid(col, value, "integer"))
    }

    pub fn i32_or(&self, col: usize, default: i32) -> Result<i32> {
        match self.opt_str(col) {
            Some(_) => self.i32(col),
            None => Ok(default),
        }
    }

    pub fn opt_int(&self, col: usize) -> Result<Option<i64>> {
        self.opt_str(col)
            .map(|value| self.parse_int(col, value))
            .transpose()
    }

    pub fn uint(&self, col: usize) -> Result<u64> {
        let value = self.str(col)?;
        self.parse_uint(col, value)
    }

    pub fn uint_or(&self, col: usize, default: u64) -> Result<u64> {
        match self.opt_str(col) {
            Some(value) => self.parse_uint(col, value),
            None => Ok(default),
        }
    }

    pub fn float(&self, col: usize) -> Result<f64> {
        let value = self.str(col)?;
        self.parse_float(col, value)
    }

    pub fn float_or(&self, col: usize, default: f64) -> Result<f64> {
        match self.opt_str(col) {
            Some(value) => self.parse_float(col, value),
            None => Ok(default),
        }
    }

    pub fn opt_float(&self, col: usize) -> Result<Option<f64>> {
        self.opt_str(col)
            .map(|value| self.parse_float(col, value))
            .transpose()
    }

    /// Parse a raw value column according to a MIB format and radix
    pub fn raw_value(&self, col: usize, fmt: char, radix: char) -> Result<f64> {
        let value = self.str(col)?;
        parse_raw_value(value, fmt, radix).ok_or_else(|| self.invalid(col, value, "raw value"))
    }

    pub fn reference(&self, message: impl Into<String>) -> MibError {
        MibError::reference(&self.location, message)
    }

    pub fn data(&self, message: impl Into<String>) -> MibError {
        MibError::data(&self.location, message)
    }

    fn parse_int(&self, col: usize, value: &str) -> Result<i64> {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| self.invalid(col, value, "integer"))
    }

    fn parse_uint(&self, col: usize, value: &str) -> Result<u64> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| self.invalid(col, value, "unsigned integer"))
    }

    fn parse_float(&self, col: usize, value: &str) -> Result<f64> {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| self.invalid(col, value, "number"))
    }

    fn invalid(&self, col: usize, value: &str, expected: &'static str) -> MibError {
        MibError::InvalidColumn {
            location: self.location.clone(),
            column: col + 1,
            value: value.to_string(),
            expected,
        }
    }
}

/// Parse a MIB value: unsigned (`U`) values are integers in the radix
/// D(ecimal), H(exadecimal) or O(ctal); every other format is a real.
pub fn parse_raw_value(value: &str, fmt: char, radix: char) -> Option<f64> {
    let value = value.trim();
    if fmt == 'U' {
        let base = match radix {
            'H' => 16,
            'O' => 8,
            _ => 10,
        };
        u64::from_str_radix(value, base).ok().map(|v| v as f64)
    } else {
        value.parse::<f64>().ok()
    }
}

/// Parse a hexadecimal byte string, left padded to `size_in_bits`
pub fn parse_hex_bytes(value: &str, size_in_bits: u32) -> Option<Vec<u8>> {
    let value = value.trim();
    if !value.is_ascii() {
        return None;
    }
    let digits = if value.len() % 2 == 1 {
        format!("0{}", value)
    } else {
        value.to_string()
    };
    let mut bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;

    let needed = size_in_bits.div_ceil(8) as usize;
    if bytes.len() < needed {
        let mut padded = vec![0u8; needed - bytes.len()];
        padded.append(&mut bytes);
        bytes = padded;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(fields: &[&str]) -> Row {
        Row::new(
            fields.iter().map(|f| f.to_string()).collect(),
            Location::new("test.dat", 7),
        )
    }

    #[test]
    fn test_reader_skips_header_comment_and_counts_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pcf.dat"),
            "# PNAME\tDESCR\nP1\tfirst\n\nP2\tsecond\r\n",
        )
        .unwrap();

        let mut reader = TableReader::open(dir.path(), "pcf", "dat", '\t').unwrap();
        let first = reader.next_row().unwrap().unwrap();
        assert_eq!(first.str(0).unwrap(), "P1");
        assert_eq!(first.location().line, 2);

        let second = reader.next_row().unwrap().unwrap();
        assert_eq!(second.str(1).unwrap(), "second");
        assert_eq!(second.location().line, 4);
        assert_eq!(second.location().file, "pcf.dat");

        assert!(reader.next_row().unwrap().is_none());
    }

    #[test]
    fn test_reader_decodes_latin1_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pcf.dat"),
            b"TEMP\tTemperature in \xB0C\nNEXT\tplain\n",
        )
        .unwrap();

        let mut reader = TableReader::open(dir.path(), "pcf", "dat", '\t').unwrap();
        let first = reader.next_row().unwrap().unwrap();
        assert_eq!(first.str(1).unwrap(), "Temperature in \u{B0}C");
        let second = reader.next_row().unwrap().unwrap();
        assert_eq!(second.str(0).unwrap(), "NEXT");
        assert_eq!(second.location().line, 2);
    }

    #[test]
    fn test_missing_table_file() {
        let dir = TempDir::new().unwrap();
        match TableReader::open(dir.path(), "cur", "dat", '\t') {
            Err(MibError::TableNotFound { path }) => assert!(path.ends_with("cur.dat")),
            _ => panic!("Expected TableNotFound"),
        }
    }

    #[test]
    fn test_unset_and_mandatory_columns() {
        let r = row(&["NAME", "", "12"]);

        assert!(r.has(0));
        assert!(!r.has(1));
        assert!(!r.has(5));
        assert!(r.require(&[0, 1, 2]).is_ok());
        assert_eq!(r.string_or(1, "dflt"), "dflt");
        assert_eq!(r.int_or(4, -1).unwrap(), -1);
        assert_eq!(r.int(2).unwrap(), 12);

        match r.require(&[0, 4]).unwrap_err() {
            MibError::MissingColumn { location, column } => {
                assert_eq!(location.line, 7);
                assert_eq!(column, 5);
            }
            _ => panic!("Expected MissingColumn"),
        }
    }

    #[test]
    fn test_unparsable_column_reports_value() {
        let r = row(&["NAME", "abc"]);
        match r.int(1).unwrap_err() {
            MibError::InvalidColumn { column, value, .. } => {
                assert_eq!(column, 2);
                assert_eq!(value, "abc");
            }
            _ => panic!("Expected InvalidColumn"),
        }
    }

    #[test]
    fn test_parse_raw_value_radix() {
        assert_eq!(parse_raw_value("ff", 'U', 'H'), Some(255.0));
        assert_eq!(parse_raw_value("17", 'U', 'O'), Some(15.0));
        assert_eq!(parse_raw_value("42", 'U', 'D'), Some(42.0));
        assert_eq!(parse_raw_value("-1.5", 'R', 'D'), Some(-1.5));
        assert_eq!(parse_raw_value("-1", 'U', 'D'), None);
    }

    #[test]
    fn test_parse_hex_bytes_pads_left() {
        assert_eq!(parse_hex_bytes("1A2", 24), Some(vec![0x00, 0x01, 0xA2]));
        assert_eq!(parse_hex_bytes("ff", 8), Some(vec![0xFF]));
        assert_eq!(parse_hex_bytes("zz", 8), None);
    }
}
