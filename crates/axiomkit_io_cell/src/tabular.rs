//! Tabular I/O engine interfaces.
//!
//! The engine owns files, sheets and styling. This side only exchanges one
//! name-to-text scope per row on read and one ordered cell list per row on
//! write.

use std::collections::{BTreeMap, HashMap};

/// Raw row text keyed by attribute name (or by header before re-keying).
pub type SpecRowScope = BTreeMap<String, String>;

/// One converted cell handed to a [`RowSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCell {
    /// Attribute name.
    pub attribute: String,
    /// Column header.
    pub header: String,
    /// Cell text; `None` leaves the cell blank.
    pub text: Option<String>,
}

/// Check that no header text occurs twice.
///
/// Header-keyed reading re-keys a row through a map, so a repeated header
/// would silently drop one of its columns.
pub fn validate_unique_headers(headers: &[String]) -> Result<(), String> {
    let mut dict_first: HashMap<&str, usize> = HashMap::with_capacity(headers.len());
    for (n_col, c_header) in headers.iter().enumerate() {
        if let Some(n_first) = dict_first.insert(c_header.as_str(), n_col) {
            return Err(format!(
                "header {c_header:?} appears in columns {n_first} and {n_col}"
            ));
        }
    }
    Ok(())
}

/// Destination of converted rows.
pub trait RowSink {
    /// Write the header row; called once before any data row.
    fn write_header(&mut self, headers: &[String]) -> Result<(), String>;

    /// Write one data row, cells in header order.
    fn write_row(&mut self, cells: &[SpecCell]) -> Result<(), String>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn write_header(&mut self, headers: &[String]) -> Result<(), String> {
        (**self).write_header(headers)
    }

    fn write_row(&mut self, cells: &[SpecCell]) -> Result<(), String> {
        (**self).write_row(cells)
    }
}

/// In-memory sheet; also a source of header-keyed row scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRowSink {
    /// Header row.
    pub headers: Vec<String>,
    /// Data rows in header order.
    pub rows: Vec<Vec<Option<String>>>,
}

impl MemoryRowSink {
    /// Empty sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows as header-keyed scopes; blank cells map to empty text.
    pub fn to_header_scopes(&self) -> Vec<SpecRowScope> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .map(|(header, text)| (header.clone(), text.clone().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }
}

impl RowSink for MemoryRowSink {
    fn write_header(&mut self, headers: &[String]) -> Result<(), String> {
        if !self.rows.is_empty() {
            return Err("header must be written before data rows".to_string());
        }
        validate_unique_headers(headers)?;
        self.headers = headers.to_vec();
        Ok(())
    }

    fn write_row(&mut self, cells: &[SpecCell]) -> Result<(), String> {
        if cells.len() != self.headers.len() {
            return Err(format!(
                "row has {} cells but the header has {} columns",
                cells.len(),
                self.headers.len()
            ));
        }
        self.rows
            .push(cells.iter().map(|cell| cell.text.clone()).collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(header: &str, text: Option<&str>) -> SpecCell {
        SpecCell {
            attribute: header.to_lowercase(),
            header: header.to_string(),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn memory_sink_round_trips_rows_as_header_scopes() {
        let mut sink = MemoryRowSink::new();
        sink.write_header(&["A".to_string(), "B".to_string()]).unwrap();
        sink.write_row(&[cell("A", Some("1")), cell("B", None)]).unwrap();

        let l_scopes = sink.to_header_scopes();
        assert_eq!(l_scopes.len(), 1);
        assert_eq!(l_scopes[0]["A"], "1");
        assert_eq!(l_scopes[0]["B"], "");
    }

    #[test]
    fn memory_sink_rejects_ragged_rows_and_late_headers() {
        let mut sink = MemoryRowSink::new();
        sink.write_header(&["A".to_string()]).unwrap();
        assert!(sink.write_row(&[]).is_err());
        sink.write_row(&[cell("A", Some("x"))]).unwrap();
        assert!(sink.write_header(&["A".to_string()]).is_err());
    }

    #[test]
    fn repeated_headers_are_reported_with_both_columns() {
        let l_headers = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(
            validate_unique_headers(&l_headers),
            Err("header \"A\" appears in columns 0 and 2".to_string())
        );
        assert!(validate_unique_headers(&l_headers[..2]).is_ok());
        assert!(MemoryRowSink::new().write_header(&l_headers).is_err());
    }
}
