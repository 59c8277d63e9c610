//! Workbook-backed row sink.

use std::collections::BTreeSet;
use std::path::PathBuf;

use axiomkit_io_cell::{RowSink, SpecCell, validate_unique_headers};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{debug, info};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{SpecXlsxSheetReport, SpecXlsxSinkOptions};
use crate::util::{
    derive_cell_pos, derive_column_width, derive_sink_error, derive_text_format,
    derive_unique_sheet_name, measure_text_width, sanitize_sheet_name,
};

struct SheetState {
    n_idx_sheet: usize,
    report: SpecXlsxSheetReport,
    l_headers: Vec<String>,
    l_width_by_col: Vec<usize>,
    n_rows_seen_for_autofit: usize,
    if_header_written: bool,
}

/// Stateful workbook sink.
///
/// Each [`Self::begin_sheet`] opens a worksheet that receives one header row
/// and any number of data rows. Rows written before any sheet was opened go to
/// a sheet named after [`SpecXlsxSinkOptions::sheet_name_default`]. The
/// workbook is buffered in memory until [`Self::close`] is called.
pub struct XlsxRowSink {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_header: Format,
    fmt_text: Format,
    options: SpecXlsxSinkOptions,
    set_sheet_names_existing: BTreeSet<String>,
    n_sheets: usize,
    sheet: Option<SheetState>,
    l_reports: Vec<SpecXlsxSheetReport>,
    if_closed: bool,
}

impl XlsxRowSink {
    /// Create sink bound to output path and options.
    pub fn new(
        path_file_out: impl Into<PathBuf>,
        options: SpecXlsxSinkOptions,
    ) -> Result<Self, String> {
        options.policy_autofit.validate()?;
        Ok(Self {
            path_file_out: path_file_out.into(),
            workbook: Workbook::new(),
            fmt_header: derive_text_format(options.if_bold_header),
            fmt_text: derive_text_format(false),
            options,
            set_sheet_names_existing: BTreeSet::new(),
            n_sheets: 0,
            sheet: None,
            l_reports: Vec::new(),
            if_closed: false,
        })
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Reports of finished sheets, followed by the open one if any.
    pub fn report(&self) -> Vec<SpecXlsxSheetReport> {
        let mut l_reports = self.l_reports.clone();
        if let Some(state) = &self.sheet {
            l_reports.push(state.report.clone());
        }
        l_reports
    }

    /// Finish the current sheet and open a new one.
    ///
    /// Returns the final sheet name after sanitizing and de-duplication.
    pub fn begin_sheet(&mut self, sheet_name: &str) -> Result<String, String> {
        if self.if_closed {
            return Err("workbook is already closed".to_string());
        }
        self.finish_sheet()?;

        let c_name_clean = sanitize_sheet_name(sheet_name, self.options.sheet_name_replace_to);
        let c_name_unique =
            derive_unique_sheet_name(&c_name_clean, &mut self.set_sheet_names_existing);
        self.workbook
            .add_worksheet()
            .set_name(&c_name_unique)
            .map_err(derive_sink_error)?;

        let mut report = SpecXlsxSheetReport {
            sheet_name: c_name_unique.clone(),
            ..Default::default()
        };
        if c_name_unique != sheet_name {
            report.warn(format!(
                "sheet name {sheet_name:?} was written as {c_name_unique:?}"
            ));
        }

        self.sheet = Some(SheetState {
            n_idx_sheet: self.n_sheets,
            report,
            l_headers: Vec::new(),
            l_width_by_col: Vec::new(),
            n_rows_seen_for_autofit: 0,
            if_header_written: false,
        });
        self.n_sheets += 1;
        debug!(sheet = %c_name_unique, "xlsx sheet opened");
        Ok(c_name_unique)
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        self.finish_sheet()?;
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_sink_error)?;
        self.if_closed = true;
        info!(
            path = %self.path_file_out.display(),
            n_sheets = self.n_sheets,
            "xlsx workbook saved"
        );
        Ok(())
    }

    fn finish_sheet(&mut self) -> Result<(), String> {
        let Some(state) = self.sheet.take() else {
            return Ok(());
        };

        if self.options.policy_autofit.if_enabled {
            let worksheet = self
                .workbook
                .worksheet_from_index(state.n_idx_sheet)
                .map_err(derive_sink_error)?;
            for (n_idx_col, n_width_measured) in state.l_width_by_col.iter().enumerate() {
                let n_width_final =
                    derive_column_width(*n_width_measured, &self.options.policy_autofit);
                let (_, n_col) = derive_cell_pos(0, n_idx_col)?;
                worksheet
                    .set_column_width(n_col, n_width_final as f64)
                    .map_err(derive_sink_error)?;
            }
        }

        debug!(
            sheet = %state.report.sheet_name,
            n_rows = state.report.n_rows,
            n_cols = state.report.n_cols,
            "xlsx sheet finished"
        );
        self.l_reports.push(state.report);
        Ok(())
    }

    fn derive_open_sheet(&mut self) -> Result<(&mut Worksheet, &mut SheetState), String> {
        if self.sheet.is_none() {
            let c_name = self.options.sheet_name_default.clone();
            self.begin_sheet(&c_name)?;
        }
        let state = self
            .sheet
            .as_mut()
            .ok_or_else(|| "no open sheet".to_string())?;
        let worksheet = self
            .workbook
            .worksheet_from_index(state.n_idx_sheet)
            .map_err(derive_sink_error)?;
        Ok((worksheet, state))
    }
}

impl RowSink for XlsxRowSink {
    fn write_header(&mut self, headers: &[String]) -> Result<(), String> {
        if self.if_closed {
            return Err("workbook is already closed".to_string());
        }
        if headers.len() > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "{} columns exceed the Excel limit of {N_NCOLS_EXCEL_MAX}",
                headers.len()
            ));
        }
        validate_unique_headers(headers)?;

        let if_freeze_header = self.options.if_freeze_header;
        let fmt_header = self.fmt_header.clone();
        let (worksheet, state) = self.derive_open_sheet()?;
        if state.if_header_written {
            return Err(format!(
                "sheet {:?} already has a header row",
                state.report.sheet_name
            ));
        }

        for (n_idx_col, c_header) in headers.iter().enumerate() {
            let (n_row, n_col) = derive_cell_pos(0, n_idx_col)?;
            worksheet
                .write_string_with_format(n_row, n_col, c_header, &fmt_header)
                .map_err(derive_sink_error)?;
        }
        if if_freeze_header {
            worksheet
                .set_freeze_panes(1, 0)
                .map_err(derive_sink_error)?;
        }

        state.l_width_by_col = headers
            .iter()
            .map(|c_header| measure_text_width(c_header))
            .collect();
        state.l_headers = headers.to_vec();
        state.report.n_cols = headers.len();
        state.if_header_written = true;
        Ok(())
    }

    fn write_row(&mut self, cells: &[SpecCell]) -> Result<(), String> {
        if self.if_closed {
            return Err("workbook is already closed".to_string());
        }

        let policy = self.options.policy_autofit.clone();
        let fmt_text = self.fmt_text.clone();
        let (worksheet, state) = self.derive_open_sheet()?;
        if !state.if_header_written {
            return Err(format!(
                "sheet {:?} received a data row before its header",
                state.report.sheet_name
            ));
        }
        if cells.len() != state.l_headers.len() {
            return Err(format!(
                "row has {} cells but the header has {} columns",
                cells.len(),
                state.l_headers.len()
            ));
        }
        let n_row = state.report.n_rows + 1;
        if n_row >= N_NROWS_EXCEL_MAX {
            return Err(format!(
                "sheet {:?} is full at {N_NROWS_EXCEL_MAX} rows",
                state.report.sheet_name
            ));
        }

        let if_track_width = policy.if_enabled
            && policy.if_include_body
            && policy
                .height_body_inferred_max
                .is_none_or(|n_max| state.n_rows_seen_for_autofit < n_max);

        for (n_idx_col, cell) in cells.iter().enumerate() {
            if cell.header != state.l_headers[n_idx_col] {
                return Err(format!(
                    "cell for header {:?} arrived in column {n_idx_col} ({:?})",
                    cell.header, state.l_headers[n_idx_col]
                ));
            }
        }

        for (n_idx_col, cell) in cells.iter().enumerate() {
            let (n_row_xlsx, n_col) = derive_cell_pos(n_row, n_idx_col)?;
            match cell.text.as_deref() {
                Some(c_text) if !c_text.is_empty() => {
                    worksheet
                        .write_string_with_format(n_row_xlsx, n_col, c_text, &fmt_text)
                        .map_err(derive_sink_error)?;
                    if if_track_width {
                        let n_width = measure_text_width(c_text);
                        if n_width > state.l_width_by_col[n_idx_col] {
                            state.l_width_by_col[n_idx_col] = n_width;
                        }
                    }
                }
                _ => {
                    worksheet
                        .write_blank(n_row_xlsx, n_col, &fmt_text)
                        .map_err(derive_sink_error)?;
                }
            }
        }

        if if_track_width {
            state.n_rows_seen_for_autofit += 1;
        }
        state.report.n_rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use axiomkit_io_cell::{
        RecordSchema, RecordWriter, SpecAttribute, TypeDecl, TypeHandlerRegistry, TypeKey,
        derive_default_mapping_options,
    };

    use super::*;

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n_nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock before epoch")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("axiomkit_xlsx_test_{n_nanos}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Order {
        id: u32,
        lines: Vec<String>,
        note: Option<String>,
    }

    fn order_schema() -> Arc<RecordSchema<Order>> {
        Arc::new(
            RecordSchema::builder("Order")
                .attribute(
                    SpecAttribute::new("id", TypeKey::U32)
                        .field(|o: &Order| o.id, |o, v| o.id = v)
                        .header("Order Id"),
                )
                .attribute(
                    SpecAttribute::new("lines", TypeDecl::list(TypeDecl::class(TypeKey::String)))
                        .field(|o: &Order| o.lines.clone(), |o, v| o.lines = v),
                )
                .attribute(
                    SpecAttribute::new("note", TypeKey::String)
                        .field(|o: &Order| o.note.clone(), |o, v| o.note = v),
                )
                .default_constructor()
                .build()
                .unwrap(),
        )
    }

    fn cell(text: Option<&str>) -> SpecCell {
        cell_for("A", text)
    }

    fn cell_for(header: &str, text: Option<&str>) -> SpecCell {
        SpecCell {
            attribute: header.to_lowercase(),
            header: header.to_string(),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn test_record_writer_fills_workbook_sheets() {
        let dir = TestDir::new();
        let path_out = dir.path().join("orders.xlsx");
        let registry = TypeHandlerRegistry::builtin();
        let options = derive_default_mapping_options();
        let writer = RecordWriter::new(order_schema(), &registry, &options).unwrap();

        let l_orders = vec![
            Order {
                id: 7,
                lines: vec!["bolt".to_string(), "nut".to_string()],
                note: None,
            },
            Order {
                id: 8,
                lines: Vec::new(),
                note: Some("rush".to_string()),
            },
        ];

        let mut sink = XlsxRowSink::new(&path_out, SpecXlsxSinkOptions::default()).unwrap();
        assert_eq!(sink.begin_sheet("Orders: open").unwrap(), "Orders_ open");
        let report_open = writer.write_rows(&l_orders, &mut sink).unwrap();
        assert_eq!(report_open.n_rows, 2);
        sink.begin_sheet("orders_ OPEN").unwrap();
        writer.write_rows(&l_orders[..1], &mut sink).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert!(path_out.is_file());
        let l_reports = sink.report();
        assert_eq!(l_reports.len(), 2);
        assert_eq!(l_reports[0].n_rows, 2);
        assert_eq!(l_reports[0].n_cols, 3);
        assert_eq!(l_reports[0].warnings.len(), 1);
        assert_eq!(l_reports[1].sheet_name, "orders_ OPEN__2");
        assert_eq!(l_reports[1].n_rows, 1);
    }

    #[test]
    fn test_rows_without_sheet_go_to_default_sheet() {
        let dir = TestDir::new();
        let mut sink =
            XlsxRowSink::new(dir.path().join("plain.xlsx"), SpecXlsxSinkOptions::default())
                .unwrap();
        sink.write_header(&["A".to_string()]).unwrap();
        sink.write_row(&[cell(Some("x"))]).unwrap();
        sink.write_row(&[cell(None)]).unwrap();

        let l_reports = sink.report();
        assert_eq!(l_reports[0].sheet_name, "Sheet");
        assert_eq!(l_reports[0].n_rows, 2);
        sink.close().unwrap();
    }

    #[test]
    fn test_sink_rejects_bad_headers_and_rows() {
        let dir = TestDir::new();
        let mut sink =
            XlsxRowSink::new(dir.path().join("bad.xlsx"), SpecXlsxSinkOptions::default())
                .unwrap();
        assert!(sink.write_row(&[cell(Some("x"))]).is_err());
        assert!(
            sink.write_header(&["A".to_string(), "A".to_string()])
                .unwrap_err()
                .contains("appears in columns 0 and 1")
        );

        let l_too_wide: Vec<String> = (0..=N_NCOLS_EXCEL_MAX).map(|n| n.to_string()).collect();
        assert!(sink.write_header(&l_too_wide).is_err());

        sink.write_header(&["A".to_string()]).unwrap();
        assert!(sink.write_header(&["A".to_string()]).is_err());
        assert!(sink.write_row(&[cell(None), cell(None)]).is_err());

        sink.begin_sheet("Pairs").unwrap();
        sink.write_header(&["A".to_string(), "B".to_string()]).unwrap();
        assert!(
            sink.write_row(&[cell_for("B", Some("1")), cell_for("A", Some("2"))])
                .unwrap_err()
                .contains("arrived in column 0")
        );
        sink.write_row(&[cell_for("A", Some("2")), cell_for("B", None)])
            .unwrap();

        sink.close().unwrap();
        assert!(sink.write_row(&[cell(None)]).is_err());
        assert!(sink.begin_sheet("late").is_err());
    }
}
