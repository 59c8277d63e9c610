//! `axiomkit_io_xlsx` v1:
//! XLSX row sink for `axiomkit_io_cell` record writers.
//!
//! Architecture:
//! - `conf`   : Excel limits and default presets
//! - `spec`   : sink options and sheet reports
//! - `util`   : sheet naming, width and cell addressing helpers
//! - `writer` : workbook-backed `RowSink`
pub mod conf;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_NUM_FORMAT_TEXT, C_SHEET_NAME_DEFAULT, L_SHEET_NAME_ILLEGAL, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, N_WIDTH_EXCEL_MAX, derive_default_sink_options,
};
pub use spec::{SpecAutofitCellsPolicy, SpecXlsxSheetReport, SpecXlsxSinkOptions};
pub use util::{
    derive_column_width, derive_unique_sheet_name, measure_text_width, sanitize_sheet_name,
};
pub use writer::XlsxRowSink;
