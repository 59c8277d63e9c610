//! XLSX limits and default presets.

use crate::spec::SpecXlsxSinkOptions;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length, in characters.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel column width ceiling.
pub const N_WIDTH_EXCEL_MAX: usize = 255;
/// Characters Excel rejects in sheet names.
pub const L_SHEET_NAME_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];
/// Sheet name used when none is given or sanitizing leaves nothing.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet";
/// Number format that keeps cell text from being re-interpreted by Excel.
pub const C_NUM_FORMAT_TEXT: &str = "@";

/// Build default sink options.
pub fn derive_default_sink_options() -> SpecXlsxSinkOptions {
    SpecXlsxSinkOptions::default()
}
