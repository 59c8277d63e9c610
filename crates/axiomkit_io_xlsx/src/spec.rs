//! XLSX sink options and reports.

use crate::conf::{C_SHEET_NAME_DEFAULT, N_WIDTH_EXCEL_MAX};

////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Column autofit policy.
///
/// Widths are measured from header and body text as cells are written and
/// applied when the sheet is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Enable width inference.
    pub if_enabled: bool,
    /// Measure body cells too, not just headers.
    pub if_include_body: bool,
    /// Max body rows measured; `None` measures every row.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width added to the widest measured cell.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            if_enabled: true,
            if_include_body: true,
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

impl SpecAutofitCellsPolicy {
    /// Check that the width bounds form a non-empty range inside Excel's limit.
    pub fn validate(&self) -> Result<(), String> {
        match (self.width_cell_min, self.width_cell_max) {
            (0, _) => Err("autofit minimum width must be at least 1".to_string()),
            (n_min, n_max) if n_max < n_min => Err(format!(
                "autofit maximum width {n_max} is below the minimum {n_min}"
            )),
            (_, n_max) if n_max > N_WIDTH_EXCEL_MAX => Err(format!(
                "autofit maximum width {n_max} exceeds Excel's {N_WIDTH_EXCEL_MAX}"
            )),
            _ => Ok(()),
        }
    }
}

/// Options of one [`crate::writer::XlsxRowSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxSinkOptions {
    /// Sheet name used when rows arrive before any sheet was started.
    pub sheet_name_default: String,
    /// Replacement for characters illegal in sheet names.
    pub sheet_name_replace_to: char,
    /// Bold header row.
    pub if_bold_header: bool,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecXlsxSinkOptions {
    fn default() -> Self {
        Self {
            sheet_name_default: C_SHEET_NAME_DEFAULT.to_string(),
            sheet_name_replace_to: '_',
            if_bold_header: true,
            if_freeze_header: true,
            policy_autofit: SpecAutofitCellsPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Reports

/// Write summary of one worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxSheetReport {
    /// Final (sanitized, unique) sheet name.
    pub sheet_name: String,
    /// Header columns.
    pub n_cols: usize,
    /// Data rows written (header excluded).
    pub n_rows: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxSheetReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
