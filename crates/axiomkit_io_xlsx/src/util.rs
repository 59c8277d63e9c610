//! Sheet naming, width measurement and cell addressing helpers.

use std::collections::BTreeSet;

use rust_xlsxwriter::{ColNum, Format, RowNum, XlsxError};

use crate::conf::{
    C_NUM_FORMAT_TEXT, C_SHEET_NAME_DEFAULT, L_SHEET_NAME_ILLEGAL, N_LEN_EXCEL_SHEET_NAME_MAX,
};
use crate::spec::SpecAutofitCellsPolicy;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNames

/// Make `name` acceptable to Excel.
///
/// Illegal characters become `replace_to`; surrounding whitespace and
/// apostrophes are dropped; the result is cut to 31 characters.
pub fn sanitize_sheet_name(name: &str, replace_to: char) -> String {
    let c_replaced: String = name
        .chars()
        .map(|chr| {
            if L_SHEET_NAME_ILLEGAL.contains(&chr) {
                replace_to
            } else {
                chr
            }
        })
        .collect();
    let c_clean: String = c_replaced
        .trim_matches(|chr: char| chr.is_whitespace() || chr == '\'')
        .chars()
        .take(N_LEN_EXCEL_SHEET_NAME_MAX)
        .collect();
    if c_clean.is_empty() {
        C_SHEET_NAME_DEFAULT.to_string()
    } else {
        c_clean
    }
}

/// Return `name` or the first free `name__N` variant, and record it as taken.
///
/// Excel compares sheet names case-insensitively, so `set_taken` holds
/// lowercase names.
pub fn derive_unique_sheet_name(name: &str, set_taken: &mut BTreeSet<String>) -> String {
    if set_taken.insert(name.to_lowercase()) {
        return name.to_string();
    }
    (2usize..)
        .map(|n_idx| {
            let c_suffix = format!("__{n_idx}");
            let n_keep = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
            let c_base: String = name.chars().take(n_keep).collect();
            format!("{c_base}{c_suffix}")
        })
        .find(|candidate| set_taken.insert(candidate.to_lowercase()))
        .unwrap_or_else(|| name.to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Widths

/// Display width of cell text: its widest line, with wide glyphs counted twice.
pub fn measure_text_width(text: &str) -> usize {
    text.lines()
        .map(|line| {
            line.chars()
                .map(|chr| if chr.len_utf8() >= 3 { 2 } else { 1 })
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
}

/// Final column width for the widest measured cell.
pub fn derive_column_width(n_width_measured: usize, policy: &SpecAutofitCellsPolicy) -> usize {
    (n_width_measured + policy.width_cell_padding)
        .clamp(policy.width_cell_min, policy.width_cell_max)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Cells

/// Text format for data cells, optionally bold for the header row.
pub(crate) fn derive_text_format(if_bold: bool) -> Format {
    let format = Format::new().set_num_format(C_NUM_FORMAT_TEXT);
    if if_bold { format.set_bold() } else { format }
}

/// Zero-based `(row, col)` converted to worksheet coordinates.
pub(crate) fn derive_cell_pos(n_row: usize, n_col: usize) -> Result<(RowNum, ColNum), String> {
    let n_row_xlsx =
        RowNum::try_from(n_row).map_err(|_| format!("row {n_row} is out of range"))?;
    let n_col_xlsx =
        ColNum::try_from(n_col).map_err(|_| format!("column {n_col} is out of range"))?;
    Ok((n_row_xlsx, n_col_xlsx))
}

pub(crate) fn derive_sink_error(err: XlsxError) -> String {
    format!("xlsx sink: {err}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_sheet_name_replaces_illegal_chars_and_truncates() {
        assert_eq!(sanitize_sheet_name("a/b:c", '_'), "a_b_c");
        assert_eq!(sanitize_sheet_name(" 'Q1' ", '_'), "Q1");
        assert_eq!(sanitize_sheet_name("  ''  ", '_'), "Sheet");
        let c_long = "x".repeat(40);
        assert_eq!(sanitize_sheet_name(&c_long, '_').chars().count(), 31);
    }

    #[test]
    fn test_derive_unique_sheet_name_appends_suffix_case_insensitively() {
        let mut set_taken = BTreeSet::new();
        assert_eq!(derive_unique_sheet_name("Orders", &mut set_taken), "Orders");
        assert_eq!(derive_unique_sheet_name("orders", &mut set_taken), "orders__2");
        assert_eq!(derive_unique_sheet_name("Orders", &mut set_taken), "Orders__3");

        let c_long = "y".repeat(31);
        assert_eq!(derive_unique_sheet_name(&c_long, &mut set_taken), c_long);
        let c_renamed = derive_unique_sheet_name(&c_long, &mut set_taken);
        assert_eq!(c_renamed.chars().count(), 31);
        assert!(c_renamed.ends_with("__2"));
    }

    #[test]
    fn test_measure_text_width_uses_widest_line() {
        assert_eq!(measure_text_width(""), 0);
        assert_eq!(measure_text_width("ab\nabcd"), 4);
        assert_eq!(measure_text_width("日本"), 4);
        assert_eq!(measure_text_width("é"), 1);
    }

    #[test]
    fn test_derive_column_width_clamps_into_policy() {
        let policy = SpecAutofitCellsPolicy::default();
        assert_eq!(derive_column_width(0, &policy), 8);
        assert_eq!(derive_column_width(10, &policy), 12);
        assert_eq!(derive_column_width(500, &policy), 60);
    }

    #[test]
    fn test_derive_cell_pos_rejects_out_of_range_columns() {
        assert_eq!(derive_cell_pos(3, 2), Ok((3, 2)));
        assert!(derive_cell_pos(0, usize::from(u16::MAX) + 1).is_err());
    }
}
