//! XLSX <-> JSON constants and default preset factories.

use crate::spec::{
    EnumAutofitColumnsRule, SpecAutofitCellsPolicy, SpecCellFormat, SpecXlsxJsonWriteOptions,
};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Row holding the column headers.
pub const N_IDX_ROW_HEADER: u32 = 0;
/// Key used for a missing header text.
pub const C_KEY_UNKNOWN: &str = "UNKNOWN";
/// Prefix of the key synthesized for a requested column without header cell.
pub const C_KEY_UNKNOWN_COL_PREFIX: &str = "UNKNOWN_COL_";
/// Sheet name of generated workbooks.
pub const C_SHEET_NAME_DEFAULT: &str = "Data";
/// Accepted upload file suffix.
pub const C_SUFFIX_UPLOAD_XLSX: &str = ".xlsx";

/// Last Excel serial day (9999-12-31) accepted by date conversion.
pub const N_EXCEL_SERIAL_MAX: f64 = 2_958_465.999_999_99;
/// Serial day of the phantom 1900-02-29 in the 1900 date system.
pub const N_EXCEL_SERIAL_LEAP_BUG: f64 = 60.0;

/// Build default header format: bold font, nothing else.
pub fn derive_default_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        ..Default::default()
    }
}

/// Build default autofit policy: widths follow header and body content.
pub fn derive_default_autofit_policy() -> SpecAutofitCellsPolicy {
    SpecAutofitCellsPolicy {
        rule_columns: EnumAutofitColumnsRule::All,
        height_body_inferred_max: None,
        width_cell_min: 4,
        width_cell_max: 100,
        width_cell_padding: 2,
    }
}

/// Build default write options: sheet `"Data"`, bold header, autofit on.
pub fn derive_default_xlsx_json_write_options() -> SpecXlsxJsonWriteOptions {
    SpecXlsxJsonWriteOptions {
        sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
        fmt_header: derive_default_header_format(),
        policy_autofit: derive_default_autofit_policy(),
    }
}
