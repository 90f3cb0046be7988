//! Stateless helper utilities shared by the reader and writer kernels.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::conf::{
    C_KEY_UNKNOWN, C_SUFFIX_UPLOAD_XLSX, N_EXCEL_SERIAL_LEAP_BUG, N_EXCEL_SERIAL_MAX,
    N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, XlsxJsonError};

static RE_WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\s)+").expect("static whitespace pattern"));
static RE_NON_KEY_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static key-char pattern"));

////////////////////////////////////////////////////////////////////////////////
// #region HeaderKeyNormalization

/// Normalize raw header text into an identifier-like record key.
///
/// Steps: missing -> `"UNKNOWN"`; trim + uppercase; NFD with combining marks removed;
/// `Đ`/`đ` -> `D`/`d`; ASCII whitespace runs -> `_`; drop everything outside `[A-Za-z0-9_]`.
/// Non-ASCII spaces such as U+00A0 are not whitespace here and are dropped with the other
/// non-key characters. The result may be empty.
pub fn normalize_header_key(header: Option<&str>) -> String {
    let Some(header) = header else {
        return C_KEY_UNKNOWN.to_string();
    };

    let c_upper = trim_control_chars(header).to_uppercase();
    let c_base: String = c_upper
        .nfd()
        .filter(|chr| !is_combining_mark(*chr))
        .map(|chr| match chr {
            'đ' => 'd',
            'Đ' => 'D',
            _ => chr,
        })
        .collect();

    let c_underscored = RE_WHITESPACE_RUN.replace_all(&c_base, "_");
    RE_NON_KEY_CHAR.replace_all(&c_underscored, "").into_owned()
}

/// Strip leading/trailing chars at or below U+0020 (space and ASCII controls).
///
/// Unicode spaces like U+00A0 are kept.
pub fn trim_control_chars(s: &str) -> &str {
    s.trim_matches(|chr: char| chr <= ' ')
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateAndNumberText

/// Convert an Excel serial day number (1900 date system) to a calendar timestamp.
///
/// Returns `None` for negative, non-finite or post-9999 serials.
pub fn convert_excel_serial_to_datetime(x: f64) -> Option<NaiveDateTime> {
    if !x.is_finite() || !(0.0..=N_EXCEL_SERIAL_MAX).contains(&x) {
        return None;
    }

    // Serials before the phantom 1900-02-29 are one day ahead of the real calendar.
    let n_days_shift = if x < N_EXCEL_SERIAL_LEAP_BUG { 1.0 } else { 0.0 };
    let n_ms_total = ((x + n_days_shift) * 86_400_000.0).round() as i64;

    let dt_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    dt_epoch.checked_add_signed(TimeDelta::try_milliseconds(n_ms_total)?)
}

/// Convert a calendar timestamp back to an Excel serial day number (1900 date system).
///
/// Dates before 1900-03-01 get the phantom 1900-02-29 skipped, matching
/// [`convert_excel_serial_to_datetime`].
pub fn convert_datetime_to_excel_serial(dt: &NaiveDateTime) -> Option<f64> {
    let dt_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let n_ms_total = dt.signed_duration_since(dt_epoch).num_milliseconds();
    let x = n_ms_total as f64 / 86_400_000.0;
    if x < N_EXCEL_SERIAL_LEAP_BUG + 1.0 {
        Some(x - 1.0)
    } else {
        Some(x)
    }
}

/// Render timestamp as ISO-8601 text, with fractional seconds only when present.
pub fn format_datetime_iso(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Render number the way a general-format cell shows it (`3`, `2.5`).
pub fn format_general_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        return (x as i64).to_string();
    }
    x.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one written cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::Null => 0,
        EnumCellValue::Integer(val) => val.to_string().len(),
        other => estimate_unicode_string_width(&other.to_text()),
    }
}

/// Estimate width of free text; non-ASCII glyphs count as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

pub(crate) fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

pub(crate) fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region UploadValidation

/// Reject empty payloads and file names without the `.xlsx` suffix.
pub fn validate_xlsx_upload(file_name: Option<&str>, n_bytes: usize) -> Result<(), XlsxJsonError> {
    let if_valid_name = file_name.is_some_and(|name| name.ends_with(C_SUFFIX_UPLOAD_XLSX));
    if n_bytes == 0 || !if_valid_name {
        return Err(XlsxJsonError::InvalidRequest(
            "Invalid file. Please upload an .xlsx file.".to_string(),
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
