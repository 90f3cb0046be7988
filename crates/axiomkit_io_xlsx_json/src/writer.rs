//! XLSX writer kernel: ordered records -> single-sheet workbook bytes.

use indexmap::IndexSet;
use rust_xlsxwriter::{
    Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet, XlsxError,
};

use crate::conf::{N_IDX_ROW_HEADER, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat, SpecRecord,
    SpecXlsxJsonWriteOptions, XlsxJsonError,
};
use crate::util::{
    cast_col_num, cast_row_num, estimate_unicode_string_width, estimate_width_len,
    sanitize_sheet_name,
};

/// Stateless writer turning records into an in-memory workbook.
#[derive(Debug, Clone, Default)]
pub struct XlsxRecordWriter {
    write_options: SpecXlsxJsonWriteOptions,
}

impl XlsxRecordWriter {
    /// Create writer with sheet/format/autofit options.
    pub fn new(write_options: SpecXlsxJsonWriteOptions) -> Self {
        Self { write_options }
    }

    /// Options used by this writer.
    pub fn options(&self) -> &SpecXlsxJsonWriteOptions {
        &self.write_options
    }

    /// Write `records` into a one-sheet workbook and return the container bytes.
    ///
    /// Columns are the union of record keys in first-seen order; row 0 holds the keys.
    /// `Null` and missing values leave the cell unwritten.
    pub fn write_records(&self, records: &[SpecRecord]) -> Result<Vec<u8>, XlsxJsonError> {
        self.write_workbook(records)
            .map_err(XlsxJsonError::from_processing)
    }

    fn write_workbook(&self, records: &[SpecRecord]) -> Result<Vec<u8>, String> {
        validate_policy_autofit(&self.write_options.policy_autofit)?;

        let l_keys = derive_header_keys(records);
        if l_keys.len() > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "Too many columns: {} (max {N_NCOLS_EXCEL_MAX}).",
                l_keys.len()
            ));
        }
        if records.len() + 1 > N_NROWS_EXCEL_MAX {
            return Err(format!(
                "Too many rows: {} records plus header (max {N_NROWS_EXCEL_MAX}).",
                records.len()
            ));
        }

        let c_sheet_name = sanitize_sheet_name(&self.write_options.sheet_name, "_");
        let fmt_header = derive_rust_xlsx_format(&self.write_options.fmt_header);

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&c_sheet_name)
            .map_err(derive_xlsx_error_text)?;

        write_header(worksheet, &l_keys, &fmt_header)?;

        let policy = &self.write_options.policy_autofit;
        let if_track_body = !matches!(policy.rule_columns, EnumAutofitColumnsRule::Header);
        let mut l_width_by_col_body = vec![0usize; l_keys.len()];

        for (n_idx_record, record) in records.iter().enumerate() {
            let n_idx_row = N_IDX_ROW_HEADER as usize + 1 + n_idx_record;
            let if_track_width = if_track_body
                && policy
                    .height_body_inferred_max
                    .is_none_or(|n_max| n_idx_record < n_max);

            for (n_idx_col, key) in l_keys.iter().enumerate() {
                let Some(value) = record.get(*key) else {
                    continue;
                };
                if if_track_width {
                    l_width_by_col_body[n_idx_col] =
                        usize::max(l_width_by_col_body[n_idx_col], estimate_width_len(value));
                }
                write_cell_value(worksheet, n_idx_row, n_idx_col, value)?;
            }
        }

        apply_column_widths(worksheet, policy, &l_keys, &l_width_by_col_body)?;

        let v_bytes = workbook
            .save_to_buffer()
            .map_err(derive_xlsx_error_text)?;
        tracing::debug!(
            sheet = %c_sheet_name,
            rows = records.len(),
            columns = l_keys.len(),
            bytes = v_bytes.len(),
            "wrote records to xlsx"
        );
        Ok(v_bytes)
    }
}

/// Write `records` with `options`; shorthand for [`XlsxRecordWriter::write_records`].
pub fn write_records_to_xlsx_bytes(
    records: &[SpecRecord],
    options: &SpecXlsxJsonWriteOptions,
) -> Result<Vec<u8>, XlsxJsonError> {
    XlsxRecordWriter::new(options.clone()).write_records(records)
}

/// Union of record keys in first-seen order.
pub fn derive_header_keys(records: &[SpecRecord]) -> Vec<&str> {
    let mut set_keys: IndexSet<&str> = IndexSet::new();
    for record in records {
        set_keys.extend(record.keys().map(String::as_str));
    }
    set_keys.into_iter().collect()
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy_autofit.width_cell_min == 0 {
        return Err("policy_autofit.width_cell_min must be >= 1.".to_string());
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        );
    }
    Ok(())
}

/// Excel drops empty text cells, so an empty key is stored as a formula yielding `""`.
fn write_header(
    worksheet: &mut Worksheet,
    l_keys: &[&str],
    fmt_header: &Format,
) -> Result<(), String> {
    let n_row = cast_row_num(N_IDX_ROW_HEADER as usize)?;
    for (n_idx_col, key) in l_keys.iter().enumerate() {
        let n_col = cast_col_num(n_idx_col)?;
        if key.is_empty() {
            worksheet
                .write_formula_with_format(
                    n_row,
                    n_col,
                    Formula::new("=\"\"").set_result(""),
                    fmt_header,
                )
                .map_err(derive_xlsx_error_text)?;
        } else {
            worksheet
                .write_string_with_format(n_row, n_col, *key, fmt_header)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn write_cell_value(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    let result = match value {
        EnumCellValue::Null => return Ok(()),
        EnumCellValue::Integer(val) => worksheet.write_number(n_row, n_col, *val as f64),
        EnumCellValue::Float(val) => worksheet.write_number(n_row, n_col, *val),
        EnumCellValue::Boolean(val) => worksheet.write_boolean(n_row, n_col, *val),
        EnumCellValue::String(_) | EnumCellValue::DateTime(_) => {
            worksheet.write_string(n_row, n_col, value.to_text())
        }
    };
    result.map(|_| ()).map_err(derive_xlsx_error_text)
}

fn apply_column_widths(
    worksheet: &mut Worksheet,
    policy: &SpecAutofitCellsPolicy,
    l_keys: &[&str],
    l_width_by_col_body: &[usize],
) -> Result<(), String> {
    let n_min = usize::max(1, policy.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));
    let n_pad = policy.width_cell_padding;

    for (n_idx_col, key) in l_keys.iter().enumerate() {
        let n_width_header = estimate_unicode_string_width(key);
        let n_width_body = l_width_by_col_body[n_idx_col];
        let n_width_recorded = match policy.rule_columns {
            EnumAutofitColumnsRule::Header => n_width_header,
            EnumAutofitColumnsRule::Body => n_width_body,
            EnumAutofitColumnsRule::All => usize::max(n_width_header, n_width_body),
        };
        let n_width_final = usize::min(n_max, usize::max(n_min, n_width_recorded + n_pad));
        worksheet
            .set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)
            .map_err(derive_xlsx_error_text)?;
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        _ => None,
    }
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}
