//! XLSX reader kernel: workbook bytes -> ordered JSON-like records.

use crate::coerce::{CachedFormulaEvaluator, FormulaEvaluator, coerce_cell_value};
use crate::conf::N_IDX_ROW_HEADER;
use crate::evaluate::EngineFormulaEvaluator;
use crate::mapping::{resolve_column_mapping, validate_column_selection};
use crate::sheet::{SpecSheet, decode_xlsx_sheets, derive_sheet_index_error};
use crate::spec::{
    EnumCellValue, SpecColumnMapping, SpecRecord, SpecXlsxReadOptions, XlsxJsonError,
};

/// Parse the configured sheet of an XLSX container into records.
///
/// The selection in `options` is validated before the container is decoded, so a bad
/// indexes/keys combination is reported as [`XlsxJsonError::InvalidRequest`] even for
/// unreadable bytes. Formula cells are recomputed by the calculation engine over all
/// sheets of the workbook.
pub fn parse_xlsx_bytes_to_records(
    v_bytes: &[u8],
    options: &SpecXlsxReadOptions,
) -> Result<Vec<SpecRecord>, XlsxJsonError> {
    validate_column_selection(
        options.column_indexes.as_deref(),
        options.custom_keys.as_deref(),
    )?;

    let l_sheets = decode_xlsx_sheets(v_bytes).map_err(XlsxJsonError::from_processing)?;
    let Some(sheet) = l_sheets.get(options.sheet_index) else {
        return Err(XlsxJsonError::from_processing(derive_sheet_index_error(
            options.sheet_index,
            l_sheets.len(),
        )));
    };

    let mut evaluator: Box<dyn FormulaEvaluator> = if sheet.has_formulas() {
        Box::new(
            EngineFormulaEvaluator::from_sheets(&l_sheets, options.sheet_index)
                .map_err(XlsxJsonError::from_processing)?,
        )
    } else {
        Box::new(CachedFormulaEvaluator::new())
    };
    parse_sheet_to_records(sheet, options, evaluator.as_mut())
}

/// Parse an already decoded sheet with a caller-provided formula evaluator.
pub fn parse_sheet_to_records(
    sheet: &SpecSheet,
    options: &SpecXlsxReadOptions,
    evaluator: &mut dyn FormulaEvaluator,
) -> Result<Vec<SpecRecord>, XlsxJsonError> {
    let header = sheet
        .header_row(N_IDX_ROW_HEADER)
        .ok_or(XlsxJsonError::EmptyOrMissingHeader)?;
    let mapping = resolve_column_mapping(
        &header,
        options.column_indexes.as_deref(),
        options.custom_keys.as_deref(),
    )?;

    build_records(sheet, &mapping, evaluator)
}

/// Walk every data row below the header and build one record per row.
///
/// Rows absent from the sheet still yield a record with every mapped key set to `Null`.
pub fn build_records(
    sheet: &SpecSheet,
    mapping: &SpecColumnMapping,
    evaluator: &mut dyn FormulaEvaluator,
) -> Result<Vec<SpecRecord>, XlsxJsonError> {
    if !sheet.has_row(N_IDX_ROW_HEADER) {
        return Err(XlsxJsonError::EmptyOrMissingHeader);
    }

    let n_row_last = sheet.row_last().unwrap_or(N_IDX_ROW_HEADER);
    let l_cols: Vec<(Option<u32>, &str)> = mapping
        .iter()
        .map(|(n_col, key)| (u32::try_from(n_col).ok(), key))
        .collect();

    let mut l_records = Vec::with_capacity((n_row_last - N_IDX_ROW_HEADER) as usize);
    for n_row in (N_IDX_ROW_HEADER + 1)..=n_row_last {
        let if_has_row = sheet.has_row(n_row);

        let mut record = SpecRecord::with_capacity(l_cols.len());
        for (n_col, key) in &l_cols {
            let value = match n_col {
                Some(n_col) if if_has_row => coerce_cell_value(
                    sheet.get_cell(n_row, *n_col),
                    n_row,
                    *n_col,
                    evaluator,
                )
                .map_err(XlsxJsonError::from_processing)?,
                _ => EnumCellValue::Null,
            };
            record.insert((*key).to_string(), value);
        }
        l_records.push(record);
    }

    tracing::debug!(
        sheet = %sheet.sheet_name,
        rows = l_records.len(),
        columns = mapping.len(),
        "built records from sheet"
    );
    Ok(l_records)
}
