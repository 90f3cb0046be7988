//! Formula evaluation backed by the formualizer calculation engine.

use std::collections::{HashMap, HashSet};

use chrono::NaiveTime;
use formualizer_common::ExcelError;
use formualizer_workbook::{LiteralValue, Workbook, WorkbookMode};

use crate::coerce::FormulaEvaluator;
use crate::sheet::{EnumRawCell, SpecSheet, derive_sheet_index_error};
use crate::util::convert_datetime_to_excel_serial;

/// Evaluator that recomputes formulas from the cells of the whole workbook.
///
/// Every decoded sheet is loaded into an ephemeral engine workbook, so references to other
/// sheets resolve. Results are memoized by position for the lifetime of one parse call, and
/// the decoded sheets are never modified. Formulas the engine cannot parse fall back to the
/// result cached in the document.
pub struct EngineFormulaEvaluator {
    workbook: Workbook,
    c_sheet_name: String,
    set_unparsed: HashSet<(u32, u32)>,
    dict_results: HashMap<(u32, u32), EnumRawCell>,
}

impl EngineFormulaEvaluator {
    /// Load `l_sheets` into the engine and evaluate against `l_sheets[sheet_index]`.
    pub fn from_sheets(l_sheets: &[SpecSheet], sheet_index: usize) -> Result<Self, String> {
        let Some(sheet_target) = l_sheets.get(sheet_index) else {
            return Err(derive_sheet_index_error(sheet_index, l_sheets.len()));
        };

        let mut workbook = Workbook::new_with_mode(WorkbookMode::Ephemeral);
        for sheet in l_sheets {
            workbook.add_sheet(&sheet.sheet_name).map_err(|err| {
                format!("Failed to load sheet {:?} into engine: {err}", sheet.sheet_name)
            })?;
        }

        let mut set_unparsed = HashSet::new();
        for (n_idx, sheet) in l_sheets.iter().enumerate() {
            let l_unparsed = load_sheet_cells(&mut workbook, sheet)?;
            if n_idx == sheet_index {
                set_unparsed.extend(l_unparsed);
            }
        }

        Ok(Self {
            workbook,
            c_sheet_name: sheet_target.sheet_name.clone(),
            set_unparsed,
            dict_results: HashMap::new(),
        })
    }

    /// Evaluator for a standalone sheet.
    pub fn from_sheet(sheet: &SpecSheet) -> Result<Self, String> {
        Self::from_sheets(std::slice::from_ref(sheet), 0)
    }
}

impl FormulaEvaluator for EngineFormulaEvaluator {
    fn evaluate_formula_cell(
        &mut self,
        row: u32,
        col: u32,
        cell: &EnumRawCell,
    ) -> Result<EnumRawCell, String> {
        if let Some(result) = self.dict_results.get(&(row, col)) {
            return Ok(result.clone());
        }

        let EnumRawCell::Formula {
            result: cell_cached,
            ..
        } = cell
        else {
            return Err(format!("Cell ({row}, {col}) is not a formula cell: {cell:?}"));
        };

        let result = if self.set_unparsed.contains(&(row, col)) {
            cell_cached.as_deref().cloned().unwrap_or(EnumRawCell::Blank)
        } else {
            let if_date_formatted = matches!(
                cell_cached.as_deref(),
                Some(EnumRawCell::Numeric {
                    if_date_formatted: true,
                    ..
                })
            );
            let value = self
                .workbook
                .evaluate_cell(&self.c_sheet_name, row + 1, col + 1)
                .map_err(|err| format!("Failed to evaluate formula at ({row}, {col}): {err}"))?;
            convert_literal_value(value, if_date_formatted)
        };

        self.dict_results.insert((row, col), result.clone());
        Ok(result)
    }
}

/// Push the cells of `sheet` into the engine; engine coordinates are 1-based.
///
/// Returns the positions of formulas the engine rejected.
fn load_sheet_cells(workbook: &mut Workbook, sheet: &SpecSheet) -> Result<Vec<(u32, u32)>, String> {
    let c_sheet_name = sheet.sheet_name.as_str();
    let mut l_unparsed = Vec::new();

    for (n_row, n_col, cell) in sheet.iter_cells() {
        let value = match cell {
            EnumRawCell::Blank => continue,
            EnumRawCell::Formula { formula, .. } => {
                if let Err(err) = workbook.set_formula(c_sheet_name, n_row + 1, n_col + 1, formula)
                {
                    tracing::warn!(
                        sheet = %c_sheet_name,
                        row = n_row,
                        col = n_col,
                        error = %err,
                        "formula not supported by engine; using cached result"
                    );
                    l_unparsed.push((n_row, n_col));
                }
                continue;
            }
            EnumRawCell::String(val) => LiteralValue::Text(val.clone()),
            EnumRawCell::Numeric { value, .. } => LiteralValue::Number(*value),
            EnumRawCell::Boolean(val) => LiteralValue::Boolean(*val),
            EnumRawCell::Error(code) => LiteralValue::Error(ExcelError::from_error_string(code)),
        };

        workbook
            .set_value(c_sheet_name, n_row + 1, n_col + 1, value)
            .map_err(|err| {
                format!("Failed to load cell ({n_row}, {n_col}) of sheet {c_sheet_name:?}: {err}")
            })?;
    }

    Ok(l_unparsed)
}

/// Map an engine result back onto a document cell.
///
/// Numbers keep the date flag of the cached result; engine dates and times become
/// date-formatted serials. Arrays contribute their top-left element.
fn convert_literal_value(value: LiteralValue, if_date_formatted: bool) -> EnumRawCell {
    match value {
        LiteralValue::Int(val) => EnumRawCell::Numeric {
            value: val as f64,
            if_date_formatted,
        },
        LiteralValue::Number(val) => EnumRawCell::Numeric {
            value: val,
            if_date_formatted,
        },
        LiteralValue::Text(val) => EnumRawCell::String(val),
        LiteralValue::Boolean(val) => EnumRawCell::Boolean(val),
        LiteralValue::Date(date) => date
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| convert_datetime_to_excel_serial(&dt))
            .map_or(EnumRawCell::Blank, EnumRawCell::date_serial),
        LiteralValue::DateTime(dt) => convert_datetime_to_excel_serial(&dt)
            .map_or(EnumRawCell::Blank, EnumRawCell::date_serial),
        LiteralValue::Time(time) => {
            let n_ms = time.signed_duration_since(NaiveTime::MIN).num_milliseconds();
            EnumRawCell::date_serial(n_ms as f64 / 86_400_000.0)
        }
        LiteralValue::Duration(delta) => EnumRawCell::Numeric {
            value: delta.num_milliseconds() as f64 / 86_400_000.0,
            if_date_formatted,
        },
        LiteralValue::Array(l_rows) => l_rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map_or(EnumRawCell::Blank, |val| {
                convert_literal_value(val, if_date_formatted)
            }),
        LiteralValue::Error(err) => EnumRawCell::Error(err.kind.to_string()),
        LiteralValue::Empty | LiteralValue::Pending => EnumRawCell::Blank,
    }
}
