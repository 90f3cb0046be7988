//! Cell coercion: raw document cells -> canonical scalar values.

use std::collections::HashMap;

use crate::sheet::EnumRawCell;
use crate::spec::EnumCellValue;
use crate::util::{convert_excel_serial_to_datetime, trim_control_chars};

/// `2^63`: first `f64` above the `i64` range.
const N_F64_I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

////////////////////////////////////////////////////////////////////////////////
// #region FormulaEvaluation

/// Materializes the result of a formula cell.
pub trait FormulaEvaluator {
    /// Return the concrete result cell for the formula `cell` at `(row, col)`.
    fn evaluate_formula_cell(
        &mut self,
        row: u32,
        col: u32,
        cell: &EnumRawCell,
    ) -> Result<EnumRawCell, String>;
}

/// Evaluator returning the result cached in the document by the producing application.
///
/// Created per parse call; results are memoized by position for the lifetime of the call.
#[derive(Debug, Default)]
pub struct CachedFormulaEvaluator {
    dict_results: HashMap<(u32, u32), EnumRawCell>,
}

impl CachedFormulaEvaluator {
    /// Create an evaluator with an empty memo.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormulaEvaluator for CachedFormulaEvaluator {
    fn evaluate_formula_cell(
        &mut self,
        row: u32,
        col: u32,
        cell: &EnumRawCell,
    ) -> Result<EnumRawCell, String> {
        if let Some(result) = self.dict_results.get(&(row, col)) {
            return Ok(result.clone());
        }

        let result = match cell {
            EnumRawCell::Formula { result, .. } => {
                result.as_deref().cloned().unwrap_or(EnumRawCell::Blank)
            }
            other => {
                return Err(format!(
                    "Cell ({row}, {col}) is not a formula cell: {other:?}"
                ));
            }
        };
        self.dict_results.insert((row, col), result.clone());
        Ok(result)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Coercion

/// Coerce the cell at `(row, col)` into a canonical value.
///
/// Formula cells are evaluated once through `evaluator`; the result goes through the same
/// dispatch, except that a result which is again a formula collapses to `Null`.
pub fn coerce_cell_value(
    cell: Option<&EnumRawCell>,
    row: u32,
    col: u32,
    evaluator: &mut dyn FormulaEvaluator,
) -> Result<EnumCellValue, String> {
    let Some(cell) = cell else {
        return Ok(EnumCellValue::Null);
    };

    match cell {
        EnumRawCell::Formula { .. } => {
            let result = evaluator.evaluate_formula_cell(row, col, cell)?;
            if matches!(result, EnumRawCell::Formula { .. }) {
                tracing::debug!(row, col, "formula evaluated to another formula; using null");
                return Ok(EnumCellValue::Null);
            }
            Ok(coerce_scalar_cell(&result))
        }
        other => Ok(coerce_scalar_cell(other)),
    }
}

fn coerce_scalar_cell(cell: &EnumRawCell) -> EnumCellValue {
    match cell {
        EnumRawCell::Blank => EnumCellValue::Null,
        EnumRawCell::String(val) => {
            let c_trimmed = trim_control_chars(val);
            if c_trimmed.is_empty() {
                EnumCellValue::Null
            } else {
                EnumCellValue::String(c_trimmed.to_string())
            }
        }
        EnumRawCell::Numeric {
            value,
            if_date_formatted,
        } => {
            if *if_date_formatted
                && let Some(dt) = convert_excel_serial_to_datetime(*value)
            {
                return EnumCellValue::DateTime(dt);
            }
            convert_number(*value)
        }
        EnumRawCell::Boolean(val) => EnumCellValue::Boolean(*val),
        EnumRawCell::Formula { .. } | EnumRawCell::Error(_) => EnumCellValue::Null,
    }
}

/// Whole numbers become `Integer`, everything else `Float`.
pub fn convert_number(x: f64) -> EnumCellValue {
    if x.fract() == 0.0 && (-N_F64_I64_BOUND..N_F64_I64_BOUND).contains(&x) {
        EnumCellValue::Integer(x as i64)
    } else {
        EnumCellValue::Float(x)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
