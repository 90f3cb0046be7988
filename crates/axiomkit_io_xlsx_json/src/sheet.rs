//! In-memory sheet model and the calamine-backed workbook decoder.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use calamine::{DataRef, Reader, Xlsx, XlsxError, open_workbook_from_rs};

use crate::util::{
    convert_datetime_to_excel_serial, convert_excel_serial_to_datetime, format_datetime_iso,
    format_general_number,
};

////////////////////////////////////////////////////////////////////////////////
// #region RawCell

/// Cell as stored in the document, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRawCell {
    /// Present but empty cell.
    Blank,
    /// Text cell (untrimmed).
    String(String),
    /// Number cell; `if_date_formatted` is set when its number format shows a date/time.
    Numeric {
        /// Stored number (serial day for date-formatted cells).
        value: f64,
        /// Number format denotes a date/time presentation.
        if_date_formatted: bool,
    },
    /// Logical cell.
    Boolean(bool),
    /// Formula cell with the result cached by the producing application, if any.
    Formula {
        /// Formula text without the leading `=`.
        formula: String,
        /// Cached result cell.
        result: Option<Box<EnumRawCell>>,
    },
    /// Error cell such as `#DIV/0!`.
    Error(String),
}

impl EnumRawCell {
    /// Plain number cell.
    pub fn number(value: f64) -> Self {
        Self::Numeric {
            value,
            if_date_formatted: false,
        }
    }

    /// Date-formatted number cell holding an Excel serial day.
    pub fn date_serial(value: f64) -> Self {
        Self::Numeric {
            value,
            if_date_formatted: true,
        }
    }

    /// Formula cell with an optional cached result.
    pub fn formula(formula: impl Into<String>, result: Option<EnumRawCell>) -> Self {
        Self::Formula {
            formula: formula.into(),
            result: result.map(Box::new),
        }
    }

    /// Text a header cell contributes before key normalization.
    pub fn to_header_text(&self) -> String {
        match self {
            Self::Blank => String::new(),
            Self::String(val) => val.clone(),
            Self::Numeric {
                value,
                if_date_formatted: true,
            } => convert_excel_serial_to_datetime(*value)
                .map(|dt| format_datetime_iso(&dt))
                .unwrap_or_else(|| format_general_number(*value)),
            Self::Numeric { value, .. } => format_general_number(*value),
            Self::Boolean(val) => if *val { "TRUE" } else { "FALSE" }.to_string(),
            Self::Formula { result, .. } => result
                .as_deref()
                .map(Self::to_header_text)
                .unwrap_or_default(),
            Self::Error(code) => code.clone(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Sheet

/// Sparse sheet: only stored cells are kept, keyed by zero-based `(row, col)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecSheet {
    /// Sheet name inside the source workbook.
    pub sheet_name: String,
    dict_cells: BTreeMap<(u32, u32), EnumRawCell>,
}

impl SpecSheet {
    /// Create an empty sheet.
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            ..Default::default()
        }
    }

    /// Decode the sheet at `sheet_index` from XLSX container bytes.
    pub fn from_xlsx_bytes(v_bytes: &[u8], sheet_index: usize) -> Result<Self, String> {
        let mut l_sheets = decode_xlsx_sheets(v_bytes)?;
        if sheet_index >= l_sheets.len() {
            return Err(derive_sheet_index_error(sheet_index, l_sheets.len()));
        }
        Ok(l_sheets.swap_remove(sheet_index))
    }

    /// Store `cell` at `(row, col)`, replacing any previous cell.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: EnumRawCell) {
        self.dict_cells.insert((row, col), cell);
    }

    /// Stored cell at `(row, col)`.
    pub fn get_cell(&self, row: u32, col: u32) -> Option<&EnumRawCell> {
        self.dict_cells.get(&(row, col))
    }

    /// Stored cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u32, &EnumRawCell)> {
        self.dict_cells
            .iter()
            .map(|((n_row, n_col), cell)| (*n_row, *n_col, cell))
    }

    /// `true` when any stored cell is a formula.
    pub fn has_formulas(&self) -> bool {
        self.dict_cells
            .values()
            .any(|cell| matches!(cell, EnumRawCell::Formula { .. }))
    }

    /// `true` when at least one cell, blank or not, is stored in `row`.
    pub fn has_row(&self, row: u32) -> bool {
        self.dict_cells
            .range((row, 0)..=(row, u32::MAX))
            .next()
            .is_some()
    }

    /// Last row index of the sheet, `None` for an empty sheet.
    pub fn row_last(&self) -> Option<u32> {
        self.dict_cells.keys().next_back().map(|(n_row, _)| *n_row)
    }

    /// Last stored column index in `row`.
    pub fn col_last(&self, row: u32) -> Option<u32> {
        self.dict_cells
            .range((row, 0)..=(row, u32::MAX))
            .next_back()
            .map(|((_, n_col), _)| *n_col)
    }

    /// Header view of `row`; `None` when the row is absent.
    pub fn header_row(&self, row: u32) -> Option<SpecHeaderRow> {
        let n_col_last = self.col_last(row)?;
        let l_cells = (0..=n_col_last)
            .map(|n_col| self.get_cell(row, n_col).map(EnumRawCell::to_header_text))
            .collect();
        Some(SpecHeaderRow::new(l_cells))
    }
}

/// Decode every worksheet of an XLSX container, in workbook order.
///
/// Formatted cells without a value are kept as [`EnumRawCell::Blank`]. Chart sheets decode
/// as empty sheets. Date cells are rebased onto the 1900 date system, so
/// 1904-system workbooks yield the same serials as their 1900 counterparts.
pub fn decode_xlsx_sheets(v_bytes: &[u8]) -> Result<Vec<SpecSheet>, String> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(v_bytes))
        .map_err(|err| format!("Failed to open xlsx container: {err}"))?;

    workbook
        .sheet_names()
        .into_iter()
        .map(|c_sheet_name| decode_worksheet(&mut workbook, c_sheet_name))
        .collect()
}

pub(crate) fn derive_sheet_index_error(sheet_index: usize, n_sheets: usize) -> String {
    format!("Sheet index {sheet_index} out of range: workbook has {n_sheets} sheet(s).")
}

fn decode_worksheet<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    c_sheet_name: String,
) -> Result<SpecSheet, String> {
    let mut sheet = SpecSheet::new(c_sheet_name);

    {
        let mut reader = match workbook.worksheet_cells_reader(&sheet.sheet_name) {
            Ok(reader) => reader,
            Err(XlsxError::NotAWorksheet(_)) => return Ok(sheet),
            Err(err) => {
                return Err(format!("Failed to read sheet {:?}: {err}", sheet.sheet_name));
            }
        };
        while let Some(cell) = reader
            .next_cell()
            .map_err(|err| format!("Failed to read sheet {:?}: {err}", sheet.sheet_name))?
        {
            let (n_row, n_col) = cell.get_position();
            sheet
                .dict_cells
                .insert((n_row, n_col), convert_calamine_data(cell.get_value()));
        }
    }

    let range_formulas = workbook
        .worksheet_formula(&sheet.sheet_name)
        .map_err(|err| {
            format!(
                "Failed to read formulas of sheet {:?}: {err}",
                sheet.sheet_name
            )
        })?;
    let (n_row_start, n_col_start) = range_formulas.start().unwrap_or_default();
    for (n_row, n_col, formula) in range_formulas.used_cells() {
        let pos = (n_row_start + n_row as u32, n_col_start + n_col as u32);
        let result = sheet
            .dict_cells
            .remove(&pos)
            .filter(|cell| *cell != EnumRawCell::Blank);
        sheet.set_cell(pos.0, pos.1, EnumRawCell::formula(formula.clone(), result));
    }

    Ok(sheet)
}

fn convert_calamine_data(value: &DataRef<'_>) -> EnumRawCell {
    match value {
        DataRef::Empty => EnumRawCell::Blank,
        DataRef::String(val) => EnumRawCell::String(val.clone()),
        DataRef::SharedString(val) => EnumRawCell::String((*val).to_string()),
        DataRef::Float(val) => EnumRawCell::number(*val),
        DataRef::Int(val) => EnumRawCell::number(*val as f64),
        DataRef::Bool(val) => EnumRawCell::Boolean(*val),
        DataRef::DateTime(val) => {
            let x = val
                .as_datetime()
                .and_then(|dt| convert_datetime_to_excel_serial(&dt))
                .unwrap_or_else(|| val.as_f64());
            EnumRawCell::date_serial(x)
        }
        DataRef::DateTimeIso(val) => EnumRawCell::String(val.clone()),
        DataRef::DurationIso(val) => EnumRawCell::String(val.clone()),
        DataRef::Error(err) => EnumRawCell::Error(err.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderRow

/// Header row texts indexed by column; `None` marks a column without header cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecHeaderRow {
    l_cells: Vec<Option<String>>,
}

impl SpecHeaderRow {
    /// Build from positional texts.
    pub fn new(l_cells: Vec<Option<String>>) -> Self {
        Self { l_cells }
    }

    /// Build a fully populated header from texts.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|val| Some(val.into())).collect())
    }

    /// Header text at `col_idx`.
    pub fn get(&self, col_idx: usize) -> Option<&str> {
        self.l_cells.get(col_idx).and_then(|val| val.as_deref())
    }

    /// One past the last populated column index.
    pub fn len(&self) -> usize {
        self.l_cells.len()
    }

    /// `true` when the header has no cell at all.
    pub fn is_empty(&self) -> bool {
        self.l_cells.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
