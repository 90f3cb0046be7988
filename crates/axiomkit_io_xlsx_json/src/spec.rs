//! Shared XLSX <-> JSON specification models.

use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::conf::{derive_default_autofit_policy, derive_default_xlsx_json_write_options};
use crate::util::{format_datetime_iso, format_general_number};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueSpecification

/// Canonical scalar produced from one spreadsheet cell.
///
/// `String` never holds text that is empty after trimming when it comes out of
/// coercion; such cells collapse to `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    Null,
    /// Trimmed, non-empty text.
    String(String),
    /// Whole number.
    Integer(i64),
    /// Fractional number.
    Float(f64),
    /// Logical value.
    Boolean(bool),
    /// Calendar timestamp from a date-formatted numeric cell.
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    /// Return `true` for [`EnumCellValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text shown for the value in a spreadsheet with general formatting.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(val) => val.clone(),
            Self::Integer(val) => val.to_string(),
            Self::Float(val) => format_general_number(*val),
            Self::Boolean(val) => if *val { "TRUE" } else { "FALSE" }.to_string(),
            Self::DateTime(val) => format_datetime_iso(val),
        }
    }
}

impl Serialize for EnumCellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::String(val) => serializer.serialize_str(val),
            Self::Integer(val) => serializer.serialize_i64(*val),
            Self::Float(val) => serializer.serialize_f64(*val),
            Self::Boolean(val) => serializer.serialize_bool(*val),
            Self::DateTime(val) => serializer.serialize_str(&format_datetime_iso(val)),
        }
    }
}

/// One data row: keys in column-mapping order.
pub type SpecRecord = IndexMap<String, EnumCellValue>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnMappingSpecification

/// Ordered column index -> record key mapping.
///
/// Re-inserting an index replaces its key but keeps the position of the first insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnMapping {
    dict_key_by_col: IndexMap<usize, String>,
}

impl SpecColumnMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `col_idx` to `key`; return the key it replaced, if any.
    pub fn insert(&mut self, col_idx: usize, key: impl Into<String>) -> Option<String> {
        self.dict_key_by_col.insert(col_idx, key.into())
    }

    /// Key mapped to `col_idx`.
    pub fn get(&self, col_idx: usize) -> Option<&str> {
        self.dict_key_by_col.get(&col_idx).map(String::as_str)
    }

    /// Number of mapped columns.
    pub fn len(&self) -> usize {
        self.dict_key_by_col.len()
    }

    /// Return `true` when no column is mapped.
    pub fn is_empty(&self) -> bool {
        self.dict_key_by_col.is_empty()
    }

    /// Iterate `(column index, key)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.dict_key_by_col
            .iter()
            .map(|(col_idx, key)| (*col_idx, key.as_str()))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification for generated workbooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            border: other.border.or(self.border),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy for generated sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected when body-based inference is active; `None` inspects all.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        derive_default_autofit_policy()
    }
}

/// Options for reading records out of a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReadOptions {
    /// Zero-based columns to keep, in output order. `None`/empty keeps every header column.
    pub column_indexes: Option<Vec<usize>>,
    /// Keys replacing the header text, position-aligned with `column_indexes`.
    pub custom_keys: Option<Vec<String>>,
    /// Sheet consulted; the first sheet by default.
    pub sheet_index: usize,
}

/// Options for writing records into a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxJsonWriteOptions {
    /// Output sheet name (sanitized before use).
    pub sheet_name: String,
    /// Header row format.
    pub fmt_header: SpecCellFormat,
    /// Column width policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecXlsxJsonWriteOptions {
    fn default() -> Self {
        derive_default_xlsx_json_write_options()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures surfaced by parse/generate calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XlsxJsonError {
    /// Bad combination of request parameters; reported back to the caller.
    InvalidRequest(String),
    /// Sheet has no row at the header index.
    EmptyOrMissingHeader,
    /// Any other failure while reading or writing the document.
    Processing(String),
}

impl XlsxJsonError {
    /// `true` when the caller can fix the request (HTTP 400 class).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    pub(crate) fn from_processing(message: impl AsRef<str>) -> Self {
        Self::Processing(format!("Failed to process xlsx: {}", message.as_ref()))
    }
}

impl fmt::Display for XlsxJsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(msg) => write!(f, "{msg}"),
            Self::EmptyOrMissingHeader => {
                write!(f, "Excel file is empty or has no header row.")
            }
            Self::Processing(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for XlsxJsonError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////
