//! `axiomkit_io_xlsx_json` v1:
//! Rust-side XLSX <-> ordered JSON records kernel.
//!
//! Architecture mirrors the `io/xlsx` kernel split:
//! - `conf`    : constants and default presets
//! - `spec`    : specs/models/options/errors
//! - `util`    : pure helper functions (header keys, serial dates, widths)
//! - `sheet`   : in-memory sheet model and calamine decoder
//! - `mapping` : column index -> record key resolution
//! - `coerce`  : cell coercion and formula evaluation seam
//! - `evaluate`: formula engine evaluator
//! - `reader`  : workbook bytes -> records
//! - `writer`  : records -> workbook bytes
//! - `json`    : records <-> JSON text
pub mod coerce;
pub mod conf;
pub mod evaluate;
pub mod json;
pub mod mapping;
pub mod reader;
pub mod sheet;
pub mod spec;
pub mod util;
pub mod writer;

pub use coerce::{CachedFormulaEvaluator, FormulaEvaluator, coerce_cell_value};
pub use conf::{
    C_KEY_UNKNOWN, C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use evaluate::EngineFormulaEvaluator;
pub use json::{convert_records_to_json_string, derive_records_from_json_str};
pub use mapping::{resolve_column_mapping, validate_column_selection};
pub use reader::{build_records, parse_sheet_to_records, parse_xlsx_bytes_to_records};
pub use sheet::{EnumRawCell, SpecHeaderRow, SpecSheet, decode_xlsx_sheets};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecColumnMapping, SpecRecord, SpecXlsxJsonWriteOptions, SpecXlsxReadOptions, XlsxJsonError,
};
pub use util::{
    convert_datetime_to_excel_serial, convert_excel_serial_to_datetime, normalize_header_key,
    sanitize_sheet_name, trim_control_chars, validate_xlsx_upload,
};
pub use writer::{XlsxRecordWriter, derive_header_keys, write_records_to_xlsx_bytes};
