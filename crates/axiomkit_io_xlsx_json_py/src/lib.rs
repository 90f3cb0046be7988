use axiomkit_io_xlsx_json::conf::{
    derive_default_header_format, derive_default_xlsx_json_write_options,
};
use axiomkit_io_xlsx_json::{
    EnumAutofitColumnsRule, SpecCellFormat, SpecXlsxReadOptions, XlsxJsonError,
    convert_records_to_json_string, derive_records_from_json_str, normalize_header_key,
    parse_xlsx_bytes_to_records, validate_xlsx_upload, write_records_to_xlsx_bytes,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.xlsx_json.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

/// Parse an uploaded workbook into a JSON array of records.
#[pyfunction(name = "parse_xlsx_to_json")]
#[pyo3(signature = (data, file_name, column_indexes = None, custom_keys = None, sheet_index = 0))]
fn parse_xlsx_to_json_py(
    py: Python<'_>,
    data: &[u8],
    file_name: Option<String>,
    column_indexes: Option<Vec<usize>>,
    custom_keys: Option<Vec<String>>,
    sheet_index: usize,
) -> PyResult<String> {
    validate_xlsx_upload(file_name.as_deref(), data.len()).map_err(map_xlsx_json_error)?;

    let cfg_read_options = SpecXlsxReadOptions {
        column_indexes,
        custom_keys,
        sheet_index,
    };
    py.allow_threads(|| {
        let l_records = parse_xlsx_bytes_to_records(data, &cfg_read_options)?;
        convert_records_to_json_string(&l_records)
    })
    .map_err(map_xlsx_json_error)
}

/// Build a one-sheet workbook from a JSON array of records.
#[pyfunction(name = "write_json_to_xlsx")]
#[pyo3(signature = (
    json_text,
    sheet_name = None,
    fmt_header = None,
    rule_autofit_columns = "all",
    height_body_inferred_max = None
))]
fn write_json_to_xlsx_py<'py>(
    py: Python<'py>,
    json_text: &str,
    sheet_name: Option<String>,
    fmt_header: Option<&Bound<'py, PyAny>>,
    rule_autofit_columns: &str,
    height_body_inferred_max: Option<usize>,
) -> PyResult<Bound<'py, PyBytes>> {
    let mut cfg_write_options = derive_default_xlsx_json_write_options();
    if let Some(val) = sheet_name {
        cfg_write_options.sheet_name = val;
    }
    if let Some(fmt) = parse_spec_cell_format(fmt_header)? {
        cfg_write_options.fmt_header = derive_default_header_format().merge(&fmt);
    }
    cfg_write_options.policy_autofit.rule_columns =
        parse_rule_autofit_columns(rule_autofit_columns)?;
    cfg_write_options.policy_autofit.height_body_inferred_max = height_body_inferred_max;

    let v_bytes = py
        .allow_threads(|| {
            let l_records = derive_records_from_json_str(json_text)?;
            write_records_to_xlsx_bytes(&l_records, &cfg_write_options)
        })
        .map_err(map_xlsx_json_error)?;
    Ok(PyBytes::new(py, &v_bytes))
}

#[pyfunction(name = "normalize_header_key")]
#[pyo3(signature = (header = None))]
fn normalize_header_key_py(header: Option<&str>) -> String {
    normalize_header_key(header)
}

fn parse_rule_autofit_columns(value: &str) -> PyResult<EnumAutofitColumnsRule> {
    match value {
        "header" => Ok(EnumAutofitColumnsRule::Header),
        "body" => Ok(EnumAutofitColumnsRule::Body),
        "all" => Ok(EnumAutofitColumnsRule::All),
        _ => Err(PyValueError::new_err(format!(
            "Invalid autofit rule: `{value}`. Expected one of: ['header', 'body', 'all']"
        ))),
    }
}

fn map_xlsx_json_error(err: XlsxJsonError) -> PyErr {
    if err.is_caller_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn parse_spec_cell_format(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Option<SpecCellFormat>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    Ok(Some(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        border: extract_optional_attr::<i64>(obj, "border")?,
        bg_color: extract_optional_attr::<String>(obj, "bg_color")?,
        font_color: extract_optional_attr::<String>(obj, "font_color")?,
    }))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

#[pymodule]
fn _axiomkit_io_xlsx_json_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(parse_xlsx_to_json_py, module)?)?;
    module.add_function(wrap_pyfunction!(write_json_to_xlsx_py, module)?)?;
    module.add_function(wrap_pyfunction!(normalize_header_key_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
