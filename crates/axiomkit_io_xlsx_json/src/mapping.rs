//! Column selection: header row + requested indexes/keys -> ordered column mapping.

use crate::conf::C_KEY_UNKNOWN_COL_PREFIX;
use crate::sheet::SpecHeaderRow;
use crate::spec::{SpecColumnMapping, XlsxJsonError};
use crate::util::normalize_header_key;

/// Check the indexes/keys combination before any document is read.
///
/// Custom keys need column indexes, and both lists must have the same length.
pub fn validate_column_selection(
    column_indexes: Option<&[usize]>,
    custom_keys: Option<&[String]>,
) -> Result<(), XlsxJsonError> {
    let n_keys = custom_keys.map_or(0, <[String]>::len);
    if n_keys == 0 {
        return Ok(());
    }

    let n_indexes = column_indexes.map_or(0, <[usize]>::len);
    if n_indexes == 0 {
        return Err(XlsxJsonError::InvalidRequest(
            "customKeys requires columnIndexes".to_string(),
        ));
    }
    if n_keys != n_indexes {
        return Err(XlsxJsonError::InvalidRequest(format!(
            "customKeys length ({n_keys}) must equal columnIndexes length ({n_indexes})"
        )));
    }
    Ok(())
}

/// Build the ordered column index -> key mapping.
///
/// Without requested indexes every header cell is mapped in column order, skipping columns
/// that have no header cell. With requested indexes the request order is kept; keys come from
/// `custom_keys` when given, else from the normalized header text, else `UNKNOWN_COL_{index}`.
pub fn resolve_column_mapping(
    header: &SpecHeaderRow,
    column_indexes: Option<&[usize]>,
    custom_keys: Option<&[String]>,
) -> Result<SpecColumnMapping, XlsxJsonError> {
    validate_column_selection(column_indexes, custom_keys)?;

    let mut mapping = SpecColumnMapping::new();

    let l_indexes = column_indexes.unwrap_or_default();
    if l_indexes.is_empty() {
        for n_col in 0..header.len() {
            if let Some(c_text) = header.get(n_col) {
                mapping.insert(n_col, normalize_header_key(Some(c_text)));
            }
        }
        return Ok(mapping);
    }

    let l_keys = custom_keys.filter(|keys| !keys.is_empty());
    for (n_pos, n_col) in l_indexes.iter().copied().enumerate() {
        let c_key = match l_keys {
            Some(keys) => keys[n_pos].clone(),
            None => match header.get(n_col) {
                Some(c_text) => normalize_header_key(Some(c_text)),
                None => format!("{C_KEY_UNKNOWN_COL_PREFIX}{n_col}"),
            },
        };

        if let Some(c_key_replaced) = mapping.insert(n_col, c_key.as_str()) {
            tracing::warn!(
                column = n_col,
                replaced = %c_key_replaced,
                key = %c_key,
                "column index requested more than once; later key wins"
            );
        }
    }

    Ok(mapping)
}
