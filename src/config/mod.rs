//! Configuration documents
//!
//! Configuration is carried as JSON values (see [serde_json::Value]):
//!
//! - [document]: parameter header tables and parameter-headers documents
//! - [descriptor]: the variation-descriptor mini-language
//! - [tool]: parameters declared in a provider's tool configuration

pub mod descriptor;
pub mod document;
pub mod tool;

use serde_json::{Map, Value};

use crate::error::SystToolsError;

pub use descriptor::VariationDescriptor;
pub use document::{
    build_parameter_headers, header_from_json_str, header_from_value, header_to_json_string,
    header_to_value, parameter_headers_document, read_provider_entries, ProviderEntry,
};
pub use tool::{
    make_random_variations, parse_tool_configuration_parameter,
    tool_configuration_parameter_exists, RandomDistribution,
};

/// A JSON object, the table type of configuration documents
pub type Table = Map<String, Value>;

pub(crate) fn as_table<'a>(value: &'a Value, what: &str) -> Result<&'a Table, SystToolsError> {
    value
        .as_object()
        .ok_or_else(|| SystToolsError::config(format!("{} must be a table", what)))
}

pub(crate) fn get_value<'a>(table: &'a Table, key: &str, what: &str) -> Result<&'a Value, SystToolsError> {
    table
        .get(key)
        .ok_or_else(|| SystToolsError::config(format!("{} has no key \"{}\"", what, key)))
}

pub(crate) fn get_str<'a>(table: &'a Table, key: &str, what: &str) -> Result<&'a str, SystToolsError> {
    get_value(table, key, what)?
        .as_str()
        .ok_or_else(|| SystToolsError::config(format!("{}: \"{}\" must be a string", what, key)))
}

pub(crate) fn get_opt_str<'a>(
    table: &'a Table,
    key: &str,
    what: &str,
) -> Result<Option<&'a str>, SystToolsError> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| {
            SystToolsError::config(format!("{}: \"{}\" must be a string", what, key))
        }),
    }
}

pub(crate) fn get_opt_f64(table: &Table, key: &str, what: &str) -> Result<Option<f64>, SystToolsError> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            SystToolsError::config(format!("{}: \"{}\" must be a number", what, key))
        }),
    }
}

pub(crate) fn get_opt_usize(
    table: &Table,
    key: &str,
    what: &str,
) -> Result<Option<usize>, SystToolsError> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
            SystToolsError::config(format!(
                "{}: \"{}\" must be a non-negative integer",
                what, key
            ))
        }),
    }
}

pub(crate) fn get_str_list(table: &Table, key: &str, what: &str) -> Result<Vec<String>, SystToolsError> {
    let list = get_value(table, key, what)?
        .as_array()
        .ok_or_else(|| SystToolsError::config(format!("{}: \"{}\" must be a list", what, key)))?;
    list.iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                SystToolsError::config(format!("{}: \"{}\" must only hold strings", what, key))
            })
        })
        .collect()
}

/// `tool_type`, or `tool_type_instance_name` when an instance name is given
pub fn fully_qualified_name(tool_type: &str, instance_name: Option<&str>) -> String {
    match instance_name {
        Some(instance) if !instance.is_empty() => format!("{}_{}", tool_type, instance),
        _ => tool_type.to_string(),
    }
}
