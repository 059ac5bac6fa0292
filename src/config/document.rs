//! Header tables and parameter-headers documents
//!
//! A header is written as a table whose keys are the camelCase field names of
//! [ParamHeader]. A parameter-headers document describes every configured
//! provider and its headers, so that the providers (or an interpreter) can
//! be rebuilt without re-running the tool configuration:
//!
//! ```json
//! {
//!   "syst_providers": ["genie_nue"],
//!   "genie_nue": {
//!     "tool_type": "genie",
//!     "instance_name": "nue",
//!     "parameter_headers": ["MaCCQE"],
//!     "MaCCQE": { "prettyName": "MaCCQE", "systParamId": 0, ... },
//!     "tool_options": { ... }
//!   }
//! }
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{as_table, fully_qualified_name, get_opt_str, get_str, get_str_list, get_value, Table};
use crate::error::SystToolsError;
use crate::header::ParamHeader;
use crate::interpreter::{HeaderMap, ProviderHeader};
use crate::metadata::MetaDataSet;

/// The key of the provider list in a parameter-headers document
pub const DEFAULT_PROVIDER_LIST_KEY: &str = "syst_providers";

/// Serialize a header, which must be valid
pub fn header_to_value(hdr: &ParamHeader) -> Result<Value, SystToolsError> {
    if let Some(violation) = hdr.violation() {
        return Err(SystToolsError::InvalidHeader {
            id: hdr.syst_param_id,
            name: hdr.pretty_name.clone(),
            reason: violation.to_string(),
        });
    }
    Ok(serde_json::to_value(hdr)?)
}

/// Deserialize a header
///
/// `prettyName` and `systParamId` are required, every other key is optional.
/// The header is not validated.
pub fn header_from_value(value: &Value) -> Result<ParamHeader, SystToolsError> {
    let hdr: ParamHeader = serde_json::from_value(value.clone())?;
    if hdr.syst_param_id.is_none() {
        return Err(SystToolsError::config(format!(
            "parameter header \"{}\" has no systParamId",
            hdr.pretty_name
        )));
    }
    Ok(hdr)
}

pub fn header_to_json_string(hdr: &ParamHeader) -> Result<String, SystToolsError> {
    Ok(serde_json::to_string_pretty(&header_to_value(hdr)?)?)
}

pub fn header_from_json_str(s: &str) -> Result<ParamHeader, SystToolsError> {
    let value: Value = serde_json::from_str(s)?;
    header_from_value(&value)
}

/// One provider's entry of a parameter-headers document
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEntry {
    pub tool_type: String,
    pub instance_name: Option<String>,
    pub headers: MetaDataSet,
    pub tool_options: Table,
}

impl ProviderEntry {
    pub fn new(tool_type: impl Into<String>, instance_name: Option<String>) -> Self {
        Self {
            tool_type: tool_type.into(),
            instance_name,
            headers: MetaDataSet::new(),
            tool_options: Map::new(),
        }
    }

    /// `tool_type`, or `tool_type_instance_name`
    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.tool_type, self.instance_name.as_deref())
    }

    fn from_table(key: &str, table: &Table) -> Result<Self, SystToolsError> {
        let what = format!("provider \"{}\"", key);
        let tool_type = get_str(table, "tool_type", &what)?.to_string();
        let instance_name = get_opt_str(table, "instance_name", &what)?
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let mut headers = MetaDataSet::new();
        for hkey in get_str_list(table, "parameter_headers", &what)? {
            let hdr = header_from_value(get_value(table, &hkey, &what)?)?;
            if let Some(violation) = hdr.violation() {
                return Err(SystToolsError::InvalidHeader {
                    id: hdr.syst_param_id,
                    name: hdr.pretty_name.clone(),
                    reason: violation.to_string(),
                });
            }
            headers.push(hdr);
        }

        let tool_options = match table.get("tool_options") {
            None => Map::new(),
            Some(value) => as_table(value, &format!("{}: tool_options", what))?.clone(),
        };

        Ok(Self {
            tool_type,
            instance_name,
            headers,
            tool_options,
        })
    }

    fn to_table(&self) -> Result<Table, SystToolsError> {
        let mut table = Map::new();
        let mut names = Vec::with_capacity(self.headers.len());
        for hdr in &self.headers {
            if table.contains_key(&hdr.pretty_name) || is_reserved_key(&hdr.pretty_name) {
                return Err(SystToolsError::config(format!(
                    "provider \"{}\" cannot store parameter \"{}\" under its name",
                    self.fully_qualified_name(),
                    hdr.pretty_name
                )));
            }
            table.insert(hdr.pretty_name.clone(), header_to_value(hdr)?);
            names.push(Value::from(hdr.pretty_name.clone()));
        }
        table.insert("parameter_headers".to_string(), Value::Array(names));
        table.insert("tool_type".to_string(), Value::from(self.tool_type.clone()));
        if let Some(instance_name) = &self.instance_name {
            table.insert("instance_name".to_string(), Value::from(instance_name.clone()));
        }
        if !self.tool_options.is_empty() {
            table.insert(
                "tool_options".to_string(),
                Value::Object(self.tool_options.clone()),
            );
        }
        Ok(table)
    }
}

fn is_reserved_key(key: &str) -> bool {
    matches!(
        key,
        "parameter_headers" | "tool_type" | "instance_name" | "tool_options"
    )
}

/// Read every provider listed under `key` in a parameter-headers document
///
/// Every header must be valid.
pub fn read_provider_entries(doc: &Value, key: &str) -> Result<Vec<ProviderEntry>, SystToolsError> {
    let root = as_table(doc, "parameter-headers document")?;
    get_str_list(root, key, "parameter-headers document")?
        .iter()
        .map(|pkey| {
            let table = as_table(
                get_value(root, pkey, "parameter-headers document")?,
                &format!("provider \"{}\"", pkey),
            )?;
            ProviderEntry::from_table(pkey, table)
        })
        .collect()
}

/// Every header in a parameter-headers document, keyed by id
///
/// Ids must be unique across all providers.
pub fn build_parameter_headers(doc: &Value, key: &str) -> Result<HeaderMap, SystToolsError> {
    let mut headers = HeaderMap::new();
    for entry in read_provider_entries(doc, key)? {
        let provider_name = entry.fully_qualified_name();
        for header in entry.headers {
            let Some(id) = header.syst_param_id else {
                continue;
            };
            if headers.contains_key(&id) {
                return Err(SystToolsError::ParamIdCollision(id));
            }
            tracing::trace!("Read header {} from provider {}", header.label(), provider_name);
            headers.insert(
                id,
                ProviderHeader {
                    provider_name: provider_name.clone(),
                    header,
                },
            );
        }
    }
    tracing::debug!("Read {} parameter headers", headers.len());
    Ok(headers)
}

/// Write a parameter-headers document listing `entries` under
/// [DEFAULT_PROVIDER_LIST_KEY]
///
/// Each provider is stored under its fully-qualified name, each header under
/// its pretty name.
pub fn parameter_headers_document(entries: &[ProviderEntry]) -> Result<Value, SystToolsError> {
    let mut doc = Map::new();
    let mut seen = BTreeSet::new();
    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.fully_qualified_name();
        if name == DEFAULT_PROVIDER_LIST_KEY || !seen.insert(name.clone()) {
            return Err(SystToolsError::ProviderNameCollision(name));
        }
        doc.insert(name.clone(), Value::Object(entry.to_table()?));
        keys.push(Value::from(name));
    }
    doc.insert(DEFAULT_PROVIDER_LIST_KEY.to_string(), Value::Array(keys));
    Ok(Value::Object(doc))
}
