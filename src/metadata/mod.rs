//! Ordered collections of [ParamHeader]s
//!
//! A [MetaDataSet] describes every parameter known to one or more providers.
//! Fragments built by individual providers are merged with
//! [MetaDataSet::extend] into the global parameter namespace.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::SystToolsError;
use crate::header::{ParamHeader, ParamId};

#[derive(Debug, Clone, Copy)]
enum ParamKey<'a> {
    Id(ParamId),
    Name(&'a str),
}

/// An ordered set of parameter headers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaDataSet {
    headers: Vec<ParamHeader>,
}

impl MetaDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn headers(&self) -> &[ParamHeader] {
        &self.headers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamHeader> {
        self.headers.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ParamHeader> {
        self.headers.iter_mut()
    }

    /// Append a header without any checks, see [Self::validate]
    pub fn push(&mut self, header: ParamHeader) {
        self.headers.push(header);
    }

    /// Ids of every header, in set order
    pub fn ids(&self) -> Vec<ParamId> {
        self.headers.iter().filter_map(|h| h.syst_param_id).collect()
    }

    pub fn into_inner(self) -> Vec<ParamHeader> {
        self.headers
    }

    fn index_of(&self, key: ParamKey<'_>) -> Option<usize> {
        match key {
            ParamKey::Id(id) => self
                .headers
                .iter()
                .position(|h| h.syst_param_id == Some(id)),
            ParamKey::Name(name) => self.headers.iter().position(|h| h.pretty_name == name),
        }
    }

    fn lookup(&self, key: ParamKey<'_>) -> Result<&ParamHeader, SystToolsError> {
        match self.index_of(key) {
            Some(idx) => Ok(&self.headers[idx]),
            None => Err(match key {
                ParamKey::Id(id) => SystToolsError::ParameterIdNotHandled(id),
                ParamKey::Name(name) => SystToolsError::ParameterNameNotHandled(name.to_string()),
            }),
        }
    }

    pub fn param_index(&self, id: ParamId) -> Option<usize> {
        self.index_of(ParamKey::Id(id))
    }

    /// Index of the first header named `name`
    pub fn param_index_by_name(&self, name: &str) -> Option<usize> {
        self.index_of(ParamKey::Name(name))
    }

    pub fn has_param(&self, id: ParamId) -> bool {
        self.param_index(id).is_some()
    }

    pub fn has_param_named(&self, name: &str) -> bool {
        self.param_index_by_name(name).is_some()
    }

    /// Whether any of `ids` is present in the set
    pub fn has_any_params(&self, ids: &[ParamId]) -> bool {
        ids.iter().any(|id| self.has_param(*id))
    }

    /// The id of the first header named `name`
    pub fn param_id(&self, name: &str) -> Option<ParamId> {
        self.param_index_by_name(name)
            .and_then(|idx| self.headers[idx].syst_param_id)
    }

    pub fn get_param(&self, id: ParamId) -> Result<&ParamHeader, SystToolsError> {
        self.lookup(ParamKey::Id(id))
    }

    pub fn get_param_by_name(&self, name: &str) -> Result<&ParamHeader, SystToolsError> {
        self.lookup(ParamKey::Name(name))
    }

    pub fn get_param_mut(&mut self, id: ParamId) -> Result<&mut ParamHeader, SystToolsError> {
        match self.param_index(id) {
            Some(idx) => Ok(&mut self.headers[idx]),
            None => Err(SystToolsError::ParameterIdNotHandled(id)),
        }
    }

    pub fn get_param_by_name_mut(&mut self, name: &str) -> Result<&mut ParamHeader, SystToolsError> {
        match self.param_index_by_name(name) {
            Some(idx) => Ok(&mut self.headers[idx]),
            None => Err(SystToolsError::ParameterNameNotHandled(name.to_string())),
        }
    }

    /// Whether the parameter carries the option flag `opt`
    ///
    /// Unknown parameters carry no options.
    pub fn syst_has_opt(&self, id: ParamId, opt: &str) -> bool {
        self.get_param(id).map(|h| h.has_opt(opt)).unwrap_or(false)
    }

    pub fn syst_has_opt_by_name(&self, name: &str, opt: &str) -> bool {
        self.get_param_by_name(name)
            .map(|h| h.has_opt(opt))
            .unwrap_or(false)
    }

    /// Whether the parameter carries a `key=value` option for `key`
    pub fn syst_has_opt_kv(&self, id: ParamId, key: &str) -> bool {
        self.get_param(id).map(|h| h.has_opt_kv(key)).unwrap_or(false)
    }

    pub fn syst_has_opt_kv_by_name(&self, name: &str, key: &str) -> bool {
        self.get_param_by_name(name)
            .map(|h| h.has_opt_kv(key))
            .unwrap_or(false)
    }

    fn get_opt_kv(&self, param: ParamKey<'_>, key: &str) -> Result<String, SystToolsError> {
        let hdr = self.lookup(param)?;
        hdr.opt_kv(key)
            .map(str::to_string)
            .ok_or_else(|| SystToolsError::NoSuchOptKV {
                param: hdr.pretty_name.clone(),
                key: key.to_string(),
            })
    }

    /// The value of the parameter's first `key=value` option
    pub fn syst_get_opt_kv(&self, id: ParamId, key: &str) -> Result<String, SystToolsError> {
        self.get_opt_kv(ParamKey::Id(id), key)
    }

    pub fn syst_get_opt_kv_by_name(&self, name: &str, key: &str) -> Result<String, SystToolsError> {
        self.get_opt_kv(ParamKey::Name(name), key)
    }

    /// Checks that every header is valid, ids are unique and that responseless
    /// parameters reference a response parameter in this set with the same
    /// number of variations
    ///
    /// When `quiet` is false, every failure is logged.
    pub fn validate(&self, quiet: bool) -> bool {
        let mut valid = true;
        let mut seen = HashSet::new();
        let mut dependents: BTreeMap<ParamId, Vec<&ParamHeader>> = BTreeMap::new();

        for hdr in &self.headers {
            if !hdr.validate(quiet) {
                valid = false;
            }
            if let Some(id) = hdr.syst_param_id {
                if !seen.insert(id) {
                    if !quiet {
                        tracing::error!("Parameter id {} is used by more than one header", id);
                    }
                    valid = false;
                }
            }
            if hdr.is_responseless_param {
                if let Some(response_id) = hdr.response_param_id {
                    dependents.entry(response_id).or_default().push(hdr);
                }
            }
        }

        for (response_id, group) in dependents {
            let response_hdr = match self.get_param(response_id) {
                Ok(h) => h,
                Err(_) => {
                    if !quiet {
                        tracing::error!(
                            "Parameter {} expresses its response through parameter {}, which is not in this set",
                            group[0].label(),
                            response_id
                        );
                    }
                    valid = false;
                    continue;
                }
            };
            for dependent in group {
                if dependent.n_variations() != response_hdr.n_variations() {
                    if !quiet {
                        tracing::error!(
                            "Responseless parameter {} has {} variations, but its response parameter {} has {}",
                            dependent.label(),
                            dependent.n_variations(),
                            response_hdr.label(),
                            response_hdr.n_variations()
                        );
                    }
                    valid = false;
                }
            }
        }
        valid
    }

    /// Append every header of `other`
    ///
    /// Both sets must be valid and their ids disjoint.
    pub fn extend(&mut self, other: &MetaDataSet) -> Result<(), SystToolsError> {
        let lhs_valid = self.validate(false);
        let rhs_valid = other.validate(false);
        if !(lhs_valid && rhs_valid) {
            return Err(SystToolsError::InvalidMetaData {
                lhs_valid,
                rhs_valid,
            });
        }
        for id in other.ids() {
            if self.has_param(id) {
                return Err(SystToolsError::ParamIdCollision(id));
            }
        }
        tracing::debug!(
            "Extending parameter set of {} headers with {} more",
            self.len(),
            other.len()
        );
        self.headers.extend(other.headers.iter().cloned());
        Ok(())
    }

    /// Finalize a responseless parameter group
    ///
    /// Checks that every present dependent has the same number of variations
    /// and replaces the response parameter's variations with the index
    /// sequence `0..n`. Does nothing if `response_name` is not in the set.
    pub fn finalize_and_validate_dependent_parameters<S: AsRef<str>>(
        &mut self,
        response_name: &str,
        dependents: &[S],
    ) -> Result<(), SystToolsError> {
        if !self.has_param_named(response_name) {
            return Ok(());
        }
        let mut n_variations: Option<(usize, &str)> = None;
        for name in dependents {
            let name = name.as_ref();
            let hdr = match self.get_param_by_name(name) {
                Ok(h) => h,
                Err(_) => continue,
            };
            match n_variations {
                None => n_variations = Some((hdr.n_variations(), name)),
                Some((n, first)) if n != hdr.n_variations() => {
                    return Err(SystToolsError::config(format!(
                        "Dependent parameters of \"{}\" disagree on the number of variations: \"{}\" has {}, \"{}\" has {}",
                        response_name,
                        first,
                        n,
                        name,
                        hdr.n_variations()
                    )));
                }
                Some(_) => {}
            }
        }
        let n = n_variations.map(|(n, _)| n).unwrap_or(0);
        let response_hdr = self.get_param_by_name_mut(response_name)?;
        response_hdr.param_variations = (0..n).map(|i| i as f64).collect();
        Ok(())
    }
}

impl From<Vec<ParamHeader>> for MetaDataSet {
    fn from(headers: Vec<ParamHeader>) -> Self {
        Self { headers }
    }
}

impl FromIterator<ParamHeader> for MetaDataSet {
    fn from_iter<I: IntoIterator<Item = ParamHeader>>(iter: I) -> Self {
        Self {
            headers: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MetaDataSet {
    type Item = ParamHeader;
    type IntoIter = std::vec::IntoIter<ParamHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.into_iter()
    }
}

impl<'a> IntoIterator for &'a MetaDataSet {
    type Item = &'a ParamHeader;
    type IntoIter = std::slice::Iter<'a, ParamHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl fmt::Display for MetaDataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MetaDataSet with {} parameters:", self.len())?;
        for hdr in &self.headers {
            writeln!(f, "{}", hdr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, id: ParamId, n: usize) -> ParamHeader {
        ParamHeader {
            param_variations: (0..n).map(|i| i as f64).collect(),
            ..ParamHeader::new(name, id)
        }
    }

    #[test]
    fn test_lookups() {
        let md: MetaDataSet = vec![header("a", 3, 2), header("b", 7, 2)].into();
        assert_eq!(md.param_index(7), Some(1));
        assert_eq!(md.param_index_by_name("a"), Some(0));
        assert_eq!(md.param_id("b"), Some(7));
        assert_eq!(md.param_id("c"), None);
        assert!(md.has_any_params(&[1, 7]));
        assert!(!md.has_any_params(&[1, 2]));
        assert!(matches!(
            md.get_param(4),
            Err(SystToolsError::ParameterIdNotHandled(4))
        ));
        assert!(matches!(
            md.get_param_by_name("c"),
            Err(SystToolsError::ParameterNameNotHandled(_))
        ));
    }

    #[test]
    fn test_duplicate_names_first_match() {
        let md: MetaDataSet = vec![header("a", 0, 1), header("a", 1, 2)].into();
        assert_eq!(md.param_id("a"), Some(0));
        assert!(md.validate(true));
    }

    #[test]
    fn test_opts() {
        let mut md: MetaDataSet = vec![header("a", 0, 2)].into();
        md.get_param_mut(0).unwrap().opts = vec!["flag".into(), "mode=x".into()];

        assert!(md.syst_has_opt(0, "flag"));
        assert!(md.syst_has_opt_by_name("a", "flag"));
        assert!(!md.syst_has_opt(9, "flag"));
        assert!(md.syst_has_opt_kv(0, "mode"));
        assert_eq!(md.syst_get_opt_kv(0, "mode").unwrap(), "x");
        assert!(matches!(
            md.syst_get_opt_kv(0, "other"),
            Err(SystToolsError::NoSuchOptKV { .. })
        ));
        assert!(matches!(
            md.syst_get_opt_kv(9, "mode"),
            Err(SystToolsError::ParameterIdNotHandled(9))
        ));
    }

    #[test]
    fn test_duplicate_ids_invalid() {
        let md: MetaDataSet = vec![header("a", 0, 1), header("b", 0, 1)].into();
        assert!(!md.validate(true));
    }

    #[test]
    fn test_responseless_group() {
        let dep = ParamHeader {
            is_responseless_param: true,
            response_param_id: Some(10),
            ..header("dep", 1, 3)
        };
        let mut md: MetaDataSet = vec![dep.clone()].into();
        assert!(!md.validate(true));

        md.push(header("resp", 10, 3));
        assert!(md.validate(true));

        md.get_param_mut(10).unwrap().param_variations.pop();
        assert!(!md.validate(true));
    }

    #[test]
    fn test_finalize_dependent_parameters() {
        let mut md: MetaDataSet =
            vec![header("d1", 0, 4), header("d2", 1, 4), header("resp", 2, 1)].into();
        md.finalize_and_validate_dependent_parameters("resp", &["d1", "d2", "absent"])
            .unwrap();
        assert_eq!(
            md.get_param_by_name("resp").unwrap().param_variations,
            vec![0.0, 1.0, 2.0, 3.0]
        );

        md.get_param_by_name_mut("d2").unwrap().param_variations.push(9.0);
        assert!(matches!(
            md.finalize_and_validate_dependent_parameters("resp", &["d1", "d2"]),
            Err(SystToolsError::InvalidConfiguration(_))
        ));

        // Missing response parameter is not an error
        md.finalize_and_validate_dependent_parameters("nope", &["d1", "d2"])
            .unwrap();
    }
}
