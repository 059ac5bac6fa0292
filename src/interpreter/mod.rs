//! Interpretation of parameter responses
//!
//! A [ResponseInterpreter] combines the parameter headers of every configured
//! provider with the responses calculated for one event. It answers semantic
//! queries about parameters and evaluates their responses, either by
//! interpolating spline-type parameters or by indexing discrete (multisim)
//! variations.
//!
//! Every query is governed by a [ValidationPolicy]: the [CareLevel] decides
//! what is checked, the [PedantLevel] whether a failed check is an error and
//! the [ErrorResponseLevel] which value replaces a bad one.

pub mod policy;
pub mod poly;
pub mod precalculated;
pub mod spline;
pub mod spline_cache;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::SystToolsError;
use crate::header::{ParamHeader, ParamId};
use crate::metadata::MetaDataSet;
use crate::response::{
    get_param_element, EventResponse, EventUnitResponse, ParamValue, ParamValueList,
};

pub use policy::{CareLevel, ErrorResponseLevel, PedantLevel, ValidationPolicy, Violation};
pub use poly::PolyResponse;
pub use spline::Spline;
pub use spline_cache::{CachedEventId, EventSplineCache};

lazy_static! {
    static ref NULL_HEADER: ParamHeader = ParamHeader::default();
}

/// A header and the name of the provider that declared it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHeader {
    pub provider_name: String,
    pub header: ParamHeader,
}

/// Every configured header, keyed by parameter id
pub type HeaderMap = BTreeMap<ParamId, ProviderHeader>;

/// Answers response queries for a fixed set of parameter headers
#[derive(Debug, Clone, Default)]
pub struct ResponseInterpreter {
    headers: HeaderMap,
    policy: ValidationPolicy,
}

/// The response values to interpolate for `hdr`
#[inline]
fn response_values<'a>(hdr: &'a ParamHeader, responses: &'a [f64]) -> &'a [f64] {
    if hdr.differs_event_by_event {
        responses
    } else {
        &hdr.responses
    }
}

impl ResponseInterpreter {
    pub fn new(headers: HeaderMap, policy: ValidationPolicy) -> Self {
        Self { headers, policy }
    }

    /// Interpreter over the headers of `md`
    ///
    /// Headers without an id cannot be addressed and are skipped.
    pub fn from_metadata(md: &MetaDataSet, policy: ValidationPolicy) -> Self {
        let headers = md
            .iter()
            .filter_map(|hdr| {
                hdr.syst_param_id.map(|id| {
                    (
                        id,
                        ProviderHeader {
                            provider_name: String::new(),
                            header: hdr.clone(),
                        },
                    )
                })
            })
            .collect();
        Self { headers, policy }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ValidationPolicy) {
        self.policy = policy;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    // ========================================================================
    // Header lookup
    // ========================================================================

    pub fn have_header(&self, id: ParamId) -> bool {
        self.headers.contains_key(&id)
    }

    pub fn have_header_named(&self, name: &str) -> bool {
        self.header_id(name).is_some()
    }

    /// The id of the first header, in id order, named `name`
    pub fn header_id(&self, name: &str) -> Option<ParamId> {
        self.headers
            .iter()
            .find(|(_, ph)| ph.header.pretty_name == name)
            .map(|(id, _)| *id)
    }

    /// Every configured parameter id, in ascending order
    pub fn parameters(&self) -> Vec<ParamId> {
        self.headers.keys().copied().collect()
    }

    /// Name of the provider that declared parameter `id`
    pub fn provider_name(&self, id: ParamId) -> Option<&str> {
        self.headers.get(&id).map(|ph| ph.provider_name.as_str())
    }

    /// The header of parameter `id`
    ///
    /// Unless the policy is [CareLevel::Hare], an unknown id is a violation.
    /// Whenever no error is raised, an unknown id yields a default header.
    pub fn get_header(&self, id: ParamId) -> Result<&ParamHeader, SystToolsError> {
        match self.headers.get(&id) {
            Some(ph) => Ok(&ph.header),
            None if self.policy.checks() => {
                self.policy.react(Violation::UnknownParameter(id), &*NULL_HEADER)
            }
            None => Ok(&*NULL_HEADER),
        }
    }

    pub fn get_header_by_name(&self, name: &str) -> Result<&ParamHeader, SystToolsError> {
        match self.header_id(name) {
            Some(id) => self.get_header(id),
            None if self.policy.checks() => self
                .policy
                .react(Violation::UnknownParameterName(name.to_string()), &*NULL_HEADER),
            None => Ok(&*NULL_HEADER),
        }
    }

    // ========================================================================
    // Header projections
    // ========================================================================

    pub fn is_thrown_param(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.get_header(id)?.is_randomly_thrown)
    }

    pub fn is_responseless_param(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.get_header(id)?.is_responseless_param)
    }

    pub fn is_spline_param(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.get_header(id)?.is_splineable)
    }

    pub fn values_are_in_natural_units(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.get_header(id)?.units_are_natural)
    }

    pub fn is_weight_response(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.get_header(id)?.is_weight_systematic_variation)
    }

    /// The parameter through which a responseless parameter's responses are
    /// recorded
    pub fn response_param_id(&self, id: ParamId) -> Result<Option<ParamId>, SystToolsError> {
        let hdr = self.get_header(id)?;
        if self.policy.checks() && !hdr.is_responseless_param {
            return self.policy.react(Violation::NotResponseless(id), None);
        }
        Ok(hdr.response_param_id)
    }

    pub fn has_parameter_limits(&self, id: ParamId) -> Result<bool, SystToolsError> {
        Ok(self.has_parameter_low_limit(id)? || self.has_parameter_up_limit(id)?)
    }

    pub fn has_parameter_low_limit(&self, id: ParamId) -> Result<bool, SystToolsError> {
        let hdr = self.get_header(id)?;
        if self.policy.checks() && !hdr.is_splineable {
            return self.policy.react(Violation::NotSplineable(id), false);
        }
        Ok(hdr.param_validity_range[0].is_some())
    }

    pub fn has_parameter_up_limit(&self, id: ParamId) -> Result<bool, SystToolsError> {
        let hdr = self.get_header(id)?;
        if self.policy.checks() && !hdr.is_splineable {
            return self.policy.react(Violation::NotSplineable(id), false);
        }
        Ok(hdr.param_validity_range[1].is_some())
    }

    /// Lower bound of the parameter's validity range, `-inf` when unbounded
    pub fn parameter_low_limit(&self, id: ParamId) -> Result<f64, SystToolsError> {
        let hdr = self.get_header(id)?;
        if self.policy.checks() && !self.has_parameter_low_limit(id)? {
            return self
                .policy
                .react(Violation::NoLowLimit(id), f64::NEG_INFINITY);
        }
        Ok(hdr.param_validity_range[0].unwrap_or(f64::NEG_INFINITY))
    }

    /// Upper bound of the parameter's validity range, `+inf` when unbounded
    pub fn parameter_up_limit(&self, id: ParamId) -> Result<f64, SystToolsError> {
        let hdr = self.get_header(id)?;
        if self.policy.checks() && !self.has_parameter_up_limit(id)? {
            return self.policy.react(Violation::NoUpLimit(id), f64::INFINITY);
        }
        Ok(hdr.param_validity_range[1].unwrap_or(f64::INFINITY))
    }

    // ========================================================================
    // Shared checks
    // ========================================================================

    fn fallback_for(&self, hdr: &ParamHeader) -> f64 {
        self.policy
            .fallback_response(hdr.is_weight_systematic_variation)
    }

    /// The responses of `id` recorded in `unit`
    ///
    /// Event independent parameters need no entry. Returns `None` if the
    /// entry is missing and the policy does not error.
    fn unit_responses<'u>(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        unit: &'u EventUnitResponse,
    ) -> Result<Option<&'u [f64]>, SystToolsError> {
        if let Some(resp) = get_param_element(unit, id) {
            return Ok(Some(&resp.responses));
        }
        if !hdr.differs_event_by_event {
            let none: &[f64] = &[];
            return Ok(Some(none));
        }
        if self.policy.checks() {
            self.policy.react(Violation::MissingEventResponse(id), ())?;
        }
        Ok(None)
    }

    /// Response values for `hdr`, checked and truncated to the number of
    /// variations under [CareLevel::Tortoise]
    fn checked_responses(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        responses: &[f64],
    ) -> Result<Vec<f64>, SystToolsError> {
        let values = response_values(hdr, responses);
        if !self.policy.thorough() {
            return Ok(values.to_vec());
        }
        let mut n = values.len();
        if n != hdr.n_variations() {
            let violation = Violation::ResponseCountMismatch {
                pid: id,
                responses: n,
                variations: hdr.n_variations(),
            };
            self.policy.react(violation, ())?;
            n = n.min(hdr.n_variations());
        }
        values[..n]
            .iter()
            .enumerate()
            .map(|(i, r)| self.policy.check_response(*r, hdr, Some(i)))
            .collect()
    }

    /// Whether `id` may contribute to a combined query
    fn usable(
        &self,
        id: ParamId,
        expect_spline: bool,
        require_weight: bool,
    ) -> Result<bool, SystToolsError> {
        let hdr = match self.headers.get(&id) {
            Some(ph) => &ph.header,
            None => return self.policy.react(Violation::UnknownParameter(id), false),
        };
        if self.policy.thorough() && require_weight && !hdr.is_weight_systematic_variation {
            let violation = Violation::NotWeight {
                pid: id,
                name: hdr.pretty_name.clone(),
            };
            return self.policy.react(violation, false);
        }
        if expect_spline && !hdr.is_splineable {
            return self.policy.react(Violation::NotSplineable(id), false);
        }
        if hdr.is_responseless_param {
            let violation = Violation::Responseless {
                pid: id,
                name: hdr.pretty_name.clone(),
                response_param: hdr.response_param_id,
            };
            return self.policy.react(violation, false);
        }
        Ok(true)
    }

    /// Drop parameters that cannot contribute to a combined query
    ///
    /// Unknown, responseless and (if `expect_spline`) non-splineable
    /// parameters are dropped; under [CareLevel::Tortoise] so are non-weight
    /// parameters when `require_weight`.
    pub fn check_param_list(
        &self,
        ids: &[ParamId],
        expect_spline: bool,
        require_weight: bool,
    ) -> Result<Vec<ParamId>, SystToolsError> {
        let mut checked = Vec::with_capacity(ids.len());
        for id in ids {
            if self.usable(*id, expect_spline, require_weight)? {
                checked.push(*id);
            }
        }
        Ok(checked)
    }

    /// Drop parameter values that cannot contribute to a total response
    pub fn check_param_value_list(
        &self,
        values: &[ParamValue],
    ) -> Result<ParamValueList, SystToolsError> {
        let mut checked = Vec::with_capacity(values.len());
        for pv in values {
            if self.usable(pv.pid, true, true)? {
                checked.push(*pv);
            }
        }
        Ok(checked)
    }

    // ========================================================================
    // Splines
    // ========================================================================

    fn spline_from_header(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        responses: &[f64],
    ) -> Result<Spline, SystToolsError> {
        if self.policy.checks() && !hdr.is_splineable {
            return self
                .policy
                .react(Violation::NotSplineable(id), Spline::flat(self.fallback_for(hdr)));
        }
        let values = self.interpolation_values(id, hdr, responses)?;
        match Spline::new(&hdr.param_variations[..values.len()], &values) {
            Ok(spline) => Ok(spline),
            Err(e) => {
                let violation = Violation::BadResponses {
                    pid: id,
                    reason: e.to_string(),
                };
                self.policy
                    .react(violation, Spline::flat(self.fallback_for(hdr)))
            }
        }
    }

    /// Checked responses paired one to one with the leading variations
    ///
    /// Responses beyond the last variation are ignored.
    fn interpolation_values(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        responses: &[f64],
    ) -> Result<Vec<f64>, SystToolsError> {
        let mut values = self.checked_responses(id, hdr, responses)?;
        values.truncate(hdr.n_variations());
        Ok(values)
    }

    /// Interpolate parameter `id` through `responses`
    ///
    /// Parameters that do not differ event by event use their header-level
    /// responses and ignore `responses`.
    pub fn get_spline(&self, id: ParamId, responses: &[f64]) -> Result<Spline, SystToolsError> {
        let hdr = self.get_header(id)?;
        self.spline_from_header(id, hdr, responses)
    }

    pub fn get_spline_for_unit(
        &self,
        id: ParamId,
        unit: &EventUnitResponse,
    ) -> Result<Spline, SystToolsError> {
        let hdr = self.get_header(id)?;
        match self.unit_responses(id, hdr, unit)? {
            Some(responses) => self.spline_from_header(id, hdr, responses),
            None => Ok(Spline::flat(self.fallback_for(hdr))),
        }
    }

    /// One spline of parameter `id` per event unit
    pub fn get_splines(&self, id: ParamId, er: &EventResponse) -> Result<Vec<Spline>, SystToolsError> {
        er.iter()
            .map(|unit| self.get_spline_for_unit(id, unit))
            .collect()
    }

    pub fn get_splines_for_params(
        &self,
        ids: &[ParamId],
        unit: &EventUnitResponse,
    ) -> Result<BTreeMap<ParamId, Spline>, SystToolsError> {
        let ids = if self.policy.checks() {
            self.check_param_list(ids, true, false)?
        } else {
            ids.to_vec()
        };
        self.splines_for_checked(&ids, unit)
    }

    fn splines_for_checked(
        &self,
        ids: &[ParamId],
        unit: &EventUnitResponse,
    ) -> Result<BTreeMap<ParamId, Spline>, SystToolsError> {
        ids.iter()
            .map(|id| Ok((*id, self.get_spline_for_unit(*id, unit)?)))
            .collect()
    }

    pub fn get_splines_for_event(
        &self,
        ids: &[ParamId],
        er: &EventResponse,
    ) -> Result<Vec<BTreeMap<ParamId, Spline>>, SystToolsError> {
        let ids = if self.policy.checks() {
            self.check_param_list(ids, true, false)?
        } else {
            ids.to_vec()
        };
        er.iter()
            .map(|unit| self.splines_for_checked(&ids, unit))
            .collect()
    }

    /// Least-squares polynomial through the same knots as [Self::get_spline_for_unit]
    pub fn get_poly_response(
        &self,
        id: ParamId,
        order: usize,
        unit: &EventUnitResponse,
    ) -> Result<PolyResponse, SystToolsError> {
        let hdr = self.get_header(id)?;
        let flat = PolyResponse::new(vec![self.fallback_for(hdr)]);
        if self.policy.checks() && !hdr.is_splineable {
            return self.policy.react(Violation::NotSplineable(id), flat);
        }
        let responses = match self.unit_responses(id, hdr, unit)? {
            Some(responses) => responses,
            None => return Ok(flat),
        };
        let values = self.interpolation_values(id, hdr, responses)?;
        match PolyResponse::fit(&hdr.param_variations[..values.len()], &values, order) {
            Ok(poly) => Ok(poly),
            Err(e) => {
                let violation = Violation::BadResponses {
                    pid: id,
                    reason: e.to_string(),
                };
                self.policy.react(violation, flat)
            }
        }
    }

    // ========================================================================
    // Parameter responses
    // ========================================================================

    /// Response of parameter `id` at `value`
    ///
    /// Builds a spline for a single evaluation, prefer [Self::get_spline] when
    /// evaluating the same responses repeatedly. Under [CareLevel::Tortoise],
    /// values outside the validity range are violations and are clamped.
    pub fn get_parameter_response(
        &self,
        id: ParamId,
        value: f64,
        responses: &[f64],
    ) -> Result<f64, SystToolsError> {
        if self.policy.care == CareLevel::Hare {
            tracing::trace!(
                "Building a single-use spline for parameter {}, cache splines to evaluate repeatedly",
                id
            );
        }
        if self.policy.checks() && !self.have_header(id) {
            return self.policy.react(
                Violation::UnknownParameter(id),
                self.policy.fallback_response(true),
            );
        }
        let hdr = self.get_header(id)?;
        let v = self.clamp_to_validity_range(id, hdr, value)?;
        Ok(self.spline_from_header(id, hdr, responses)?.eval(v))
    }

    /// Under [CareLevel::Tortoise], clamp `value` into the validity range of
    /// `id`, reacting to values outside it
    pub(crate) fn clamp_to_validity_range(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        value: f64,
    ) -> Result<f64, SystToolsError> {
        let mut v = value;
        if self.policy.thorough() {
            if self.has_parameter_low_limit(id)? {
                let bound = self.parameter_low_limit(id)?;
                if v < bound {
                    let violation = Violation::BelowLowerBound {
                        name: hdr.pretty_name.clone(),
                        value: v,
                        bound,
                    };
                    v = self.policy.react(violation, bound)?;
                }
            }
            if self.has_parameter_up_limit(id)? {
                let bound = self.parameter_up_limit(id)?;
                if v > bound {
                    let violation = Violation::AboveUpperBound {
                        name: hdr.pretty_name.clone(),
                        value: v,
                        bound,
                    };
                    v = self.policy.react(violation, bound)?;
                }
            }
        }
        Ok(v)
    }

    pub fn get_parameter_response_for_unit(
        &self,
        id: ParamId,
        value: f64,
        unit: &EventUnitResponse,
    ) -> Result<f64, SystToolsError> {
        let hdr = self.get_header(id)?;
        match self.unit_responses(id, hdr, unit)? {
            Some(responses) => self.get_parameter_response(id, value, responses),
            None => Ok(self.fallback_for(hdr)),
        }
    }

    /// Response of parameter `id` at `value` for every event unit
    pub fn get_parameter_responses(
        &self,
        id: ParamId,
        value: f64,
        er: &EventResponse,
    ) -> Result<Vec<f64>, SystToolsError> {
        er.iter()
            .map(|unit| self.get_parameter_response_for_unit(id, value, unit))
            .collect()
    }

    /// Product of the responses of every parameter in `values`
    ///
    /// Parameters that cannot contribute are dropped first, see
    /// [Self::check_param_value_list].
    pub fn get_total_response(
        &self,
        values: &[ParamValue],
        unit: &EventUnitResponse,
    ) -> Result<f64, SystToolsError> {
        let values = if self.policy.checks() {
            self.check_param_value_list(values)?
        } else {
            values.to_vec()
        };
        values.iter().try_fold(1.0, |weight, pv| {
            Ok(weight * self.get_parameter_response_for_unit(pv.pid, pv.val, unit)?)
        })
    }

    pub fn get_total_responses(
        &self,
        values: &[ParamValue],
        er: &EventResponse,
    ) -> Result<Vec<f64>, SystToolsError> {
        er.iter()
            .map(|unit| self.get_total_response(values, unit))
            .collect()
    }

    // ========================================================================
    // Discrete variations
    // ========================================================================

    pub fn n_discrete_variations(&self, id: ParamId) -> Result<usize, SystToolsError> {
        Ok(self.get_header(id)?.n_variations())
    }

    pub fn n_discrete_variations_for(&self, ids: &[ParamId]) -> Result<Vec<usize>, SystToolsError> {
        ids.iter().map(|id| self.n_discrete_variations(*id)).collect()
    }

    fn discrete_from_header(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        responses: &[f64],
    ) -> Result<Vec<f64>, SystToolsError> {
        if self.policy.checks() && hdr.is_responseless_param {
            let violation = Violation::Responseless {
                pid: id,
                name: hdr.pretty_name.clone(),
                response_param: hdr.response_param_id,
            };
            return self.policy.react(violation, Vec::new());
        }
        self.checked_responses(id, hdr, responses)
    }

    /// Every discrete response of parameter `id`
    pub fn get_discrete_responses(
        &self,
        id: ParamId,
        responses: &[f64],
    ) -> Result<Vec<f64>, SystToolsError> {
        let hdr = self.get_header(id)?;
        self.discrete_from_header(id, hdr, responses)
    }

    pub fn get_discrete_responses_for_unit(
        &self,
        id: ParamId,
        unit: &EventUnitResponse,
    ) -> Result<Vec<f64>, SystToolsError> {
        let hdr = self.get_header(id)?;
        match self.unit_responses(id, hdr, unit)? {
            Some(responses) => self.discrete_from_header(id, hdr, responses),
            None => Ok(Vec::new()),
        }
    }

    fn discrete_at(
        &self,
        id: ParamId,
        hdr: &ParamHeader,
        index: usize,
        values: &[f64],
    ) -> Result<f64, SystToolsError> {
        match values.get(index) {
            Some(v) => Ok(*v),
            None => {
                let violation = Violation::VariationOutOfRange {
                    pid: id,
                    index,
                    variations: values.len(),
                };
                self.policy.react(violation, self.fallback_for(hdr))
            }
        }
    }

    /// The response of variation `index` of parameter `id`
    pub fn get_discrete_response(
        &self,
        id: ParamId,
        index: usize,
        responses: &[f64],
    ) -> Result<f64, SystToolsError> {
        if self.policy.care == CareLevel::Hare {
            tracing::trace!(
                "Single discrete response requested for parameter {}, prefer get_discrete_responses",
                id
            );
        }
        let hdr = self.get_header(id)?;
        let values = self.discrete_from_header(id, hdr, responses)?;
        self.discrete_at(id, hdr, index, &values)
    }

    pub fn get_discrete_response_for_unit(
        &self,
        id: ParamId,
        index: usize,
        unit: &EventUnitResponse,
    ) -> Result<f64, SystToolsError> {
        let hdr = self.get_header(id)?;
        match self.unit_responses(id, hdr, unit)? {
            Some(responses) => {
                let values = self.discrete_from_header(id, hdr, responses)?;
                self.discrete_at(id, hdr, index, &values)
            }
            None => Ok(self.fallback_for(hdr)),
        }
    }

    fn checked_discrete_list(&self, ids: &[ParamId]) -> Result<Vec<ParamId>, SystToolsError> {
        if self.policy.checks() {
            self.check_param_list(ids, false, true)
        } else {
            Ok(ids.to_vec())
        }
    }

    /// Product over `ids` of the responses of variation `index`
    pub fn get_combined_discrete_response(
        &self,
        ids: &[ParamId],
        index: usize,
        unit: &EventUnitResponse,
    ) -> Result<f64, SystToolsError> {
        let ids = self.checked_discrete_list(ids)?;
        self.combined_discrete_for_checked(&ids, index, unit)
    }

    fn combined_discrete_for_checked(
        &self,
        ids: &[ParamId],
        index: usize,
        unit: &EventUnitResponse,
    ) -> Result<f64, SystToolsError> {
        ids.iter().try_fold(1.0, |weight, id| {
            Ok(weight * self.get_discrete_response_for_unit(*id, index, unit)?)
        })
    }

    /// The response of variation `index` of parameter `id` for every event unit
    pub fn get_discrete_responses_at(
        &self,
        id: ParamId,
        index: usize,
        er: &EventResponse,
    ) -> Result<Vec<f64>, SystToolsError> {
        er.iter()
            .map(|unit| self.get_discrete_response_for_unit(id, index, unit))
            .collect()
    }

    pub fn get_combined_discrete_responses_at(
        &self,
        ids: &[ParamId],
        index: usize,
        er: &EventResponse,
    ) -> Result<Vec<f64>, SystToolsError> {
        let ids = self.checked_discrete_list(ids)?;
        er.iter()
            .map(|unit| self.combined_discrete_for_checked(&ids, index, unit))
            .collect()
    }

    /// Every discrete response of parameter `id` for every event unit
    pub fn get_all_discrete_responses(
        &self,
        id: ParamId,
        er: &EventResponse,
    ) -> Result<Vec<Vec<f64>>, SystToolsError> {
        er.iter()
            .map(|unit| self.get_discrete_responses_for_unit(id, unit))
            .collect()
    }

    /// Per-unit universe weights, multiplied across `ids`
    ///
    /// The number of universes is taken from the first parameter. Missing
    /// responses leave the affected universes unchanged.
    pub fn get_all_combined_discrete_responses(
        &self,
        ids: &[ParamId],
        er: &EventResponse,
    ) -> Result<Vec<Vec<f64>>, SystToolsError> {
        let Some(first) = ids.first() else {
            return Ok(vec![Vec::new(); er.len()]);
        };
        let n = self.n_discrete_variations(*first)?;
        let ids = self.checked_discrete_list(ids)?;
        er.iter()
            .map(|unit| {
                let mut weights = vec![1.0; n];
                for id in &ids {
                    let responses = self.get_discrete_responses_for_unit(*id, unit)?;
                    for (w, r) in weights.iter_mut().zip(responses.iter()) {
                        *w *= r;
                    }
                }
                Ok(weights)
            })
            .collect()
    }

    /// The variation values of each parameter in `ids`
    pub fn discrete_variation_parameter_values(
        &self,
        ids: &[ParamId],
    ) -> Result<BTreeMap<ParamId, Vec<f64>>, SystToolsError> {
        ids.iter()
            .map(|id| Ok((*id, self.get_header(*id)?.param_variations.clone())))
            .collect()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Human readable summary of every configured header
    pub fn header_info(&self) -> String {
        let mut out = String::new();
        for (id, ph) in &self.headers {
            let _ = writeln!(
                out,
                " Parameter: {{ Id: {}, name: {}, provider: {}, NParamValues: {} }}",
                id,
                ph.header.pretty_name,
                ph.provider_name,
                ph.header.n_variations()
            );
        }
        out
    }

    /// Human readable dump of the responses in `unit`, paired with the
    /// variations they belong to
    pub fn event_response_info(&self, unit: &EventUnitResponse) -> String {
        let mut out = String::new();
        for (id, ph) in &self.headers {
            let hdr = &ph.header;
            let _ = write!(
                out,
                " Parameter: {{ Id: {}, name: {}, NParamValues: {}",
                id,
                hdr.pretty_name,
                hdr.n_variations()
            );
            let responses = match get_param_element(unit, *id) {
                Some(resp) => &resp.responses,
                None => {
                    let _ = writeln!(out, " }}");
                    continue;
                }
            };
            if hdr.is_correction {
                let cv = hdr
                    .central_param_value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let r = responses
                    .first()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "NR".to_string());
                let _ = writeln!(out, ", correction: ({} -> {}) }}", cv, r);
                continue;
            }
            let _ = writeln!(out, ", (val -> resp): [");
            for (i, v) in hdr.param_variations.iter().enumerate() {
                let r = responses
                    .get(i)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "NR".to_string());
                let _ = writeln!(out, "    ({} -> {})", v, r);
            }
            let _ = writeln!(out, "  ] }}");
        }
        out
    }
}
