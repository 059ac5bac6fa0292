//! Per-event spline caches
//!
//! Re-weighting the same events at many parameter values rebuilds the same
//! splines over and over. An [EventSplineCache] builds them once per cached
//! event, keeping weight and lateral splines apart, and tracks the current
//! value of every declared parameter so that weights can be re-evaluated
//! cheaply after each [EventSplineCache::set_parameter_value].

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SystToolsError;
use crate::header::ParamId;
use crate::interpreter::{ResponseInterpreter, Spline, Violation};
use crate::response::{EventResponse, EventUnitResponse, ParamValue};

/// Index of an event in an [EventSplineCache]
pub type CachedEventId = usize;

#[derive(Debug, Clone)]
struct CachedEvent<U> {
    unit: U,
    weight: BTreeMap<ParamId, Spline>,
    lateral: BTreeMap<ParamId, Spline>,
}

/// Splines of cached events, evaluated at the current parameter values
///
/// `U` is whatever the caller needs to keep alongside each event unit.
#[derive(Debug, Clone)]
pub struct EventSplineCache<U> {
    interpreter: ResponseInterpreter,
    values: BTreeMap<ParamId, f64>,
    weight_params: BTreeSet<ParamId>,
    lateral_params: BTreeSet<ParamId>,
    events: Vec<CachedEvent<U>>,
}

impl<U> EventSplineCache<U> {
    pub fn new(interpreter: ResponseInterpreter) -> Self {
        Self {
            interpreter,
            values: BTreeMap::new(),
            weight_params: BTreeSet::new(),
            lateral_params: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn interpreter(&self) -> &ResponseInterpreter {
        &self.interpreter
    }

    // ========================================================================
    // Caching
    // ========================================================================

    /// Build and keep the splines of every parameter responding in `response`
    pub fn cache_event(
        &mut self,
        unit: U,
        response: &EventUnitResponse,
    ) -> Result<CachedEventId, SystToolsError> {
        let ids: Vec<ParamId> = response.iter().map(|pr| pr.pid).collect();
        let mut weight = BTreeMap::new();
        let mut lateral = BTreeMap::new();
        for (id, spline) in self.interpreter.get_splines_for_params(&ids, response)? {
            if self.is_weight(id) {
                weight.insert(id, spline);
            } else {
                lateral.insert(id, spline);
            }
        }

        let eid = self.events.len();
        tracing::trace!(
            "Cached event {} with {} weight and {} lateral splines",
            eid,
            weight.len(),
            lateral.len()
        );
        self.events.push(CachedEvent {
            unit,
            weight,
            lateral,
        });
        Ok(eid)
    }

    /// Cache each unit with the matching event unit response
    ///
    /// A count mismatch is a violation; if tolerated, only the paired units
    /// are cached.
    pub fn cache_events(
        &mut self,
        units: Vec<U>,
        er: &EventResponse,
    ) -> Result<Vec<CachedEventId>, SystToolsError> {
        if units.len() != er.len() {
            let violation = Violation::CachedEventCountMismatch {
                events: units.len(),
                responses: er.len(),
            };
            self.interpreter.policy().react(violation, ())?;
        }
        units
            .into_iter()
            .zip(er)
            .map(|(unit, response)| self.cache_event(unit, response))
            .collect()
    }

    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    pub fn event_unit(&self, eid: CachedEventId) -> Option<&U> {
        self.events.get(eid).map(|ev| &ev.unit)
    }

    // ========================================================================
    // Parameter values
    // ========================================================================

    fn is_weight(&self, id: ParamId) -> bool {
        self.interpreter
            .headers()
            .get(&id)
            .map_or(true, |ph| ph.header.is_weight_systematic_variation)
    }

    fn check_known(&self, id: ParamId) -> Result<(), SystToolsError> {
        if self.interpreter.policy().checks() && !self.interpreter.have_header(id) {
            self.interpreter
                .policy()
                .react(Violation::UnknownParameter(id), ())?;
        }
        Ok(())
    }

    fn track(&mut self, id: ParamId, value: f64) {
        self.values.insert(id, value);
        if self.is_weight(id) {
            self.weight_params.insert(id);
        } else {
            self.lateral_params.insert(id);
        }
    }

    /// Start tracking parameter `id` at `value`
    ///
    /// Declaring an unknown parameter or declaring one twice is a violation.
    pub fn declare_parameter(&mut self, id: ParamId, value: f64) -> Result<(), SystToolsError> {
        self.check_known(id)?;
        if self.interpreter.policy().checks() && self.knows_parameter(id) {
            self.interpreter
                .policy()
                .react(Violation::ParameterAlreadyDeclared(id), ())?;
        }
        self.track(id, value);
        Ok(())
    }

    pub fn declare_parameters(&mut self, values: &[ParamValue]) -> Result<(), SystToolsError> {
        values
            .iter()
            .try_for_each(|pv| self.declare_parameter(pv.pid, pv.val))
    }

    /// Move parameter `id` to `value`
    ///
    /// Setting a parameter that was never declared is a violation, but
    /// declares it if tolerated.
    pub fn set_parameter_value(&mut self, id: ParamId, value: f64) -> Result<(), SystToolsError> {
        self.check_known(id)?;
        if self.interpreter.policy().checks() && !self.knows_parameter(id) {
            self.interpreter
                .policy()
                .react(Violation::ParameterNotDeclared(id), ())?;
        }
        self.track(id, value);
        Ok(())
    }

    pub fn set_parameter_values(&mut self, values: &[ParamValue]) -> Result<(), SystToolsError> {
        values
            .iter()
            .try_for_each(|pv| self.set_parameter_value(pv.pid, pv.val))
    }

    pub fn knows_parameter(&self, id: ParamId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn parameter_value(&self, id: ParamId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn parameter_affects_event_weight(&self, id: ParamId, eid: CachedEventId) -> bool {
        self.events
            .get(eid)
            .is_some_and(|ev| ev.weight.contains_key(&id))
    }

    pub fn parameter_affects_event_lateral(&self, id: ParamId, eid: CachedEventId) -> bool {
        self.events
            .get(eid)
            .is_some_and(|ev| ev.lateral.contains_key(&id))
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// The cached event `eid`, or the fallback to return in its place
    fn cached_event(&self, eid: CachedEventId) -> Result<Option<&CachedEvent<U>>, SystToolsError> {
        match self.events.get(eid) {
            Some(ev) => Ok(Some(ev)),
            None => {
                let violation = Violation::EventNotCached {
                    event: eid,
                    cached: self.events.len(),
                };
                self.interpreter.policy().react(violation, None)
            }
        }
    }

    fn evaluate(
        &self,
        id: ParamId,
        eid: CachedEventId,
        value: f64,
        lateral: bool,
    ) -> Result<f64, SystToolsError> {
        let policy = self.interpreter.policy();
        let fallback = policy.fallback_response(!lateral);
        let Some(event) = self.cached_event(eid)? else {
            return Ok(fallback);
        };
        if policy.checks() && !self.knows_parameter(id) {
            policy.react(Violation::ParameterNotDeclared(id), ())?;
            if !self.interpreter.have_header(id) {
                return policy.react(Violation::UnknownParameter(id), fallback);
            }
        }
        let splines = if lateral { &event.lateral } else { &event.weight };
        let Some(spline) = splines.get(&id) else {
            // Parameters without a cached spline leave the event unchanged
            return Ok(if lateral { 0.0 } else { 1.0 });
        };
        let v = match self.interpreter.headers().get(&id) {
            Some(ph) => self.interpreter.clamp_to_validity_range(id, &ph.header, value)?,
            None => value,
        };
        Ok(spline.eval(v))
    }

    fn current_value(&self, id: ParamId) -> Result<Option<f64>, SystToolsError> {
        match self.values.get(&id) {
            Some(v) => Ok(Some(*v)),
            None => self
                .interpreter
                .policy()
                .react(Violation::ParameterNotDeclared(id), None),
        }
    }

    /// Weight response of event `eid` to parameter `id` at `value`
    pub fn event_weight_response_at(
        &self,
        id: ParamId,
        eid: CachedEventId,
        value: f64,
    ) -> Result<f64, SystToolsError> {
        self.evaluate(id, eid, value, false)
    }

    /// Weight response of event `eid` to parameter `id` at its current value
    pub fn event_weight_response(&self, id: ParamId, eid: CachedEventId) -> Result<f64, SystToolsError> {
        match self.current_value(id)? {
            Some(v) => self.evaluate(id, eid, v, false),
            None => Ok(self.interpreter.policy().fallback_response(true)),
        }
    }

    /// Product of the weight responses of event `eid` to every declared
    /// weight parameter at its current value
    pub fn total_event_weight_response(&self, eid: CachedEventId) -> Result<f64, SystToolsError> {
        self.weight_params
            .iter()
            .filter_map(|id| self.values.get(id).map(|v| (*id, *v)))
            .try_fold(1.0, |weight, (id, v)| {
                Ok(weight * self.evaluate(id, eid, v, false)?)
            })
    }

    /// Total weight of every cached event
    pub fn total_event_weight_responses(&self) -> Result<Vec<f64>, SystToolsError> {
        (0..self.events.len())
            .map(|eid| self.total_event_weight_response(eid))
            .collect()
    }

    /// Lateral response of event `eid` to parameter `id` at `value`
    pub fn event_lateral_response_at(
        &self,
        id: ParamId,
        eid: CachedEventId,
        value: f64,
    ) -> Result<f64, SystToolsError> {
        self.evaluate(id, eid, value, true)
    }

    /// Lateral response of event `eid` to parameter `id` at its current value
    pub fn event_lateral_response(&self, id: ParamId, eid: CachedEventId) -> Result<f64, SystToolsError> {
        match self.current_value(id)? {
            Some(v) => self.evaluate(id, eid, v, true),
            None => Ok(self.interpreter.policy().fallback_response(false)),
        }
    }

    /// The declared lateral parameters and their current values
    pub fn lateral_parameter_values(&self) -> Vec<ParamValue> {
        self.lateral_params
            .iter()
            .filter_map(|id| self.values.get(id).map(|v| ParamValue::new(*id, *v)))
            .collect()
    }
}
