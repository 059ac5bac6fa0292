//! Per-event parameter responses
//!
//! For each object of interest (an interaction, a track, ...) within an event,
//! providers record the responses to each relevant parameter variation as an
//! [EventUnitResponse]. An [EventResponse] holds one unit per object.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::error::SystToolsError;
use crate::header::ParamId;
use crate::metadata::MetaDataSet;

/// The responses of one parameter for one event unit
///
/// Parallel to the parameter's variations, or a single value for corrections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamResponses {
    pub pid: ParamId,
    pub responses: Vec<f64>,
}

impl ParamResponses {
    pub fn new(pid: ParamId, responses: Vec<f64>) -> Self {
        Self { pid, responses }
    }

    /// Whether every response is 1 to within machine epsilon
    pub fn is_unity(&self) -> bool {
        self.responses
            .iter()
            .all(|r| (r - 1.0).abs() <= f64::EPSILON)
    }
}

/// A parameter value, one point in parameter space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub pid: ParamId,
    pub val: f64,
}

impl ParamValue {
    pub fn new(pid: ParamId, val: f64) -> Self {
        Self { pid, val }
    }
}

pub type ParamValueList = Vec<ParamValue>;

/// Responses for one object of interest, unique by parameter id
pub type EventUnitResponse = Vec<ParamResponses>;

/// Responses for every object of interest in an event
pub type EventResponse = Vec<EventUnitResponse>;

/// Elements keyed by a parameter id
pub trait HasParamId {
    fn pid(&self) -> ParamId;
}

impl HasParamId for ParamResponses {
    fn pid(&self) -> ParamId {
        self.pid
    }
}

impl HasParamId for ParamValue {
    fn pid(&self) -> ParamId {
        self.pid
    }
}

pub fn container_has_param<T: HasParamId>(container: &[T], pid: ParamId) -> bool {
    container.iter().any(|el| el.pid() == pid)
}

/// The first element of `container` with id `pid`
pub fn get_param_element<T: HasParamId>(container: &[T], pid: ParamId) -> Option<&T> {
    container.iter().find(|el| el.pid() == pid)
}

/// Move the units of `other` into `er`, unit by unit
///
/// Both responses must describe the same number of units, and no parameter may
/// appear in the same unit of both.
pub fn extend_event_response(
    er: &mut EventResponse,
    other: EventResponse,
) -> Result<(), SystToolsError> {
    if er.len() != other.len() {
        return Err(SystToolsError::IncompatibleEventUnits {
            lhs: er.len(),
            rhs: other.len(),
        });
    }
    for (unit, other_unit) in er.iter_mut().zip(other) {
        for resp in other_unit {
            if container_has_param(unit, resp.pid) {
                return Err(SystToolsError::ParamIdCollision(resp.pid));
            }
            unit.push(resp);
        }
    }
    Ok(())
}

/// Drop every entry whose responses are all unity
pub fn scrub_unity_event_unit_response(unit: &mut EventUnitResponse) {
    unit.retain(|resp| !resp.is_unity());
}

/// Drop every entry whose responses are all unity, in every unit
pub fn scrub_unity_event_response(er: &mut EventResponse) {
    for unit in er.iter_mut() {
        scrub_unity_event_unit_response(unit);
    }
}

/// A no-op response for every header in `md`
///
/// Each entry holds one unity response per variation, or a single one for
/// corrections. Headers without an id are skipped.
pub fn default_event_unit_response(md: &MetaDataSet) -> EventUnitResponse {
    md.iter()
        .filter_map(|hdr| {
            let n = if hdr.is_correction {
                1
            } else {
                hdr.n_variations()
            };
            hdr.syst_param_id
                .map(|pid| ParamResponses::new(pid, vec![1.0; n]))
        })
        .collect()
}

/// Human readable dump of an event unit's responses
pub fn event_unit_response_info(unit: &EventUnitResponse) -> String {
    let mut out = String::new();
    for resp in unit {
        let _ = writeln!(out, "  {}: {:?}", resp.pid, resp.responses);
    }
    out
}

/// Human readable dump of every unit in an event response
pub fn event_response_info(er: &EventResponse) -> String {
    let mut out = String::new();
    for (i, unit) in er.iter().enumerate() {
        let _ = writeln!(out, "Event unit {} ({} parameters):", i, unit.len());
        out.push_str(&event_unit_response_info(unit));
    }
    out
}
