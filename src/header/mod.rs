//! Systematic parameter metadata
//!
//! A [ParamHeader] informs response consumers how to interpret the responses
//! calculated for one systematic parameter. The most commonly used features are
//! explicit fields, provider-specific extensions live in [ParamHeader::opts].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter identifier
///
/// Unique within a given parameter set configuration, but id--parameter
/// associations should never be hard coded by consumers as they may change
/// between configurations.
pub type ParamId = u32;

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_unbounded(range: &[Option<f64>; 2]) -> bool {
    range[0].is_none() && range[1].is_none()
}

/// Systematic parameter metadata record
///
/// Serializes to and from a table whose keys match the field names in
/// camelCase. Unknown keys are rejected, fields left at their default value
/// are omitted on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParamHeader {
    /// Human readable parameter name
    pub pretty_name: String,
    /// Identifier used to key the per-event response data
    ///
    /// Not guaranteed to persist between configurations.
    pub syst_param_id: Option<ParamId>,
    /// Whether responses are event weights (true) or lateral shifts of
    /// observables (false)
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub is_weight_systematic_variation: bool,
    /// Whether [Self::param_variations] and [Self::central_param_value] are in
    /// natural units or in units of one sigma
    #[serde(default, skip_serializing_if = "is_false")]
    pub units_are_natural: bool,
    /// Whether the response is recorded per event, rather than fully described
    /// by [Self::responses]
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub differs_event_by_event: bool,
    /// The parameter value considered to be the central value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub central_param_value: Option<f64>,
    /// Only a single response is expected, which consumers should always apply
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_correction: bool,
    /// The (low, high) one sigma shifts, always in natural units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_sigma_shifts: Option<[f64; 2]>,
    /// The range of valid parameter values, `None` leaves a side unbounded
    #[serde(default, skip_serializing_if = "is_unbounded")]
    pub param_validity_range: [Option<f64>; 2],
    /// Whether the variations were chosen as knots for interpolation
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_splineable: bool,
    /// Whether the variations were randomly thrown according to some prior
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_randomly_thrown: bool,
    /// The parameter values at which responses were calculated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub param_variations: Vec<f64>,
    /// Whether variations of this parameter are recorded as responses of
    /// another parameter, see [Self::response_param_id]
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_responseless_param: bool,
    /// Where the responses of a responseless parameter are recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_param_id: Option<ParamId>,
    /// Parameter-level responses for event independent parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<f64>,
    /// Arbitrary provider options, either flags or `key=value` pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opts: Vec<String>,
}

impl Default for ParamHeader {
    fn default() -> Self {
        Self {
            pretty_name: String::new(),
            syst_param_id: None,
            is_weight_systematic_variation: true,
            units_are_natural: false,
            differs_event_by_event: true,
            central_param_value: None,
            is_correction: false,
            one_sigma_shifts: None,
            param_validity_range: [None, None],
            is_splineable: false,
            is_randomly_thrown: false,
            param_variations: Vec::new(),
            is_responseless_param: false,
            response_param_id: None,
            responses: Vec::new(),
            opts: Vec::new(),
        }
    }
}

/// The first structural problem found on a [ParamHeader]
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderViolation {
    MissingId,
    MissingName,
    CorrectionWithoutCentralValue,
    CorrectionWithVariations { variations: usize, responses: usize },
    NoVariations,
    SplineableAndThrown,
    SplineableAndResponseless,
    ResponselessWithResponses,
    ResponselessWithoutResponseParam,
    EventByEventWithResponses,
    MissingHeaderResponses,
    ResponseCountMismatch { variations: usize, responses: usize },
}

impl fmt::Display for HeaderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => write!(f, "has no systParamId"),
            Self::MissingName => write!(f, "doesn't have a prettyName"),
            Self::CorrectionWithoutCentralValue => write!(
                f,
                "is marked as a correction but the centralParamValue is unset"
            ),
            Self::CorrectionWithVariations {
                variations,
                responses,
            } => write!(
                f,
                "is marked as a correction but has variations ({}) or responses ({})",
                variations, responses
            ),
            Self::NoVariations => write!(
                f,
                "is not marked as a correction, but contains no variations"
            ),
            Self::SplineableAndThrown => {
                write!(f, "is marked as splineable and as randomly thrown")
            }
            Self::SplineableAndResponseless => write!(
                f,
                "is marked as splineable but expresses its response through another parameter"
            ),
            Self::ResponselessWithResponses => write!(
                f,
                "is marked as responseless, but also has header-level responses"
            ),
            Self::ResponselessWithoutResponseParam => write!(
                f,
                "is marked as responseless, but has no associated response parameter"
            ),
            Self::EventByEventWithResponses => write!(
                f,
                "is marked as differing event by event, but also has header-level responses"
            ),
            Self::MissingHeaderResponses => write!(
                f,
                "is marked as not differing event by event, but has no header-level responses"
            ),
            Self::ResponseCountMismatch {
                variations,
                responses,
            } => write!(
                f,
                "has {} header-level responses for {} variations",
                responses, variations
            ),
        }
    }
}

impl ParamHeader {
    /// Create a header with a name and id, all other fields defaulted
    pub fn new(pretty_name: impl Into<String>, id: ParamId) -> Self {
        Self {
            pretty_name: pretty_name.into(),
            syst_param_id: Some(id),
            ..Default::default()
        }
    }

    /// The parameter id, if one has been assigned
    pub fn id(&self) -> Option<ParamId> {
        self.syst_param_id
    }

    /// Number of parameter variations
    pub fn n_variations(&self) -> usize {
        self.param_variations.len()
    }

    /// Whether this header carries the option flag `opt`
    pub fn has_opt(&self, opt: &str) -> bool {
        self.opts.iter().any(|o| o == opt)
    }

    /// Whether this header carries a `key=value` option for `key`
    pub fn has_opt_kv(&self, key: &str) -> bool {
        self.opt_kv(key).is_some()
    }

    /// The value of the first `key=value` option for `key`
    pub fn opt_kv(&self, key: &str) -> Option<&str> {
        self.opts.iter().find_map(|opt| {
            opt.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    /// Returns the first invariant this header breaks, if any
    ///
    /// Checks performed, in order:
    /// * has an id and a non-empty name
    /// * corrections have a central value and no variations or responses
    /// * other parameters have at least one variation
    /// * splineable parameters are neither thrown nor responseless
    /// * responseless parameters have no responses and a response parameter
    /// * event-by-event parameters have no header-level responses
    /// * event independent parameters have one header-level response per
    ///   variation (or any for corrections)
    pub fn violation(&self) -> Option<HeaderViolation> {
        if self.syst_param_id.is_none() {
            return Some(HeaderViolation::MissingId);
        }
        if self.pretty_name.is_empty() {
            return Some(HeaderViolation::MissingName);
        }
        if self.is_correction {
            if self.central_param_value.is_none() {
                return Some(HeaderViolation::CorrectionWithoutCentralValue);
            }
            if !self.param_variations.is_empty() || !self.responses.is_empty() {
                return Some(HeaderViolation::CorrectionWithVariations {
                    variations: self.param_variations.len(),
                    responses: self.responses.len(),
                });
            }
        } else if self.param_variations.is_empty() {
            return Some(HeaderViolation::NoVariations);
        }

        if self.is_splineable {
            if self.is_randomly_thrown {
                return Some(HeaderViolation::SplineableAndThrown);
            }
            if self.is_responseless_param {
                return Some(HeaderViolation::SplineableAndResponseless);
            }
        }
        if self.is_responseless_param {
            if !self.responses.is_empty() {
                return Some(HeaderViolation::ResponselessWithResponses);
            }
            if self.response_param_id.is_none() {
                return Some(HeaderViolation::ResponselessWithoutResponseParam);
            }
        }
        if self.differs_event_by_event {
            if !self.responses.is_empty() {
                return Some(HeaderViolation::EventByEventWithResponses);
            }
        } else {
            if self.responses.is_empty() {
                return Some(HeaderViolation::MissingHeaderResponses);
            }
            if !self.is_correction && self.responses.len() != self.param_variations.len() {
                return Some(HeaderViolation::ResponseCountMismatch {
                    variations: self.param_variations.len(),
                    responses: self.responses.len(),
                });
            }
        }
        None
    }

    /// Checks interface validity, see [Self::violation]
    ///
    /// When `quiet` is false, the reason for failure is logged.
    pub fn validate(&self, quiet: bool) -> bool {
        match self.violation() {
            None => true,
            Some(violation) => {
                if !quiet {
                    tracing::error!("SystParamHeader({}) {}", self.label(), violation);
                }
                false
            }
        }
    }

    /// `id:"name"` label used in diagnostics
    pub(crate) fn label(&self) -> String {
        match self.syst_param_id {
            Some(id) => format!("{}:\"{}\"", id, self.pretty_name),
            None => format!("-:\"{}\"", self.pretty_name),
        }
    }
}

impl fmt::Display for ParamHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameter {} {{", self.label())?;
        writeln!(
            f,
            "  weight: {}, splineable: {}, thrown: {}, correction: {}",
            self.is_weight_systematic_variation,
            self.is_splineable,
            self.is_randomly_thrown,
            self.is_correction
        )?;
        if let Some(cv) = self.central_param_value {
            writeln!(f, "  central value: {}", cv)?;
        }
        writeln!(f, "  variations: {:?}", self.param_variations)?;
        if !self.responses.is_empty() {
            writeln!(f, "  responses: {:?}", self.responses)?;
        }
        write!(f, "}}")
    }
}
