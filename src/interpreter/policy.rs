use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SystToolsError;
use crate::header::{ParamHeader, ParamId};

/// How much checking the [ResponseInterpreter](super::ResponseInterpreter)
/// performs on each query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CareLevel {
    /// Full cross-checks: knot/response shapes, per-value bounds, weight-only
    /// filtering of combined queries and parameter validity ranges
    Tortoise,
    /// Existence and type-correctness checks only
    Frog,
    /// No checks, the caller guarantees correctness
    Hare,
}

/// How a failed check is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PedantLevel {
    /// Log an error and return [SystToolsError::PolicyViolation]
    NotOnMyWatch,
    /// Log a warning and use the fallback value
    Meh,
    /// Silently use the fallback value
    AnythingGoes,
}

/// The value substituted when a failed check does not error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorResponseLevel {
    ZeroResponse,
    UnityWeight,
    BoundaryResponse,
}

fn at_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" for variation {}", i),
        None => String::new(),
    }
}

/// A check failed by a query, see [ValidationPolicy::react]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("Requested header for parameter {0}, but it is not currently configured")]
    UnknownParameter(ParamId),

    #[error("Requested header for parameter named \"{0}\", but it is not currently configured")]
    UnknownParameterName(String),

    #[error("Requested the response parameter id of parameter {0}, but it is not a responseless parameter")]
    NotResponseless(ParamId),

    #[error("Requested spline information for parameter {0}, but it is not a splineable parameter")]
    NotSplineable(ParamId),

    #[error("Requested the lower limit of parameter {0}, but it has none")]
    NoLowLimit(ParamId),

    #[error("Requested the upper limit of parameter {0}, but it has none")]
    NoUpLimit(ParamId),

    #[error("Requested a combined weight, but parameter {pid}, {name} is not a weight systematic")]
    NotWeight { pid: ParamId, name: String },

    #[error("Requested responses for parameter {pid}, {name}, but it expresses responses through parameter {response_param:?}")]
    Responseless {
        pid: ParamId,
        name: String,
        response_param: Option<ParamId>,
    },

    #[error("Requested responses for parameter {0}, but the relevant event response was not passed")]
    MissingEventResponse(ParamId),

    #[error("Parameter {pid} has {responses} responses but {variations} variations")]
    ResponseCountMismatch {
        pid: ParamId,
        responses: usize,
        variations: usize,
    },

    #[error("Cannot interpolate the responses of parameter {pid}: {reason}")]
    BadResponses { pid: ParamId, reason: String },

    #[error("Requested variation {index} of parameter {pid}, but it only has {variations}")]
    VariationOutOfRange {
        pid: ParamId,
        index: usize,
        variations: usize,
    },

    #[error("Parameter \"{name}\" evaluated at {value}, but its lower bound is {bound}")]
    BelowLowerBound { name: String, value: f64, bound: f64 },

    #[error("Parameter \"{name}\" evaluated at {value}, but its upper bound is {bound}")]
    AboveUpperBound { name: String, value: f64, bound: f64 },

    #[error("Attempted to cache {events} events, but passed {responses} event responses")]
    CachedEventCountMismatch { events: usize, responses: usize },

    #[error("Requested cached event {event}, but only {cached} are in the cache")]
    EventNotCached { event: usize, cached: usize },

    #[error("Attempted to declare the use of parameter {0}, but it has already been declared")]
    ParameterAlreadyDeclared(ParamId),

    #[error("Requested parameter {0} from the cache, but it has not been declared")]
    ParameterNotDeclared(ParamId),

    #[error("The weight response of parameter {name}{} is negative: {value}, and negative weights are not enabled", at_index(.index))]
    NegativeWeight {
        name: String,
        index: Option<usize>,
        value: f64,
    },

    #[error("The weight response of parameter {name}{} is below the small weight limit: |{value}| < {limit}", at_index(.index))]
    SmallWeight {
        name: String,
        index: Option<usize>,
        value: f64,
        limit: f64,
    },

    #[error("The weight response of parameter {name}{} is above the large weight limit: |{value}| > {limit}", at_index(.index))]
    LargeWeight {
        name: String,
        index: Option<usize>,
        value: f64,
        limit: f64,
    },
}

/// Validation and error-response configuration
///
/// Three orthogonal axes decide what gets checked ([CareLevel]), how a failure
/// is reported ([PedantLevel]) and what value replaces a bad one
/// ([ErrorResponseLevel]). Weight bounds are only consulted by
/// [ValidationPolicy::check_response].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub care: CareLevel,
    pub pedantry: PedantLevel,
    pub error_response: ErrorResponseLevel,
    pub allow_negative_weights: bool,
    pub large_weight: f64,
    pub small_weight: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            care: CareLevel::Frog,
            pedantry: PedantLevel::Meh,
            error_response: ErrorResponseLevel::UnityWeight,
            allow_negative_weights: false,
            large_weight: f64::MAX,
            small_weight: 0.0,
        }
    }
}

impl ValidationPolicy {
    pub fn new(care: CareLevel, pedantry: PedantLevel, error_response: ErrorResponseLevel) -> Self {
        Self {
            care,
            pedantry,
            error_response,
            ..Default::default()
        }
    }

    pub fn with_care(mut self, care: CareLevel) -> Self {
        self.care = care;
        self
    }

    pub fn with_pedantry(mut self, pedantry: PedantLevel) -> Self {
        self.pedantry = pedantry;
        self
    }

    pub fn with_error_response(mut self, error_response: ErrorResponseLevel) -> Self {
        self.error_response = error_response;
        self
    }

    pub fn with_negative_weights(mut self, allow: bool) -> Self {
        self.allow_negative_weights = allow;
        self
    }

    /// Set the (small, large) absolute weight bounds
    pub fn with_weight_bounds(mut self, small: f64, large: f64) -> Self {
        self.small_weight = small;
        self.large_weight = large;
        self
    }

    /// Whether existence and type checks are performed
    pub(crate) fn checks(&self) -> bool {
        self.care <= CareLevel::Frog
    }

    /// Whether the slow, per-value checks are performed
    pub(crate) fn thorough(&self) -> bool {
        self.care == CareLevel::Tortoise
    }

    /// Report a failed check according to [Self::pedantry]
    ///
    /// Returns the fallback unless the policy is [PedantLevel::NotOnMyWatch].
    pub fn react<T>(&self, violation: Violation, fallback: T) -> Result<T, SystToolsError> {
        match self.pedantry {
            PedantLevel::NotOnMyWatch => {
                tracing::error!("{}", violation);
                Err(SystToolsError::PolicyViolation(violation))
            }
            PedantLevel::Meh => {
                tracing::warn!("{}", violation);
                Ok(fallback)
            }
            PedantLevel::AnythingGoes => Ok(fallback),
        }
    }

    /// The response used when a weight could not be determined at all
    pub fn fallback_response(&self, is_weight: bool) -> f64 {
        if is_weight && self.error_response == ErrorResponseLevel::UnityWeight {
            1.0
        } else {
            0.0
        }
    }

    fn replacement(&self, boundary: f64) -> f64 {
        match self.error_response {
            ErrorResponseLevel::ZeroResponse => 0.0,
            ErrorResponseLevel::UnityWeight => 1.0,
            ErrorResponseLevel::BoundaryResponse => boundary,
        }
    }

    /// Check a single response value of `hdr`
    ///
    /// Lateral responses are returned unchanged. Weight responses are checked
    /// in turn for being negative, below [Self::small_weight] and above
    /// [Self::large_weight]; each failure replaces the value according to
    /// [Self::error_response] before the next check.
    pub fn check_response(
        &self,
        r: f64,
        hdr: &ParamHeader,
        index: Option<usize>,
    ) -> Result<f64, SystToolsError> {
        if !hdr.is_weight_systematic_variation {
            return Ok(r);
        }
        let mut r = r;
        if !self.allow_negative_weights && r < 0.0 {
            let violation = Violation::NegativeWeight {
                name: hdr.pretty_name.clone(),
                index,
                value: r,
            };
            r = self.react(violation, self.replacement(0.0))?;
        }
        if r.abs() < self.small_weight {
            let violation = Violation::SmallWeight {
                name: hdr.pretty_name.clone(),
                index,
                value: r,
                limit: self.small_weight,
            };
            r = self.react(violation, self.replacement(self.small_weight))?;
        }
        if r.abs() > self.large_weight {
            let violation = Violation::LargeWeight {
                name: hdr.pretty_name.clone(),
                index,
                value: r,
                limit: self.large_weight,
            };
            r = self.react(violation, self.replacement(self.large_weight))?;
        }
        Ok(r)
    }
}
