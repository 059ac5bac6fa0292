use thiserror::Error;

use crate::header::ParamId;
use crate::interpreter::policy::Violation;

#[derive(Error, Debug)]
pub enum SystToolsError {
    // ─────────────────────────────────────────────────────────────────────────
    // Identifier errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tried to get parameter with id {0}, but it doesn't exist")]
    ParameterIdNotHandled(ParamId),

    #[error("Tried to get parameter named \"{0}\", but it doesn't exist")]
    ParameterNameNotHandled(String),

    #[error("For header \"{param}\", failed to find KV option for key: \"{key}\"")]
    NoSuchOptKV { param: String, key: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Collision errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Parameter id collision found for id {0}")]
    ParamIdCollision(ParamId),

    #[error("Provider named \"{0}\" already exists, use instance_name to disambiguate multiple uses of the same tool")]
    ProviderNameCollision(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Structural errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Attempted to merge parameter sets, but one is invalid (lhs valid: {lhs_valid}, rhs valid: {rhs_valid})")]
    InvalidMetaData { lhs_valid: bool, rhs_valid: bool },

    #[error("Parameter header ({id:?}:\"{name}\") failed validation: {reason}")]
    InvalidHeader {
        id: Option<ParamId>,
        name: String,
        reason: String,
    },

    #[error("The number of event units differs between responses: {lhs} != {rhs}")]
    IncompatibleEventUnits { lhs: usize, rhs: usize },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid variation descriptor \"{descriptor}\": {reason}")]
    InvalidVariationDescriptor { descriptor: String, reason: String },

    #[error("Invalid random distribution \"{0}\", expected one of: normal, gaussian, uniform")]
    InvalidRandomDistribution(String),

    #[error("Provider {provider} assigned non-contiguous parameter ids: expected {expected}, found {found:?}")]
    NonContiguousParamIds {
        provider: String,
        expected: ParamId,
        found: Option<ParamId>,
    },

    #[error("No provider factory registered for tool type \"{0}\"")]
    UnknownProviderType(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Numerical errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cannot interpolate: {0}")]
    InvalidKnots(String),

    #[error("Polynomial fit failed: {0}")]
    FitFailed(String),

    #[error("Requested entry {entry}, but only {entries} entries are available")]
    EntryOverflow { entry: usize, entries: usize },

    // ─────────────────────────────────────────────────────────────────────────
    // Policy-gated errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    PolicyViolation(#[from] Violation),

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl SystToolsError {
    pub(crate) fn invalid_descriptor(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVariationDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

impl From<csv::Error> for SystToolsError {
    fn from(e: csv::Error) -> Self {
        SystToolsError::Csv(e.to_string())
    }
}
