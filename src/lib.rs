//! Describing and interpreting systematic parameter responses
//!
//! Systematic providers declare parameters through [ParamHeader]s collected in
//! a [MetaDataSet], and calculate per-event responses to variations of those
//! parameters. A [ResponseInterpreter] turns the headers and responses back
//! into weights, splines and multisim universes.

pub mod config;
pub mod error;
pub mod header;
pub mod interpreter;
pub mod metadata;
pub mod provider;
pub mod response;

pub use crate::config::VariationDescriptor;
pub use crate::header::{HeaderViolation, ParamHeader, ParamId};
pub use crate::interpreter::{
    CareLevel, ErrorResponseLevel, EventSplineCache, HeaderMap, PedantLevel, ProviderHeader, ResponseInterpreter,
    Spline, ValidationPolicy, Violation,
};
pub use crate::metadata::MetaDataSet;
pub use crate::provider::{ConfiguredProvider, MetadataRequest, ProviderRegistry, SystProvider};
pub use crate::response::{
    EventResponse, EventUnitResponse, ParamResponses, ParamValue, ParamValueList,
};
pub use error::SystToolsError;

pub mod prelude {
    pub mod config {
        pub use crate::config::{
            build_parameter_headers, header_from_value, header_to_value,
            parse_tool_configuration_parameter, RandomDistribution, VariationDescriptor,
        };
    }
    pub mod interpreter {
        pub use crate::interpreter::{
            policy::{CareLevel, ErrorResponseLevel, PedantLevel, ValidationPolicy},
            poly::PolyResponse,
            precalculated::{PrecalculatedResponseReader, PrecalculatedResponseWriter},
            spline::Spline,
            spline_cache::{CachedEventId, EventSplineCache},
            ResponseInterpreter,
        };
    }
    pub mod provider {
        pub use crate::provider::{
            build_header_map, configure_providers_from_parameter_headers,
            configure_providers_from_tool_config, ConfiguredProvider, MetadataRequest,
            ProviderRegistry, SystProvider,
        };
    }

    pub use crate::header::{ParamHeader, ParamId};
    pub use crate::metadata::MetaDataSet;
    pub use crate::response::*;
    pub use crate::SystToolsError;
}
