//! Systematic providers
//!
//! A provider declares a set of parameters and calculates their responses for
//! each event. Configuration happens in two phases:
//!
//! 1. [SystProvider::build_metadata] turns the provider's tool configuration
//!    into parameter headers, assigning ids contiguously from the first id it
//!    is given.
//! 2. [SystProvider::prepare_runtime] sets up response calculation for a fixed
//!    set of headers, either those just built or those read back from a
//!    parameter-headers document.
//!
//! The headers are owned by the [ConfiguredProvider] wrapping the provider,
//! so they cannot change after configuration.
//!
//! Providers are created by name through a [ProviderRegistry]:
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register("genie", || Box::new(GenieProvider::default()));
//! let providers = configure_providers_from_tool_config(&doc, &registry, "syst_providers", 0, Some(42))?;
//! let interpreter = ResponseInterpreter::new(build_header_map(&providers), ValidationPolicy::default());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::document::{parameter_headers_document, read_provider_entries, ProviderEntry};
use crate::config::{as_table, fully_qualified_name, get_opt_str, get_str, get_str_list, get_value, Table};
use crate::error::SystToolsError;
use crate::header::ParamId;
use crate::interpreter::{HeaderMap, ProviderHeader};
use crate::metadata::MetaDataSet;
use crate::response::{default_event_unit_response, EventResponse, EventUnitResponse};

/// Upper bound of the seeds suggested to providers
const MAX_SUGGESTED_SEED: u64 = 1_000_000;

/// What a provider is asked for when building its metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRequest {
    /// The id of the first parameter, the rest follow contiguously
    pub first_id: ParamId,
    /// Seed for any random numbers used while building the metadata
    pub seed: Option<u64>,
}

/// Interface implemented by every systematic provider
pub trait SystProvider {
    /// The event type responses are calculated for
    type Event;

    /// Build the parameter headers described by the tool configuration
    ///
    /// Ids must start at `request.first_id` and be contiguous.
    fn build_metadata(
        &mut self,
        config: &Table,
        request: &MetadataRequest,
    ) -> Result<MetaDataSet, SystToolsError>;

    /// Prepare response calculation for `metadata`
    ///
    /// `options` are the tool options written by [Self::extra_tool_options],
    /// possibly read back from a parameter-headers document.
    fn prepare_runtime(&mut self, metadata: &MetaDataSet, options: &Table) -> Result<(), SystToolsError>;

    /// Options needed to reconfigure this provider that cannot be expressed
    /// as parameter headers
    fn extra_tool_options(&self) -> Table {
        Map::new()
    }

    /// Calculate the responses of every handled parameter for one event
    fn event_response(&self, event: &Self::Event) -> Result<EventResponse, SystToolsError>;
}

/// Builds a fresh, unconfigured provider
pub type ProviderFactory<E> = Box<dyn Fn() -> Box<dyn SystProvider<Event = E>>>;

/// Provider factories, keyed by tool type
pub struct ProviderRegistry<E> {
    factories: BTreeMap<String, ProviderFactory<E>>,
}

impl<E> Default for ProviderRegistry<E> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<E> ProviderRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `tool_type`, replacing any existing factory
    pub fn register<F>(&mut self, tool_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn SystProvider<Event = E>> + 'static,
    {
        self.factories.insert(tool_type.into(), Box::new(factory));
    }

    pub fn contains(&self, tool_type: &str) -> bool {
        self.factories.contains_key(tool_type)
    }

    pub fn tool_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// A new provider of type `tool_type`
    pub fn create(&self, tool_type: &str) -> Result<Box<dyn SystProvider<Event = E>>, SystToolsError> {
        self.factories
            .get(tool_type)
            .map(|factory| factory())
            .ok_or_else(|| SystToolsError::UnknownProviderType(tool_type.to_string()))
    }
}

impl<E> fmt::Debug for ProviderRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("tool_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A provider together with the headers it was configured with
pub struct ConfiguredProvider<E> {
    tool_type: String,
    instance_name: Option<String>,
    metadata: MetaDataSet,
    provider: Box<dyn SystProvider<Event = E>>,
}

impl<E> ConfiguredProvider<E> {
    pub fn tool_type(&self) -> &str {
        &self.tool_type
    }

    pub fn instance_name(&self) -> Option<&str> {
        self.instance_name.as_deref()
    }

    /// `tool_type`, or `tool_type_instance_name`
    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.tool_type, self.instance_name.as_deref())
    }

    pub fn metadata(&self) -> &MetaDataSet {
        &self.metadata
    }

    /// Whether this provider handles parameter `id`
    pub fn handles(&self, id: ParamId) -> bool {
        self.metadata.has_param(id)
    }

    /// The id of the handled parameter `name`
    pub fn parameter_id(&self, name: &str) -> Result<ParamId, SystToolsError> {
        self.metadata
            .param_id(name)
            .ok_or_else(|| SystToolsError::ParameterNameNotHandled(name.to_string()))
    }

    /// The number of variations of the handled parameter `id`
    pub fn n_variations(&self, id: ParamId) -> Result<usize, SystToolsError> {
        Ok(self.metadata.get_param(id)?.n_variations())
    }

    pub fn event_response(&self, event: &E) -> Result<EventResponse, SystToolsError> {
        self.provider.event_response(event)
    }

    /// Unity responses for every handled parameter
    pub fn default_event_unit_response(&self) -> EventUnitResponse {
        default_event_unit_response(&self.metadata)
    }

    /// This provider's entry of a parameter-headers document
    pub fn provider_entry(&self) -> ProviderEntry {
        ProviderEntry {
            tool_type: self.tool_type.clone(),
            instance_name: self.instance_name.clone(),
            headers: self.metadata.clone(),
            tool_options: self.provider.extra_tool_options(),
        }
    }
}

impl<E> fmt::Debug for ConfiguredProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredProvider")
            .field("name", &self.fully_qualified_name())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Sort `metadata` by id and check the ids run contiguously from `first_id`
fn check_contiguous_ids(
    provider: &str,
    metadata: MetaDataSet,
    first_id: ParamId,
) -> Result<MetaDataSet, SystToolsError> {
    let mut headers = metadata.into_inner();
    headers.sort_by_key(|hdr| hdr.syst_param_id);
    for (expected, hdr) in (first_id..).zip(&headers) {
        if hdr.syst_param_id != Some(expected) {
            return Err(SystToolsError::NonContiguousParamIds {
                provider: provider.to_string(),
                expected,
                found: hdr.syst_param_id,
            });
        }
    }
    Ok(MetaDataSet::from(headers))
}

fn check_unique_name(seen: &mut BTreeSet<String>, name: &str) -> Result<(), SystToolsError> {
    if !seen.insert(name.to_string()) {
        return Err(SystToolsError::ProviderNameCollision(name.to_string()));
    }
    Ok(())
}

/// Configure every provider listed under `key` from its tool configuration
///
/// Each listed key names a table holding `tool_type`, an optional
/// `instance_name` and the provider specific configuration. Parameter ids are
/// assigned from `first_id` upwards, in provider order. Each provider is
/// suggested its own seed, drawn from an RNG seeded with `seed` (or from the
/// OS when `None`).
pub fn configure_providers_from_tool_config<E>(
    doc: &Value,
    registry: &ProviderRegistry<E>,
    key: &str,
    first_id: ParamId,
    seed: Option<u64>,
) -> Result<Vec<ConfiguredProvider<E>>, SystToolsError> {
    let root = as_table(doc, "tool configuration")?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut next_id = first_id;
    let mut seen = BTreeSet::new();
    let mut combined = MetaDataSet::new();
    let mut providers = Vec::new();
    for pkey in get_str_list(root, key, "tool configuration")? {
        let what = format!("provider \"{}\"", pkey);
        let config = as_table(get_value(root, &pkey, "tool configuration")?, &what)?;
        let tool_type = get_str(config, "tool_type", &what)?.to_string();
        let instance_name = get_opt_str(config, "instance_name", &what)?
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let name = fully_qualified_name(&tool_type, instance_name.as_deref());
        check_unique_name(&mut seen, &name)?;

        let mut provider = registry.create(&tool_type)?;
        let request = MetadataRequest {
            first_id: next_id,
            seed: Some(rng.random_range(0..=MAX_SUGGESTED_SEED)),
        };
        let metadata = provider.build_metadata(config, &request)?;
        let metadata = check_contiguous_ids(&name, metadata, next_id)?;
        if !metadata.validate(false) {
            return Err(SystToolsError::config(format!(
                "provider \"{}\" built invalid parameter headers",
                name
            )));
        }
        combined.extend(&metadata)?;
        let options = provider.extra_tool_options();
        provider.prepare_runtime(&metadata, &options)?;

        tracing::debug!(
            "Provider \"{}\" configured {} parameters from id {}",
            name,
            metadata.len(),
            next_id
        );
        next_id += metadata.len() as ParamId;
        providers.push(ConfiguredProvider {
            tool_type,
            instance_name,
            metadata,
            provider,
        });
    }
    Ok(providers)
}

/// Configure every provider listed under `key` in a parameter-headers
/// document
pub fn configure_providers_from_parameter_headers<E>(
    doc: &Value,
    registry: &ProviderRegistry<E>,
    key: &str,
) -> Result<Vec<ConfiguredProvider<E>>, SystToolsError> {
    let mut seen = BTreeSet::new();
    let mut combined = MetaDataSet::new();
    let mut providers = Vec::new();
    for entry in read_provider_entries(doc, key)? {
        let name = entry.fully_qualified_name();
        check_unique_name(&mut seen, &name)?;
        combined.extend(&entry.headers)?;

        let mut provider = registry.create(&entry.tool_type)?;
        provider.prepare_runtime(&entry.headers, &entry.tool_options)?;

        tracing::debug!(
            "Provider \"{}\" configured {} parameters",
            name,
            entry.headers.len()
        );
        providers.push(ConfiguredProvider {
            tool_type: entry.tool_type,
            instance_name: entry.instance_name,
            metadata: entry.headers,
            provider,
        });
    }
    Ok(providers)
}

/// The headers of every provider merged into one set
///
/// Fails on the first id shared by two providers.
pub fn combined_metadata<E>(providers: &[ConfiguredProvider<E>]) -> Result<MetaDataSet, SystToolsError> {
    let mut combined = MetaDataSet::new();
    for provider in providers {
        combined.extend(provider.metadata())?;
    }
    Ok(combined)
}

/// Every header of every provider, keyed by id
pub fn build_header_map<E>(providers: &[ConfiguredProvider<E>]) -> Result<HeaderMap, SystToolsError> {
    let mut headers = HeaderMap::new();
    for provider in providers {
        let provider_name = provider.fully_qualified_name();
        for header in provider.metadata() {
            let Some(id) = header.syst_param_id else {
                continue;
            };
            if headers.contains_key(&id) {
                return Err(SystToolsError::ParamIdCollision(id));
            }
            headers.insert(
                id,
                ProviderHeader {
                    provider_name: provider_name.clone(),
                    header: header.clone(),
                },
            );
        }
    }
    Ok(headers)
}

/// The parameter-headers document describing `providers`
pub fn providers_parameter_headers_document<E>(
    providers: &[ConfiguredProvider<E>],
) -> Result<Value, SystToolsError> {
    let entries: Vec<ProviderEntry> = providers.iter().map(ConfiguredProvider::provider_entry).collect();
    parameter_headers_document(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::DEFAULT_PROVIDER_LIST_KEY;
    use crate::config::tool::parse_tool_configuration_parameter;
    use crate::header::ParamHeader;
    use crate::response::ParamResponses;
    use serde_json::json;

    /// Scales every response by the event value
    #[derive(Default)]
    struct ScaleProvider {
        ids: Vec<ParamId>,
        scale: f64,
    }

    impl SystProvider for ScaleProvider {
        type Event = f64;

        fn build_metadata(
            &mut self,
            config: &Table,
            request: &MetadataRequest,
        ) -> Result<MetaDataSet, SystToolsError> {
            let mut md = MetaDataSet::new();
            let mut id = request.first_id;
            for name in ["norm", "shape"] {
                if let Some(mut hdr) =
                    parse_tool_configuration_parameter(config, name, request.seed, 0)?
                {
                    hdr.syst_param_id = Some(id);
                    md.push(hdr);
                    id += 1;
                }
            }
            self.scale = config.get("scale").and_then(Value::as_f64).unwrap_or(1.0);
            Ok(md)
        }

        fn prepare_runtime(&mut self, metadata: &MetaDataSet, options: &Table) -> Result<(), SystToolsError> {
            self.ids = metadata.ids();
            if let Some(scale) = options.get("scale").and_then(Value::as_f64) {
                self.scale = scale;
            }
            Ok(())
        }

        fn extra_tool_options(&self) -> Table {
            let mut options = Map::new();
            options.insert("scale".to_string(), Value::from(self.scale));
            options
        }

        fn event_response(&self, event: &f64) -> Result<EventResponse, SystToolsError> {
            Ok(vec![self
                .ids
                .iter()
                .map(|&pid| ParamResponses::new(pid, vec![event * self.scale]))
                .collect()])
        }
    }

    /// Numbers its single parameter from 10, whatever it is asked
    #[derive(Default)]
    struct BadIdProvider;

    impl SystProvider for BadIdProvider {
        type Event = f64;

        fn build_metadata(&mut self, _: &Table, _: &MetadataRequest) -> Result<MetaDataSet, SystToolsError> {
            Ok(MetaDataSet::from(vec![ParamHeader {
                param_variations: vec![1.0, 2.0],
                ..ParamHeader::new("bad", 10)
            }]))
        }

        fn prepare_runtime(&mut self, _: &MetaDataSet, _: &Table) -> Result<(), SystToolsError> {
            Ok(())
        }

        fn event_response(&self, _: &f64) -> Result<EventResponse, SystToolsError> {
            Ok(EventResponse::new())
        }
    }

    fn registry() -> ProviderRegistry<f64> {
        let mut registry = ProviderRegistry::new();
        registry.register("scale", || Box::new(ScaleProvider::default()));
        registry.register("bad", || Box::new(BadIdProvider));
        registry
    }

    fn tool_config() -> Value {
        json!({
            "syst_providers": ["first", "second"],
            "first": {
                "tool_type": "scale",
                "norm_central_value": 1.0,
                "shape_variation_descriptor": "(-1,1,1)",
                "scale": 2.0,
            },
            "second": {
                "tool_type": "scale",
                "instance_name": "b",
                "norm_variation_descriptor": "[0.9, 1.1]",
            },
        })
    }

    #[test]
    fn test_configure_from_tool_config() {
        let providers =
            configure_providers_from_tool_config(&tool_config(), &registry(), "syst_providers", 3, Some(1))
                .unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].fully_qualified_name(), "scale");
        assert_eq!(providers[1].fully_qualified_name(), "scale_b");
        assert_eq!(providers[0].metadata().ids(), vec![3, 4]);
        assert_eq!(providers[1].metadata().ids(), vec![5]);
        assert_eq!(providers[0].parameter_id("shape").unwrap(), 4);
        assert_eq!(providers[1].n_variations(5).unwrap(), 2);
        assert!(providers[1].handles(5));
        assert!(!providers[1].handles(3));

        let er = providers[0].event_response(&0.5).unwrap();
        assert_eq!(er[0][0], ParamResponses::new(3, vec![1.0]));

        let defaults = providers[0].default_event_unit_response();
        assert_eq!(defaults[0].responses, vec![1.0]);
        assert_eq!(defaults[1].responses, vec![1.0; 3]);

        let headers = build_header_map(&providers).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[&5].provider_name, "scale_b");
    }

    #[test]
    fn test_round_trip_through_parameter_headers() {
        let providers =
            configure_providers_from_tool_config(&tool_config(), &registry(), "syst_providers", 0, Some(1))
                .unwrap();
        let doc = providers_parameter_headers_document(&providers).unwrap();
        assert_eq!(doc["scale"]["tool_options"]["scale"], 2.0);

        let rebuilt =
            configure_providers_from_parameter_headers(&doc, &registry(), DEFAULT_PROVIDER_LIST_KEY).unwrap();
        assert_eq!(rebuilt.len(), 2);
        for (a, b) in providers.iter().zip(&rebuilt) {
            assert_eq!(a.fully_qualified_name(), b.fully_qualified_name());
            assert_eq!(a.metadata(), b.metadata());
        }
        assert_eq!(
            rebuilt[0].event_response(&0.5).unwrap(),
            providers[0].event_response(&0.5).unwrap()
        );
    }

    #[test]
    fn test_combined_metadata() {
        let providers =
            configure_providers_from_tool_config(&tool_config(), &registry(), "syst_providers", 0, Some(1))
                .unwrap();
        let combined = combined_metadata(&providers).unwrap();
        assert_eq!(combined.ids(), vec![0, 1, 2]);
        assert_eq!(combined.param_id("shape"), Some(1));
    }

    #[test]
    fn test_id_collision_across_providers() {
        let header = json!({
            "prettyName": "norm",
            "systParamId": 0,
            "isCorrection": true,
            "centralParamValue": 1.0,
        });
        let doc = json!({
            "syst_providers": ["scale", "scale_b"],
            "scale": {"tool_type": "scale", "parameter_headers": ["norm"], "norm": header},
            "scale_b": {
                "tool_type": "scale",
                "instance_name": "b",
                "parameter_headers": ["norm"],
                "norm": header,
            },
        });
        assert!(matches!(
            configure_providers_from_parameter_headers(&doc, &registry(), DEFAULT_PROVIDER_LIST_KEY),
            Err(SystToolsError::ParamIdCollision(0))
        ));
    }

    #[test]
    fn test_name_collision() {
        let doc = json!({
            "syst_providers": ["a", "b"],
            "a": {"tool_type": "scale", "norm_central_value": 1.0},
            "b": {"tool_type": "scale", "norm_central_value": 1.0},
        });
        assert!(matches!(
            configure_providers_from_tool_config(&doc, &registry(), "syst_providers", 0, Some(1)),
            Err(SystToolsError::ProviderNameCollision(name)) if name == "scale"
        ));
    }

    #[test]
    fn test_non_contiguous_ids() {
        let doc = json!({"syst_providers": ["a"], "a": {"tool_type": "bad"}});
        assert!(matches!(
            configure_providers_from_tool_config(&doc, &registry(), "syst_providers", 0, None),
            Err(SystToolsError::NonContiguousParamIds {
                expected: 0,
                found: Some(10),
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_tool_type() {
        let doc = json!({"syst_providers": ["a"], "a": {"tool_type": "missing"}});
        assert!(matches!(
            configure_providers_from_tool_config(&doc, &registry(), "syst_providers", 0, None),
            Err(SystToolsError::UnknownProviderType(_))
        ));
    }
}
