use serde_json::{json, Value};
use systtools::config::document::DEFAULT_PROVIDER_LIST_KEY;
use systtools::config::{tool_configuration_parameter_exists, Table};
use systtools::prelude::config::*;
use systtools::prelude::interpreter::*;
use systtools::prelude::provider::*;
use systtools::prelude::*;
use systtools::provider::providers_parameter_headers_document;

/// A toy cross-section provider: every parameter scales the event weight
/// linearly in its value by the event's `sensitivity`.
#[derive(Default)]
struct LinearProvider {
    metadata: MetaDataSet,
}

const PARAMETERS: [&str; 3] = ["MaCCQE", "NormCCMEC", "FSI_pi"];

impl SystProvider for LinearProvider {
    type Event = f64;

    fn build_metadata(&mut self, config: &Table, request: &MetadataRequest) -> Result<MetaDataSet, SystToolsError> {
        let mut md = MetaDataSet::new();
        let mut id = request.first_id;
        for name in PARAMETERS {
            if !tool_configuration_parameter_exists(config, name) {
                continue;
            }
            if let Some(mut hdr) = parse_tool_configuration_parameter(config, name, request.seed, 20)? {
                hdr.syst_param_id = Some(id);
                md.push(hdr);
                id += 1;
            }
        }
        Ok(md)
    }

    fn prepare_runtime(&mut self, metadata: &MetaDataSet, _options: &Table) -> Result<(), SystToolsError> {
        self.metadata = metadata.clone();
        Ok(())
    }

    fn event_response(&self, sensitivity: &f64) -> Result<EventResponse, SystToolsError> {
        let unit = self
            .metadata
            .iter()
            .filter_map(|hdr| {
                let pid = hdr.syst_param_id?;
                let responses = if hdr.is_correction {
                    vec![1.0 + sensitivity * hdr.central_param_value.unwrap_or(0.0)]
                } else {
                    hdr.param_variations.iter().map(|v| 1.0 + sensitivity * v).collect()
                };
                Some(ParamResponses::new(pid, responses))
            })
            .collect();
        Ok(vec![unit])
    }
}

fn registry() -> ProviderRegistry<f64> {
    let mut registry = ProviderRegistry::new();
    registry.register("linear", || Box::new(LinearProvider::default()));
    registry
}

fn tool_config() -> Value {
    json!({
        "syst_providers": ["xsec", "fsi"],
        "xsec": {
            "tool_type": "linear",
            "instance_name": "genie",
            "MaCCQE_central_value": 0.0,
            "MaCCQE_variation_descriptor": "(-2,2,0.5)",
            "NormCCMEC_central_value": 0.2,
        },
        "fsi": {
            "tool_type": "linear",
            "FSI_pi_variation_descriptor": "{0.1,0.3}",
            "FSI_pi_nthrows": 8,
        },
    })
}

#[test]
fn providers_configure_and_interpret_end_to_end() {
    let providers = configure_providers_from_tool_config(
        &tool_config(),
        &registry(),
        DEFAULT_PROVIDER_LIST_KEY,
        0,
        Some(2024),
    )
    .unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].fully_qualified_name(), "linear_genie");
    assert_eq!(providers[1].fully_qualified_name(), "linear");
    assert_eq!(providers[1].metadata().ids(), vec![2]);

    let headers = build_header_map(&providers).unwrap();
    let interpreter = ResponseInterpreter::new(headers, ValidationPolicy::default());

    let maqe = interpreter.header_id("MaCCQE").unwrap();
    assert!(interpreter.is_spline_param(maqe).unwrap());
    assert_eq!(interpreter.n_discrete_variations(maqe).unwrap(), 9);
    let fsi = interpreter.header_id("FSI_pi").unwrap();
    assert!(interpreter.is_thrown_param(fsi).unwrap());
    assert_eq!(interpreter.n_discrete_variations(fsi).unwrap(), 8);
    assert_eq!(interpreter.provider_name(fsi), Some("linear"));

    let mut er = providers[0].event_response(&0.1).unwrap();
    extend_event_response(&mut er, providers[1].event_response(&0.1).unwrap()).unwrap();
    assert_eq!(er[0].len(), 3);

    let w = interpreter
        .get_parameter_response_for_unit(maqe, 1.0, &er[0])
        .unwrap();
    assert!((w - 1.1).abs() < 1e-9, "{}", w);

    let universes = interpreter.get_all_discrete_responses(fsi, &er).unwrap();
    assert_eq!(universes[0].len(), 8);
}

#[test]
fn thrown_variations_are_reproducible_for_a_seed() {
    let config = registry();
    let a = configure_providers_from_tool_config(&tool_config(), &config, DEFAULT_PROVIDER_LIST_KEY, 0, Some(7))
        .unwrap();
    let b = configure_providers_from_tool_config(&tool_config(), &config, DEFAULT_PROVIDER_LIST_KEY, 0, Some(7))
        .unwrap();
    assert_eq!(a[1].metadata(), b[1].metadata());

    let throws = &a[1].metadata().get_param(2).unwrap().param_variations;
    assert!(throws.iter().all(|t| *t >= -0.1 * 10.0 && *t <= 0.3 * 10.0));
}

#[test]
fn parameter_headers_document_reconfigures_providers() {
    let providers =
        configure_providers_from_tool_config(&tool_config(), &registry(), DEFAULT_PROVIDER_LIST_KEY, 10, Some(1))
            .unwrap();
    let doc = providers_parameter_headers_document(&providers).unwrap();
    assert_eq!(doc["syst_providers"], json!(["linear_genie", "linear"]));
    assert_eq!(doc["linear_genie"]["NormCCMEC"]["isCorrection"], true);

    let rebuilt =
        configure_providers_from_parameter_headers(&doc, &registry(), DEFAULT_PROVIDER_LIST_KEY).unwrap();
    assert_eq!(rebuilt.len(), providers.len());
    for (a, b) in providers.iter().zip(&rebuilt) {
        assert_eq!(a.metadata(), b.metadata());
        assert_eq!(a.event_response(&0.3).unwrap(), b.event_response(&0.3).unwrap());
    }

    let headers = build_parameter_headers(&doc, DEFAULT_PROVIDER_LIST_KEY).unwrap();
    assert_eq!(headers, build_header_map(&rebuilt).unwrap());
}

#[test]
fn default_responses_are_unity() {
    let providers =
        configure_providers_from_tool_config(&tool_config(), &registry(), DEFAULT_PROVIDER_LIST_KEY, 0, Some(1))
            .unwrap();
    let defaults = providers[0].default_event_unit_response();
    assert_eq!(defaults.len(), 2);
    assert_eq!(defaults[0].responses.len(), 9);
    assert_eq!(defaults[1].responses, vec![1.0]);

    let mut er = vec![defaults];
    scrub_unity_event_response(&mut er);
    assert!(er[0].is_empty());
}

#[test]
fn bad_descriptors_fail_configuration() {
    let doc = json!({
        "syst_providers": ["xsec"],
        "xsec": {"tool_type": "linear", "MaCCQE_variation_descriptor": "(1,2)"},
    });
    assert!(matches!(
        configure_providers_from_tool_config(&doc, &registry(), DEFAULT_PROVIDER_LIST_KEY, 0, None),
        Err(SystToolsError::InvalidVariationDescriptor { .. })
    ));

    let doc = json!({
        "syst_providers": ["xsec"],
        "xsec": {
            "tool_type": "linear",
            "FSI_pi_variation_descriptor": "{0.1}",
            "FSI_pi_random_distribution": "lognormal",
        },
    });
    assert!(matches!(
        configure_providers_from_tool_config(&doc, &registry(), DEFAULT_PROVIDER_LIST_KEY, 0, None),
        Err(SystToolsError::InvalidRandomDistribution(_))
    ));
}
