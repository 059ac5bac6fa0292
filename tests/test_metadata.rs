use serde_json::json;
use systtools::config::document::DEFAULT_PROVIDER_LIST_KEY;
use systtools::config::{build_parameter_headers, header_from_value, header_to_value};
use systtools::prelude::*;
use systtools::prelude::interpreter::*;

fn spline(name: &str, id: ParamId) -> ParamHeader {
    ParamHeader {
        is_splineable: true,
        central_param_value: Some(0.0),
        param_variations: vec![-2.0, -1.0, 0.0, 1.0, 2.0],
        ..ParamHeader::new(name, id)
    }
}

fn multisim(name: &str, id: ParamId, n: usize) -> ParamHeader {
    ParamHeader {
        is_randomly_thrown: true,
        one_sigma_shifts: Some([-0.1, 0.1]),
        param_variations: (0..n).map(|i| i as f64 * 0.01).collect(),
        ..ParamHeader::new(name, id)
    }
}

#[test]
fn two_providers_sharing_an_id_collide() {
    let mut first = MetaDataSet::from(vec![spline("MaCCQE", 5)]);
    let second = MetaDataSet::from(vec![spline("horn_current", 5)]);
    assert!(matches!(
        first.extend(&second),
        Err(SystToolsError::ParamIdCollision(5))
    ));
    assert_eq!(first.len(), 1);
}

#[test]
fn extend_appends_disjoint_sets() {
    let mut md = MetaDataSet::from(vec![spline("MaCCQE", 0), spline("MaCCRES", 1)]);
    let other = MetaDataSet::from(vec![multisim("flux", 2, 10)]);
    md.extend(&other).unwrap();
    assert_eq!(md.len(), 3);
    assert_eq!(md.ids(), vec![0, 1, 2]);
    assert_eq!(md.param_id("flux"), Some(2));
    assert!(md.validate(false));

    let invalid = MetaDataSet::from(vec![ParamHeader::new("empty", 9)]);
    assert!(matches!(
        md.extend(&invalid),
        Err(SystToolsError::InvalidMetaData {
            lhs_valid: true,
            rhs_valid: false
        })
    ));
}

#[test]
fn header_survives_a_document_round_trip() {
    let hdr = ParamHeader {
        is_weight_systematic_variation: false,
        units_are_natural: true,
        param_validity_range: [Some(-3.0), Some(3.0)],
        opts: vec!["mode=lateral".to_string(), "fast".to_string()],
        ..spline("FrInel_pi", 12)
    };
    let value = header_to_value(&hdr).unwrap();
    assert_eq!(value["isWeightSystematicVariation"], false);
    assert_eq!(value["paramValidityRange"], json!([-3.0, 3.0]));
    assert_eq!(header_from_value(&value).unwrap(), hdr);

    let md = MetaDataSet::from(vec![hdr]);
    assert_eq!(md.syst_get_opt_kv(12, "mode").unwrap(), "lateral");
    assert!(md.syst_has_opt_by_name("FrInel_pi", "fast"));
    assert!(matches!(
        md.syst_get_opt_kv(12, "fast"),
        Err(SystToolsError::NoSuchOptKV { .. })
    ));
}

#[test]
fn responseless_parameters_follow_their_response_parameter() {
    let mut md = MetaDataSet::from(vec![
        ParamHeader {
            param_variations: vec![0.0],
            ..ParamHeader::new("ZExpA_response", 0)
        },
        ParamHeader {
            is_responseless_param: true,
            response_param_id: Some(0),
            param_variations: vec![0.1, 0.2, 0.3],
            ..ParamHeader::new("ZExpA1", 1)
        },
        ParamHeader {
            is_responseless_param: true,
            response_param_id: Some(0),
            param_variations: vec![1.0, 2.0, 3.0],
            ..ParamHeader::new("ZExpA2", 2)
        },
    ]);
    assert!(!md.validate(true));
    md.finalize_and_validate_dependent_parameters("ZExpA_response", &["ZExpA1", "ZExpA2"])
        .unwrap();
    assert_eq!(
        md.get_param(0).unwrap().param_variations,
        vec![0.0, 1.0, 2.0]
    );
    assert!(md.validate(false));
}

#[test]
fn parameter_headers_document_builds_a_header_map() {
    let doc = json!({
        "syst_providers": ["genie", "flux_nue"],
        "genie": {
            "tool_type": "genie",
            "parameter_headers": ["MaCCQE"],
            "MaCCQE": {
                "prettyName": "MaCCQE",
                "systParamId": 0,
                "isSplineable": true,
                "paramVariations": [-1.0, 0.0, 1.0],
            },
        },
        "flux_nue": {
            "tool_type": "flux",
            "instance_name": "nue",
            "parameter_headers": ["horn"],
            "horn": {
                "prettyName": "horn",
                "systParamId": 1,
                "isRandomlyThrown": true,
                "oneSigmaShifts": [-1.0, 1.0],
                "paramVariations": [0.3, -0.2],
            },
        },
    });
    let headers = build_parameter_headers(&doc, DEFAULT_PROVIDER_LIST_KEY).unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[&1].provider_name, "flux_nue");
    assert!(headers[&1].header.is_randomly_thrown);

    let interpreter = ResponseInterpreter::new(headers, ValidationPolicy::default());
    assert_eq!(interpreter.header_id("horn"), Some(1));
    assert!(interpreter.is_spline_param(0).unwrap());
}
