//! Parameters declared in a provider's tool configuration
//!
//! A parameter `name` is declared by either of the keys
//! `<name>_central_value` and `<name>_variation_descriptor` (see
//! [super::descriptor]). Randomly thrown parameters may additionally give
//! `<name>_nthrows` and `<name>_random_distribution`.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

use super::descriptor::apply_variation_descriptor;
use super::{get_opt_f64, get_opt_str, get_opt_usize, Table};
use crate::error::SystToolsError;
use crate::header::ParamHeader;

/// The distribution random throws are drawn from, in units of one sigma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomDistribution {
    /// N(0, 1)
    #[default]
    Normal,
    /// U(-1, 1)
    Uniform,
}

impl FromStr for RandomDistribution {
    type Err = SystToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" | "gaussian" => Ok(Self::Normal),
            "uniform" => Ok(Self::Uniform),
            other => Err(SystToolsError::InvalidRandomDistribution(other.to_string())),
        }
    }
}

impl fmt::Display for RandomDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Uniform => write!(f, "uniform"),
        }
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Whether `config` declares the parameter `name`
pub fn tool_configuration_parameter_exists(config: &Table, name: &str) -> bool {
    config.contains_key(&format!("{}_central_value", name))
        || config.contains_key(&format!("{}_variation_descriptor", name))
}

/// Throw `nthrows` random variations of `hdr` about its central value
///
/// Each throw `t` becomes `cv + |t| * shift`, with the low one sigma shift
/// for negative throws and the high shift otherwise. Any existing variations
/// are replaced. Returns `false`, leaving `hdr` untouched, unless `hdr` is
/// randomly thrown and `nthrows > 0`.
pub fn make_random_variations(
    hdr: &mut ParamHeader,
    nthrows: usize,
    distribution: RandomDistribution,
    seed: Option<u64>,
) -> Result<bool, SystToolsError> {
    if !hdr.is_randomly_thrown || nthrows == 0 {
        return Ok(false);
    }
    let [low, high] = hdr.one_sigma_shifts.ok_or_else(|| SystToolsError::InvalidHeader {
        id: hdr.syst_param_id,
        name: hdr.pretty_name.clone(),
        reason: "is randomly thrown but has no one sigma shifts".to_string(),
    })?;

    let mut rng = rng_for(seed);
    let throws: Vec<f64> = match distribution {
        RandomDistribution::Normal => {
            let normal = Normal::new(0.0, 1.0)
                .map_err(|e| SystToolsError::config(e.to_string()))?;
            (0..nthrows).map(|_| normal.sample(&mut rng)).collect()
        }
        RandomDistribution::Uniform => {
            let uniform = Uniform::new(-1.0, 1.0)
                .map_err(|e| SystToolsError::config(e.to_string()))?;
            (0..nthrows).map(|_| uniform.sample(&mut rng)).collect()
        }
    };

    let cv = hdr.central_param_value.unwrap_or(0.0);
    hdr.param_variations = throws
        .into_iter()
        .map(|t| cv + t.abs() * if t < 0.0 { low } else { high })
        .collect();

    tracing::debug!(
        "Threw {} {} variations of {}",
        nthrows,
        distribution,
        hdr.pretty_name
    );
    Ok(true)
}

/// Parse the parameter `name` declared in `config`
///
/// Returns `None` when `config` does not declare it. The header is named
/// `name` but has no id assigned. Randomly thrown parameters are thrown
/// `<name>_nthrows` times, or `default_nthrows` times if that key is absent.
pub fn parse_tool_configuration_parameter(
    config: &Table,
    name: &str,
    seed: Option<u64>,
    default_nthrows: usize,
) -> Result<Option<ParamHeader>, SystToolsError> {
    let what = format!("tool configuration parameter \"{}\"", name);
    let central_value = get_opt_f64(config, &format!("{}_central_value", name), &what)?;
    let descriptor = get_opt_str(config, &format!("{}_variation_descriptor", name), &what)?;

    let mut hdr = ParamHeader::default();
    if !apply_variation_descriptor(&mut hdr, central_value, descriptor)? {
        return Ok(None);
    }
    hdr.pretty_name = name.to_string();

    let nthrows = get_opt_usize(config, &format!("{}_nthrows", name), &what)?
        .unwrap_or(default_nthrows);
    let distribution = get_opt_str(config, &format!("{}_random_distribution", name), &what)?
        .map(str::parse::<RandomDistribution>)
        .transpose()?
        .unwrap_or_default();
    make_random_variations(&mut hdr, nthrows, distribution, seed)?;

    Ok(Some(hdr))
}
