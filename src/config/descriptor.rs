//! The variation-descriptor mini-language
//!
//! | descriptor | meaning |
//! |---|---|
//! | `(start,end,step)` | spline knots from `start` in steps of `step` up to `end` |
//! | `[v1,v2,...]` | explicit discrete variations |
//! | `{sigma}` | randomly thrown, one sigma shifts `(-sigma, sigma)` |
//! | `{low,high}` | randomly thrown, one sigma shifts `(low, high)` |
//!
//! Shifts are always in natural units.

use std::str::FromStr;

use crate::error::SystToolsError;
use crate::header::ParamHeader;

/// The most spline knots a `(start,end,step)` descriptor may describe
pub const MAX_KNOTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum VariationDescriptor {
    Knots { start: f64, end: f64, step: f64 },
    Discrete(Vec<f64>),
    OneSigmaShifts([f64; 2]),
}

/// The number of knots from `start` in steps of `step` up to `end`
///
/// `None` if `step` does not advance `start` or the count exceeds
/// [MAX_KNOTS].
fn knot_count(start: f64, end: f64, step: f64) -> Option<usize> {
    if step.is_nan() || step <= 0.0 || start + step == start {
        return None;
    }
    let span = (end - start) / step;
    if span < 0.0 {
        return Some(1);
    }
    // Tolerate the rounding of steps that divide the range exactly
    let steps = (span + 1e-9).floor();
    if !steps.is_finite() || steps >= MAX_KNOTS as f64 {
        return None;
    }
    Some(steps as usize + 1)
}

fn parse_values(descriptor: &str, inner: &str) -> Result<Vec<f64>, SystToolsError> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    SystToolsError::invalid_descriptor(
                        descriptor,
                        format!("\"{}\" is not a number", tok),
                    )
                })
        })
        .collect()
}

impl FromStr for VariationDescriptor {
    type Err = SystToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let descriptor = s.trim();
        let mut chars = descriptor.chars();
        let (open, close) = match (chars.next(), chars.next_back()) {
            (Some(open), Some(close)) => (open, close),
            _ => {
                return Err(SystToolsError::invalid_descriptor(
                    descriptor,
                    "expected (start,end,step), [v1,v2,...], {sigma} or {low,high}",
                ))
            }
        };
        let expected_close = match open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            _ => {
                return Err(SystToolsError::invalid_descriptor(
                    descriptor,
                    "expected (start,end,step), [v1,v2,...], {sigma} or {low,high}",
                ))
            }
        };
        if close != expected_close {
            return Err(SystToolsError::invalid_descriptor(
                descriptor,
                format!("unterminated descriptor, expected a closing '{}'", expected_close),
            ));
        }
        let values = parse_values(descriptor, chars.as_str())?;

        match open {
            '(' => match values.as_slice() {
                [start, end, step] => {
                    if *step <= 0.0 {
                        return Err(SystToolsError::invalid_descriptor(
                            descriptor,
                            "the knot step must be positive",
                        ));
                    }
                    if knot_count(*start, *end, *step).is_none() {
                        return Err(SystToolsError::invalid_descriptor(
                            descriptor,
                            format!(
                                "the knot step does not advance the start or describes more than {} knots",
                                MAX_KNOTS
                            ),
                        ));
                    }
                    Ok(Self::Knots {
                        start: *start,
                        end: *end,
                        step: *step,
                    })
                }
                _ => Err(SystToolsError::invalid_descriptor(
                    descriptor,
                    "spline knots must be given as (start,end,step)",
                )),
            },
            '[' => Ok(Self::Discrete(values)),
            _ => match values.as_slice() {
                [sigma] => Ok(Self::OneSigmaShifts([-sigma, *sigma])),
                [low, high] => Ok(Self::OneSigmaShifts([*low, *high])),
                _ => Err(SystToolsError::invalid_descriptor(
                    descriptor,
                    "one sigma shifts must be given as {sigma} or {low,high}",
                )),
            },
        }
    }
}

impl VariationDescriptor {
    /// The explicit variations described, none for one sigma shifts
    pub fn variations(&self) -> Vec<f64> {
        match self {
            Self::Knots { start, end, step } => {
                let n = knot_count(*start, *end, *step).unwrap_or(1);
                (0..n).map(|i| start + i as f64 * step).collect()
            }
            Self::Discrete(values) => values.clone(),
            Self::OneSigmaShifts(_) => Vec::new(),
        }
    }

    /// Describe `hdr`'s variations
    ///
    /// A single non-thrown variation makes `hdr` a correction with that
    /// central value.
    pub fn apply(&self, hdr: &mut ParamHeader) -> Result<(), SystToolsError> {
        match self {
            Self::Knots { .. } => {
                hdr.param_variations = self.variations();
                hdr.is_splineable = true;
            }
            Self::Discrete(values) => {
                hdr.param_variations = values.clone();
            }
            Self::OneSigmaShifts(shifts) => {
                hdr.one_sigma_shifts = Some(*shifts);
                hdr.is_randomly_thrown = true;
                return Ok(());
            }
        }
        match hdr.param_variations.len() {
            0 => Err(SystToolsError::invalid_descriptor(
                format!("{:?}", self),
                "failed to determine any parameter variations",
            )),
            1 => {
                hdr.central_param_value = hdr.param_variations.pop();
                hdr.is_splineable = false;
                hdr.is_correction = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Describe `hdr` from an optional central value and variation descriptor
///
/// Returns `false`, leaving `hdr` untouched, when neither is given. A central
/// value without a descriptor makes `hdr` a correction.
pub fn apply_variation_descriptor(
    hdr: &mut ParamHeader,
    central_value: Option<f64>,
    descriptor: Option<&str>,
) -> Result<bool, SystToolsError> {
    let descriptor = descriptor.map(str::trim).filter(|d| !d.is_empty());
    if central_value.is_none() && descriptor.is_none() {
        return Ok(false);
    }
    if central_value.is_some() {
        hdr.central_param_value = central_value;
    }
    match descriptor {
        Some(descriptor) => descriptor.parse::<VariationDescriptor>()?.apply(hdr)?,
        None => hdr.is_correction = true,
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_knots() {
        let desc: VariationDescriptor = "(-1, 1, 0.5)".parse().unwrap();
        assert_eq!(desc.variations(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);

        let desc: VariationDescriptor = " ( 0,0.3,0.1 ) ".parse().unwrap();
        let knots = desc.variations();
        assert_eq!(knots.len(), 4);
        assert_relative_eq!(knots[3], 0.3, epsilon = 1e-12);

        assert!("(0,1)".parse::<VariationDescriptor>().is_err());
        assert!("(0,1,0)".parse::<VariationDescriptor>().is_err());

        let desc: VariationDescriptor = "(1,0,0.5)".parse().unwrap();
        assert_eq!(desc.variations(), vec![1.0]);
    }

    #[test]
    fn test_knot_count_is_bounded() {
        // A step below the resolution of the start never advances it
        assert!(matches!(
            "(1e17,2e17,1)".parse::<VariationDescriptor>(),
            Err(SystToolsError::InvalidVariationDescriptor { .. })
        ));
        assert!(matches!(
            "(0,1,1e-6)".parse::<VariationDescriptor>(),
            Err(SystToolsError::InvalidVariationDescriptor { .. })
        ));

        let desc: VariationDescriptor = "(0,9999,1)".parse().unwrap();
        assert_eq!(desc.variations().len(), MAX_KNOTS);

        // Built directly, a degenerate step yields only the start
        let desc = VariationDescriptor::Knots {
            start: 1e17,
            end: 2e17,
            step: 1.0,
        };
        assert_eq!(desc.variations(), vec![1e17]);
    }

    #[test]
    fn test_discrete_and_shifts() {
        assert_eq!(
            "[1, 2,3]".parse::<VariationDescriptor>().unwrap(),
            VariationDescriptor::Discrete(vec![1.0, 2.0, 3.0])
        );
        assert_eq!(
            "{0.2}".parse::<VariationDescriptor>().unwrap(),
            VariationDescriptor::OneSigmaShifts([-0.2, 0.2])
        );
        assert_eq!(
            "{-0.1,0.3}".parse::<VariationDescriptor>().unwrap(),
            VariationDescriptor::OneSigmaShifts([-0.1, 0.3])
        );
        assert!("{1,2,3}".parse::<VariationDescriptor>().is_err());
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "1,2,3", "<1,2>", "[1,2", "[1,x]", "(1,2,3]"] {
            assert!(
                matches!(
                    bad.parse::<VariationDescriptor>(),
                    Err(SystToolsError::InvalidVariationDescriptor { .. })
                ),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_collapse_to_correction() {
        let mut hdr = ParamHeader::new("p", 0);
        assert!(apply_variation_descriptor(&mut hdr, None, Some("[1.5]")).unwrap());
        assert!(hdr.is_correction);
        assert_eq!(hdr.central_param_value, Some(1.5));
        assert!(hdr.param_variations.is_empty());
        assert!(hdr.validate(true));

        let mut hdr = ParamHeader::new("p", 0);
        apply_variation_descriptor(&mut hdr, None, Some("(0,0.5,1)")).unwrap();
        assert!(hdr.is_correction);
        assert!(!hdr.is_splineable);

        let mut hdr = ParamHeader::new("p", 0);
        assert!(matches!(
            apply_variation_descriptor(&mut hdr, None, Some("[]")),
            Err(SystToolsError::InvalidVariationDescriptor { .. })
        ));
    }

    #[test]
    fn test_central_value_only() {
        let mut hdr = ParamHeader::new("p", 0);
        assert!(!apply_variation_descriptor(&mut hdr, None, None).unwrap());
        assert!(apply_variation_descriptor(&mut hdr, Some(2.0), None).unwrap());
        assert!(hdr.is_correction);
        assert_eq!(hdr.central_param_value, Some(2.0));
    }

    #[test]
    fn test_spline_descriptor() {
        let mut hdr = ParamHeader::new("p", 0);
        apply_variation_descriptor(&mut hdr, Some(0.0), Some("(-2,2,1)")).unwrap();
        assert!(hdr.is_splineable);
        assert!(!hdr.is_correction);
        assert_eq!(hdr.param_variations, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!(hdr.validate(true));
    }
}
