//! Evapotranspiration derived from moisture change between adjacent readings.
//!
//! Every operation is a pairwise scan over `(S[i-1], S[i])` of a chronologically
//! ordered sequence. The first point of a sequence is always `0`, and a pair with
//! a missing operand yields `0` instead of an error, so a sensor dropout shows up
//! as a flat segment rather than a failed request.
//!
//! The weighted and the uniform multi-depth formulas estimate the same quantity
//! differently. They are kept as separate operations on purpose; callers pick one.

use crate::{
    error::{EtError, Result},
    reading::{DailyEtPoint, DerivedPoint, JoinedReading, Reading, Timestamped},
    soil::SoilType,
    timestamp::format_date,
};

/// Uniform weight of the simplified three-depth formula.
pub const UNIFORM_DEPTH_WEIGHT: f64 = 150.0;

/// Reference depth weights for probes at 15, 30 and 45 cm.
pub const REFERENCE_DEPTH_WEIGHTS: [f64; 3] = [200.0, 150.0, 150.0];

pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn check_weight(weight: f64) -> Result<f64> {
    if weight.is_finite() && weight > 0.0 {
        Ok(weight)
    } else {
        Err(EtError::Configuration(format!(
            "depth weight must be positive, got {weight}"
        )))
    }
}

/// Per-probe depth-interval weights, in join column order.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthWeights(Vec<f64>);

impl DepthWeights {
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(EtError::Configuration("no depth weights configured".to_string()));
        }
        for &w in &weights {
            check_weight(w)?;
        }
        Ok(Self(weights))
    }

    pub fn reference() -> Self {
        Self(REFERENCE_DEPTH_WEIGHTS.to_vec())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn pairwise<T, F>(items: &[T], et_between: F) -> Vec<DerivedPoint>
where
    T: Timestamped,
    F: Fn(&T, &T) -> f64,
{
    let Some(first) = items.first() else {
        return Vec::new();
    };

    std::iter::once(DerivedPoint {
        timestamp: first.timestamp(),
        et: 0.0,
    })
    .chain(items.windows(2).map(|pair| DerivedPoint {
        timestamp: pair[1].timestamp(),
        et: et_between(&pair[0], &pair[1]),
    }))
    .collect()
}

fn abs_delta(prev: Option<f64>, curr: Option<f64>) -> Option<f64> {
    Some((curr? - prev?).abs())
}

/// One ET point per reading: `round(|Δθ| × depth_weight, 3)`.
pub fn single_probe_et(readings: &[Reading], depth_weight: f64) -> Result<Vec<DerivedPoint>> {
    let weight = check_weight(depth_weight)?;

    Ok(pairwise(readings, |prev, curr| {
        abs_delta(prev.water_content, curr.water_content)
            .map(|delta| round3(delta * weight))
            .unwrap_or(0.0)
    }))
}

/// ET for each pair of adjacent readings on the same calendar date.
///
/// Pairs spanning midnight or with a missing value are skipped, so the output
/// has at most `readings.len() - 1` points and no leading zero.
pub fn same_day_et(readings: &[Reading], depth_weight: f64) -> Result<Vec<DailyEtPoint>> {
    let weight = check_weight(depth_weight)?;

    Ok(readings
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.date() != curr.date() {
                return None;
            }
            let delta = abs_delta(prev.water_content, curr.water_content)?;
            Some(DailyEtPoint {
                timestamp: curr.timestamp,
                date: format_date(curr.date()),
                time: curr.timestamp.time_of_day(),
                et: round3(delta * weight),
            })
        })
        .collect())
}

fn check_columns(joined: &[JoinedReading], expected: usize) -> Result<()> {
    match joined.iter().find(|row| row.values.len() != expected) {
        Some(row) => Err(EtError::Configuration(format!(
            "joined row at {} carries {} probes, expected {expected}",
            row.timestamp,
            row.values.len()
        ))),
        None => Ok(()),
    }
}

/// `(Σ |Δpᵢ| × wᵢ) × β`, or `0` if any probe value of the pair is missing.
pub fn weighted_multi_depth_et(
    joined: &[JoinedReading],
    weights: &DepthWeights,
    soil: SoilType,
) -> Result<Vec<DerivedPoint>> {
    check_columns(joined, weights.len())?;
    let beta = soil.correction_factor();

    Ok(pairwise(joined, |prev, curr| {
        let weighted: Option<f64> = prev
            .values
            .iter()
            .zip(&curr.values)
            .zip(weights.as_slice())
            .map(|((&p, &c), w)| abs_delta(p, c).map(|d| d * w))
            .sum();
        weighted.map(|sum| round3(sum * beta)).unwrap_or(0.0)
    }))
}

/// `(Σ |Δpᵢ|) × uniform_weight` with no soil correction, or `0` if any probe
/// value of the pair is missing.
pub fn uniform_multi_depth_et(
    joined: &[JoinedReading],
    uniform_weight: f64,
) -> Result<Vec<DerivedPoint>> {
    let weight = check_weight(uniform_weight)?;
    if let Some(first) = joined.first() {
        check_columns(joined, first.values.len())?;
    }

    Ok(pairwise(joined, |prev, curr| {
        let total: Option<f64> = prev
            .values
            .iter()
            .zip(&curr.values)
            .map(|(&p, &c)| abs_delta(p, c))
            .sum();
        total.map(|sum| round3(sum * weight)).unwrap_or(0.0)
    }))
}

/// Number of adjacent pairs that lack a water content on either side.
pub fn single_probe_gaps(readings: &[Reading]) -> usize {
    readings
        .windows(2)
        .filter(|pair| pair[0].water_content.is_none() || pair[1].water_content.is_none())
        .count()
}

/// Number of adjacent joined pairs with any probe value missing.
pub fn joined_gaps(joined: &[JoinedReading]) -> usize {
    joined
        .windows(2)
        .filter(|pair| pair.iter().any(|row| row.values.iter().any(Option::is_none)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;
    use time::macros::datetime;

    fn ts(minutes: i64) -> Timestamp {
        Timestamp::from(datetime!(2025-07-10 08:00:00) + time::Duration::minutes(minutes))
    }

    fn readings(values: &[Option<f64>]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Reading::water_content(ts(i as i64 * 15), v))
            .collect()
    }

    fn joined(rows: &[[Option<f64>; 3]]) -> Vec<JoinedReading> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| JoinedReading {
                timestamp: ts(i as i64 * 15),
                values: row.to_vec(),
            })
            .collect()
    }

    fn ets(points: &[DerivedPoint]) -> Vec<f64> {
        points.iter().map(|p| p.et).collect()
    }

    #[test]
    fn single_probe_scenario() {
        let s = readings(&[Some(0.20), Some(0.25), None]);
        let out = single_probe_et(&s, 200.0).unwrap();
        assert_eq!(ets(&out), vec![0.0, 10.0, 0.0]);
        assert_eq!(out[1].timestamp, s[1].timestamp);
    }

    #[test]
    fn single_probe_invariants_hold() {
        let samples = [
            vec![Some(0.31), Some(0.30), Some(0.33), None, Some(0.29), Some(0.29)],
            vec![None, Some(0.1), Some(0.4)],
            vec![Some(0.5)],
        ];
        for s in samples.iter().map(|v| readings(v)) {
            let out = single_probe_et(&s, 150.0).unwrap();
            assert_eq!(out.len(), s.len());
            assert_eq!(out[0].et, 0.0);
            for i in 1..s.len() {
                match (s[i - 1].water_content, s[i].water_content) {
                    (Some(p), Some(c)) => {
                        assert_eq!(out[i].et, round3((c - p).abs() * 150.0));
                        assert!(out[i].et >= 0.0);
                    }
                    _ => assert_eq!(out[i].et, 0.0),
                }
            }
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(single_probe_et(&[], 100.0).unwrap().is_empty());
        assert!(same_day_et(&[], 100.0).unwrap().is_empty());
        assert!(weighted_multi_depth_et(&[], &DepthWeights::reference(), SoilType::Cambisols)
            .unwrap()
            .is_empty());
        assert!(uniform_multi_depth_et(&[], UNIFORM_DEPTH_WEIGHT).unwrap().is_empty());
    }

    #[test]
    fn derivation_is_deterministic() {
        let s = readings(&[Some(0.21), Some(0.27), Some(0.22), None, Some(0.30)]);
        let a = serde_json::to_string(&single_probe_et(&s, 100.0).unwrap()).unwrap();
        let b = serde_json::to_string(&single_probe_et(&s, 100.0).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_weight_is_a_configuration_error() {
        let s = readings(&[Some(0.2), Some(0.3)]);
        assert!(matches!(single_probe_et(&s, 0.0), Err(EtError::Configuration(_))));
        assert!(matches!(same_day_et(&s, -1.0), Err(EtError::Configuration(_))));
        assert!(matches!(
            uniform_multi_depth_et(&[], f64::NAN),
            Err(EtError::Configuration(_))
        ));
        assert!(DepthWeights::new(vec![]).is_err());
        assert!(DepthWeights::new(vec![200.0, 0.0]).is_err());
    }

    #[test]
    fn same_day_skips_midnight_and_gaps() {
        let s = vec![
            Reading::water_content(Timestamp::from(datetime!(2025-07-10 23:30:00)), Some(0.30)),
            Reading::water_content(Timestamp::from(datetime!(2025-07-10 23:45:00)), Some(0.28)),
            Reading::water_content(Timestamp::from(datetime!(2025-07-11 00:00:00)), Some(0.10)),
            Reading::water_content(Timestamp::from(datetime!(2025-07-11 00:15:00)), None),
            Reading::water_content(Timestamp::from(datetime!(2025-07-11 00:30:00)), Some(0.12)),
            Reading::water_content(Timestamp::from(datetime!(2025-07-11 00:45:00)), Some(0.15)),
        ];

        let out = same_day_et(&s, 100.0).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp.to_string(), "2025-07-10 23:45:00");
        assert_eq!(out[0].date, "2025-07-10");
        assert_eq!(out[0].time, "23:45:00");
        assert_eq!(out[0].et, 2.0);
        assert_eq!(out[1].date, "2025-07-11");
        assert_eq!(out[1].time, "00:45:00");
        assert_eq!(out[1].et, 3.0);
    }

    #[test]
    fn weighted_scenario_cambisols() {
        let rows = joined(&[
            [Some(0.10), Some(0.20), Some(0.30)],
            [Some(0.12), Some(0.22), Some(0.28)],
        ]);
        let out =
            weighted_multi_depth_et(&rows, &DepthWeights::reference(), SoilType::Cambisols).unwrap();
        assert_eq!(ets(&out), vec![0.0, 10.0]);
    }

    #[test]
    fn weighted_scenario_podzols() {
        let rows = joined(&[
            [Some(0.10), Some(0.20), Some(0.30)],
            [Some(0.12), Some(0.22), Some(0.28)],
        ]);
        let out =
            weighted_multi_depth_et(&rows, &DepthWeights::reference(), SoilType::Podzols).unwrap();
        assert_eq!(ets(&out), vec![0.0, 11.0]);
    }

    #[test]
    fn weighted_missing_probe_gives_zero() {
        let rows = joined(&[
            [Some(0.10), Some(0.20), Some(0.30)],
            [Some(0.40), Some(0.50), None],
            [Some(0.42), Some(0.52), Some(0.30)],
        ]);
        let out =
            weighted_multi_depth_et(&rows, &DepthWeights::reference(), SoilType::Cambisols).unwrap();
        assert_eq!(ets(&out), vec![0.0, 0.0, 0.0]);
        assert_eq!(joined_gaps(&rows), 2);
    }

    #[test]
    fn soil_factor_is_monotonic() {
        let rows = joined(&[
            [Some(0.31), Some(0.25), Some(0.40)],
            [Some(0.28), Some(0.27), Some(0.36)],
        ]);
        let weights = DepthWeights::reference();
        let et = |soil| weighted_multi_depth_et(&rows, &weights, soil).unwrap()[1].et;
        assert!(et(SoilType::Podzols) > et(SoilType::Cambisols));
        assert!(et(SoilType::Cambisols) > et(SoilType::Gleysols));
    }

    #[test]
    fn weight_count_must_match_probe_count() {
        let rows = joined(&[[Some(0.1), Some(0.2), Some(0.3)]]);
        let two = DepthWeights::new(vec![200.0, 150.0]).unwrap();
        assert!(matches!(
            weighted_multi_depth_et(&rows, &two, SoilType::Cambisols),
            Err(EtError::Configuration(_))
        ));
    }

    #[test]
    fn uniform_formula_ignores_soil_and_depth() {
        let rows = joined(&[
            [Some(0.10), Some(0.20), Some(0.30)],
            [Some(0.12), Some(0.22), Some(0.28)],
            [Some(0.12), None, Some(0.28)],
        ]);
        let out = uniform_multi_depth_et(&rows, UNIFORM_DEPTH_WEIGHT).unwrap();
        assert_eq!(ets(&out), vec![0.0, 9.0, 0.0]);
    }

    #[test]
    fn gap_counting() {
        let s = readings(&[Some(0.2), None, Some(0.3), Some(0.31)]);
        assert_eq!(single_probe_gaps(&s), 2);
    }
}
