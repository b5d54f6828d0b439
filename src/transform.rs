//! Series-to-series transforms
//!
//! A transform maps one fetched (already unit-converted) series to another.
//! The differencing family shortens the series by one sample and stamps each
//! output at the later endpoint of its interval; the identity transform
//! leaves the series alone. String-valued series always pass through
//! untouched, whatever transform was requested.

use chrono::{DateTime, Utc};

use crate::error::{ArchiveError, Result};
use crate::types::{Series, SeriesValues};

/// Closed set of supported transforms
///
/// Discriminants match the selector codes the host sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    /// Identity, length unchanged
    #[default]
    None = 0,
    /// First derivative dv/dt, unrounded
    Derivative = 1,
    /// First derivative rounded to the nearest 1
    Derivative1Hz = 2,
    /// First derivative rounded to the nearest 0.1
    Derivative10Hz = 3,
    /// First derivative rounded to the nearest 0.01
    Derivative100Hz = 4,
    /// Forward difference with dt taken as exactly 1
    ///
    /// Deliberately ignores the sampling interval, matching the discrete
    /// diff convention (numpy.diff): out[i] = v[i+1] - v[i].
    Delta = 5,
}

impl TryFrom<i32> for Transform {
    type Error = ArchiveError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Derivative),
            2 => Ok(Self::Derivative1Hz),
            3 => Ok(Self::Derivative10Hz),
            4 => Ok(Self::Derivative100Hz),
            5 => Ok(Self::Delta),
            other => Err(ArchiveError::UnknownTransform(other)),
        }
    }
}

/// Elapsed seconds between two instants as float64
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let d = later - earlier;
    d.num_nanoseconds()
        .map(|n| n as f64 * 1e-9)
        .unwrap_or_else(|| d.num_seconds() as f64)
}

impl Transform {
    /// Round a derivative sample according to the variant
    fn round(self, dvdt: f64) -> f64 {
        match self {
            Self::Derivative1Hz => dvdt.round(),
            Self::Derivative10Hz => (dvdt * 10.0).round() / 10.0,
            Self::Derivative100Hz => (dvdt * 100.0).round() / 100.0,
            _ => dvdt,
        }
    }

    /// Apply this transform to a series
    ///
    /// Differencing a series of length n yields length n-1 with times
    /// `time[1..]`; n <= 1 yields an empty series rather than failing.
    /// String-valued series are returned unchanged.
    ///
    /// Times are assumed strictly increasing, as the store's ordering
    /// guarantees for distinct samples. A repeated timestamp makes the
    /// derivative variants divide by zero and emit infinities or NaN,
    /// matching the archiver's long-standing arithmetic; `Delta` never
    /// divides and is unaffected.
    pub fn apply(self, series: Series) -> Series {
        if self == Self::None {
            return series;
        }

        let Series { times, values } = series;
        let values = match values {
            SeriesValues::Text(text) => {
                // transforms are numeric; string keywords pass through
                return Series {
                    times,
                    values: SeriesValues::Text(text),
                };
            }
            SeriesValues::Scalar(v) => v,
        };

        let n = times.len();
        if n <= 1 {
            // nothing to difference, never under-allocate
            return Series {
                times: Vec::new(),
                values: SeriesValues::Scalar(Vec::new()),
            };
        }

        let mut dtimes = Vec::with_capacity(n - 1);
        let mut dvalues = Vec::with_capacity(n - 1);

        for i in 1..n {
            dtimes.push(times[i]);

            let dv = values[i] - values[i - 1];
            let sample = match self {
                Self::Delta => dv,
                _ => self.round(dv / seconds_between(times[i - 1], times[i])),
            };
            dvalues.push(sample);
        }

        Series {
            times: dtimes,
            values: SeriesValues::Scalar(dvalues),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeywordKind;
    use chrono::TimeZone;

    fn scalar_series(start_secs: i64, step_secs: i64, values: Vec<f64>) -> Series {
        let times = (0..values.len() as i64)
            .map(|i| {
                Utc.timestamp_opt(start_secs + i * step_secs, 0)
                    .single()
                    .unwrap()
            })
            .collect();
        Series {
            times,
            values: SeriesValues::Scalar(values),
        }
    }

    #[test]
    fn test_selector_codes() {
        assert_eq!(Transform::try_from(0).unwrap(), Transform::None);
        assert_eq!(Transform::try_from(4).unwrap(), Transform::Derivative100Hz);
        assert_eq!(Transform::try_from(5).unwrap(), Transform::Delta);
        assert!(matches!(
            Transform::try_from(6),
            Err(ArchiveError::UnknownTransform(6))
        ));
    }

    #[test]
    fn test_none_is_identity() {
        let series = scalar_series(1_700_000_000, 1, vec![1.0, 2.0, 4.0]);
        let out = Transform::None.apply(series.clone());
        assert_eq!(out, series);
    }

    #[test]
    fn test_derivative_of_constant_is_zero() {
        let series = scalar_series(1_700_000_000, 5, vec![3.5; 10]);
        let out = Transform::Derivative.apply(series);
        assert_eq!(out.len(), 9);
        match out.values {
            SeriesValues::Scalar(v) => assert!(v.iter().all(|&x| x == 0.0)),
            _ => panic!("expected scalar values"),
        }
    }

    #[test]
    fn test_derivative_uses_interval_and_shifts_times() {
        // 1s spacing, values 1,2,4 -> dv/dt 1.0, 2.0 at t1, t2
        let series = scalar_series(1_700_000_000, 1, vec![1.0, 2.0, 4.0]);
        let t1 = series.times[1];
        let t2 = series.times[2];
        let out = Transform::Derivative.apply(series);
        assert_eq!(out.times, vec![t1, t2]);
        assert_eq!(out.values, SeriesValues::Scalar(vec![1.0, 2.0]));
    }

    #[test]
    fn test_derivative_sub_second_spacing() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let t1 = Utc
            .timestamp_opt(1_700_000_000, 250_000_000)
            .single()
            .unwrap();
        let series = Series {
            times: vec![t0, t1],
            values: SeriesValues::Scalar(vec![0.0, 1.0]),
        };
        let out = Transform::Derivative.apply(series);
        assert_eq!(out.values, SeriesValues::Scalar(vec![4.0]));
    }

    #[test]
    fn test_derivative_rounding_variants() {
        // dv = 2.4 and 2.6 over 1s intervals
        let series = scalar_series(1_700_000_000, 1, vec![0.0, 2.4, 5.0]);
        let out = Transform::Derivative1Hz.apply(series.clone());
        assert_eq!(out.values, SeriesValues::Scalar(vec![2.0, 3.0]));

        let series = scalar_series(1_700_000_000, 1, vec![0.0, 2.46, 5.0]);
        let out = Transform::Derivative10Hz.apply(series);
        assert_eq!(out.values, SeriesValues::Scalar(vec![2.5, 2.5]));

        let series = scalar_series(1_700_000_000, 1, vec![0.0, 2.456, 5.0]);
        let out = Transform::Derivative100Hz.apply(series);
        assert_eq!(out.values, SeriesValues::Scalar(vec![2.46, 2.54]));
    }

    #[test]
    fn test_delta_ignores_interval() {
        // 10s spacing must not divide: plain forward difference
        let series = scalar_series(1_700_000_000, 10, vec![1.0, 2.0, 4.0]);
        let out = Transform::Delta.apply(series);
        assert_eq!(out.len(), 2);
        assert_eq!(out.values, SeriesValues::Scalar(vec![1.0, 2.0]));
    }

    #[test]
    fn test_short_series_yield_empty() {
        for transform in [
            Transform::Derivative,
            Transform::Derivative1Hz,
            Transform::Delta,
        ] {
            let out = transform.apply(Series::empty(KeywordKind::Scalar));
            assert_eq!(out.len(), 0);

            let single = scalar_series(1_700_000_000, 1, vec![42.0]);
            let out = transform.apply(single);
            assert_eq!(out.len(), 0);
            assert!(out.is_consistent());
        }
    }

    #[test]
    fn test_duplicate_timestamps_divide_to_infinity() {
        // non-strict ordering: dt = 0, the derivative blows up, delta does not
        let t = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let series = Series {
            times: vec![t, t],
            values: SeriesValues::Scalar(vec![1.0, 3.0]),
        };

        let out = Transform::Derivative.apply(series.clone());
        match out.values {
            SeriesValues::Scalar(v) => assert!(v[0].is_infinite()),
            _ => panic!("expected scalar values"),
        }

        let out = Transform::Delta.apply(series);
        assert_eq!(out.values, SeriesValues::Scalar(vec![2.0]));
    }

    #[test]
    fn test_string_series_pass_through() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let t1 = Utc.timestamp_opt(1_700_000_001, 0).single().unwrap();
        let series = Series {
            times: vec![t0, t1],
            values: SeriesValues::Text(vec!["OPEN".into(), "CLOSED".into()]),
        };
        let out = Transform::Derivative.apply(series.clone());
        assert_eq!(out, series);
        assert!(out.is_consistent());
    }
}
