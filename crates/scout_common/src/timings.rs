//! Instance response times as published by searx.space
//! (<https://searx.space#help-resptime>), and the per-metric cohort averages
//! the scorer compares against.

use crate::instance::Instance;
use serde::{Deserialize, Serialize};

/// A single response-time measurement. The directory frequently omits
/// measurements, and "not measured" must stay distinct from any number all
/// the way into scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timing {
    Measured(f64),
    Unmeasured,
}

impl Timing {
    pub fn value(self) -> Option<f64> {
        match self {
            Timing::Measured(v) => Some(v),
            Timing::Unmeasured => None,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, Timing::Measured(_))
    }
}

impl From<Option<f64>> for Timing {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) => Timing::Measured(v),
            None => Timing::Unmeasured,
        }
    }
}

/// The four response-time metrics tracked per instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub initial: Timing,
    pub search: Timing,
    pub image_search: Timing,
    pub wikipedia: Timing,
}

impl Timings {
    pub fn new(
        initial: Timing,
        search: Timing,
        image_search: Timing,
        wikipedia: Timing,
    ) -> Self {
        Self {
            initial,
            search,
            image_search,
            wikipedia,
        }
    }
}

/// Per-metric cohort averages over admitted instances. A metric with zero
/// positive measurements is `None`; the scorer treats that as "no instance
/// can pass this metric", never as an arithmetic fault.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingAverages {
    pub initial: Option<f64>,
    pub search: Option<f64>,
    pub image_search: Option<f64>,
    pub wikipedia: Option<f64>,
}

impl TimingAverages {
    /// Average each metric independently over measured values > 0.
    pub fn compute(instances: &[Instance]) -> Self {
        fn avg_of(values: impl Iterator<Item = Timing>) -> Option<f64> {
            let mut sum = 0.0;
            let mut count = 0usize;
            for v in values.filter_map(Timing::value).filter(|v| *v > 0.0) {
                sum += v;
                count += 1;
            }
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        }

        Self {
            initial: avg_of(instances.iter().map(|i| i.timings.initial)),
            search: avg_of(instances.iter().map(|i| i.timings.search)),
            image_search: avg_of(instances.iter().map(|i| i.timings.image_search)),
            wikipedia: avg_of(instances.iter().map(|i| i.timings.wikipedia)),
        }
    }
}
