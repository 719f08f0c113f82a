//! Instance and candidate records.

use crate::timings::Timings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One backend endpoint advertised by the instance directory, after
/// admission filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub url: String,
    pub timings: Timings,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.url)
    }
}

/// An admitted instance paired with its composite score. Lower is better.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub instance: Instance,
    pub score: f64,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}] {}", self.score, self.instance)
    }
}
