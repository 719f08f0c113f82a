//! Shared types for scout: instance records, admission policy, ranked list.

pub mod criteria;
pub mod error;
pub mod instance;
pub mod json_path;
pub mod ranked;
pub mod timings;

pub use criteria::{grade_rank, Criteria, SearxngPreference};
pub use error::Error;
pub use instance::{Candidate, Instance};
pub use ranked::{RankedEntry, RankedList};
pub use timings::{Timing, TimingAverages, Timings};
