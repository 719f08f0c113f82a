//! Admission policy for instances.
//!
//! Loaded once per run from a JSON file and never mutated afterwards. A
//! missing file is seeded with the documented defaults; a missing or
//! malformed individual field falls back to its default instead of failing
//! the whole load.

use crate::error::Error;
use crate::json_path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Rank of a grade no letter can reach; unknown grades compare below F.
pub const UNKNOWN_GRADE_RANK: i32 = -100;

/// Convert school grade letters to 0-100 values. Unknown input ranks below
/// any real grade so a garbage grade never satisfies a minimum.
pub fn grade_rank(grade: &str) -> i32 {
    match grade.trim().to_uppercase().as_str() {
        "A+" => 100,
        "A" => 95,
        "A-" => 90,
        "B+" => 89,
        "B" => 85,
        "B-" => 80,
        "C+" => 79,
        "C" => 75,
        "C-" => 70,
        "D+" => 69,
        "D" => 65,
        "D-" => 60,
        "F" => 50,
        _ => UNKNOWN_GRADE_RANK,
    }
}

/// Stance on the searx/SearXNG fork split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearxngPreference {
    /// Only SearXNG instances are admitted.
    Required,
    /// SearXNG instances are rejected.
    Forbidden,
    /// Fork is not considered.
    Impartial,
}

impl SearxngPreference {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "required" => Some(Self::Required),
            "forbidden" => Some(Self::Forbidden),
            "impartial" => Some(Self::Impartial),
            _ => None,
        }
    }
}

/// Instance admission criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub minimum_csp_grade: String,
    pub minimum_tls_grade: String,
    pub allowed_http_grades: Vec<String>,
    pub allow_analytics: bool,
    pub require_onion: bool,
    pub require_dnssec: bool,
    pub searxng_preference: SearxngPreference,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            minimum_csp_grade: "C".to_string(),
            minimum_tls_grade: "B".to_string(),
            allowed_http_grades: vec![
                "V".to_string(),
                "F".to_string(),
                "C".to_string(),
                "Cjs".to_string(),
                "E".to_string(),
            ],
            allow_analytics: true,
            require_onion: false,
            require_dnssec: false,
            searxng_preference: SearxngPreference::Impartial,
        }
    }
}

impl Criteria {
    /// Load criteria from `path`. Seeds the file with defaults when absent.
    /// Only unrecoverable I/O is an error; bad fields degrade to defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            let defaults = Self::default();
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .map_err(|e| Error::Config(format!("{}: {}", parent.display(), e)))?;
                }
            }
            let body = serde_json::to_string_pretty(&defaults)
                .map_err(|e| Error::Config(e.to_string()))?;
            fs::write(path, body)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            info!("Seeded default criteria at {}", path.display());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let doc: Value = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Criteria file {} is not valid JSON ({}), using defaults", path.display(), e);
                Value::Null
            }
        };

        Ok(Self::from_document(&doc))
    }

    /// Build criteria from a parsed document, field by field.
    pub fn from_document(doc: &Value) -> Self {
        let defaults = Self::default();

        let allowed_http_grades = json_path::lookup(doc, &["allowed_http_grades"])
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.allowed_http_grades);

        let searxng_preference = json_path::lookup(doc, &["searxng_preference"])
            .and_then(Value::as_str)
            .and_then(SearxngPreference::parse)
            .unwrap_or(defaults.searxng_preference);

        Self {
            minimum_csp_grade: json_path::str_or(
                doc,
                &["minimum_csp_grade"],
                &defaults.minimum_csp_grade,
            ),
            minimum_tls_grade: json_path::str_or(
                doc,
                &["minimum_tls_grade"],
                &defaults.minimum_tls_grade,
            ),
            allowed_http_grades,
            allow_analytics: json_path::bool_or(
                doc,
                &["allow_analytics"],
                defaults.allow_analytics,
            ),
            require_onion: json_path::bool_or(doc, &["require_onion"], defaults.require_onion),
            require_dnssec: json_path::bool_or(doc, &["require_dnssec"], defaults.require_dnssec),
            searxng_preference,
        }
    }

    /// Case-insensitive membership test for the html grade allow-list.
    pub fn allows_http_grade(&self, grade: &str) -> bool {
        self.allowed_http_grades
            .iter()
            .any(|g| g.eq_ignore_ascii_case(grade))
    }
}
