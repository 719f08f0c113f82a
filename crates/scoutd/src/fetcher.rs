//! Fetches the instance directory and normalizes it into admitted instances.
//!
//! The searx.space document keys entries by URL and omits fields freely, so
//! everything is read through `scout_common::json_path` with documented
//! defaults. Admission applies the criteria checks in a fixed order and
//! short-circuits on the first failure.

use async_trait::async_trait;
use scout_common::json_path::{bool_or, f64_at, lookup, str_or};
use scout_common::{Criteria, Error, Instance, SearxngPreference, Timing, Timings};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Where each response-time metric lives inside a directory entry.
const INITIAL_PATH: [&str; 4] = ["timing", "initial", "all", "value"];
const SEARCH_PATH: [&str; 4] = ["timing", "search", "all", "median"];
const IMAGE_SEARCH_PATH: [&str; 4] = ["timing", "search_go", "all", "median"];
const WIKIPEDIA_PATH: [&str; 4] = ["timing", "search_wp", "all", "median"];

/// Source of the raw instance directory document.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, Error>;
}

/// Production source: HTTP GET against searx.space.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl InstanceSource for HttpSource {
    async fn fetch(&self) -> Result<Value, Error> {
        info!("Fetching instance directory from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::SourceUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("invalid JSON body: {}", e)))
    }
}

/// Turn the raw directory document into admitted instances.
pub fn normalize(
    doc: &Value,
    criteria: &Criteria,
    blacklist: &[String],
) -> Result<Vec<Instance>, Error> {
    let entries = doc
        .get("instances")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::SourceUnavailable("directory document has no \"instances\" map".to_string())
        })?;

    let mut instances = Vec::new();
    for (url, entry) in entries {
        // No latency data at all means there is nothing to score.
        if lookup(entry, &["timing"]).is_none() {
            continue;
        }

        if is_blacklisted(url, blacklist) {
            debug!("Skipping blacklisted instance {}", url);
            continue;
        }

        if !admit(entry, criteria) {
            continue;
        }

        instances.push(Instance {
            url: url.clone(),
            timings: entry_timings(entry),
        });
    }

    info!(
        "Admitted {}/{} directory entries",
        instances.len(),
        entries.len()
    );
    Ok(instances)
}

/// Apply the criteria checks in order, stopping at the first failure.
fn admit(entry: &Value, criteria: &Criteria) -> bool {
    use scout_common::grade_rank;

    let csp_grade = str_or(entry, &["http", "grade"], "F");
    let tls_grade = str_or(entry, &["tls", "grade"], "F");
    let http_grade = str_or(entry, &["html", "grade"], "");
    let has_analytics = bool_or(entry, &["analytics"], true);
    let is_onion = str_or(entry, &["network_type"], "").eq_ignore_ascii_case("tor");
    let has_dnssec = bool_or(entry, &["network", "dnssec"], false);
    let fork = str_or(entry, &["generator"], "").to_lowercase();

    if grade_rank(&csp_grade) < grade_rank(&criteria.minimum_csp_grade) {
        return false;
    }
    if grade_rank(&tls_grade) < grade_rank(&criteria.minimum_tls_grade) {
        return false;
    }
    if !criteria.allows_http_grade(&http_grade) {
        return false;
    }
    if has_analytics && !criteria.allow_analytics {
        return false;
    }
    if is_onion != criteria.require_onion {
        return false;
    }
    if !has_dnssec && criteria.require_dnssec {
        return false;
    }
    if fork == "searx" && criteria.searxng_preference == SearxngPreference::Required {
        return false;
    }
    if fork == "searxng" && criteria.searxng_preference == SearxngPreference::Forbidden {
        return false;
    }

    true
}

fn entry_timings(entry: &Value) -> Timings {
    Timings::new(
        Timing::from(f64_at(entry, &INITIAL_PATH)),
        Timing::from(f64_at(entry, &SEARCH_PATH)),
        Timing::from(f64_at(entry, &IMAGE_SEARCH_PATH)),
        Timing::from(f64_at(entry, &WIKIPEDIA_PATH)),
    )
}

fn is_blacklisted(url: &str, blacklist: &[String]) -> bool {
    let Some(host) = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
    else {
        // Unparseable URL: drop it rather than forward to it later.
        return true;
    };

    blacklist.iter().any(|entry| {
        reqwest::Url::parse(entry)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .is_some_and(|h| h == host)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A directory entry that passes the default criteria.
    fn good_entry() -> Value {
        json!({
            "timing": {
                "initial": { "all": { "value": 0.5 } },
                "search": { "all": { "median": 1.0 } },
                "search_go": { "all": { "median": 1.5 } },
                "search_wp": { "all": { "median": 0.8 } },
            },
            "http": { "grade": "A+" },
            "tls": { "grade": "A" },
            "html": { "grade": "V" },
            "analytics": false,
            "network_type": "normal",
            "network": { "dnssec": true },
            "generator": "searxng",
        })
    }

    fn doc_with(entries: Vec<(&str, Value)>) -> Value {
        let mut map = serde_json::Map::new();
        for (url, entry) in entries {
            map.insert(url.to_string(), entry);
        }
        json!({ "instances": map })
    }

    #[test]
    fn test_missing_instances_map_is_source_unavailable() {
        let err = normalize(&json!({"meta": {}}), &Criteria::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[test]
    fn test_admits_good_entry_with_timings() {
        let doc = doc_with(vec![("https://searx.example", good_entry())]);
        let instances = normalize(&doc, &Criteria::default(), &[]).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, "https://searx.example");
        assert_eq!(instances[0].timings.initial, Timing::Measured(0.5));
        assert_eq!(instances[0].timings.image_search, Timing::Measured(1.5));
    }

    #[test]
    fn test_entry_without_timing_is_skipped() {
        let mut entry = good_entry();
        entry.as_object_mut().unwrap().remove("timing");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &Criteria::default(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_metric_becomes_unmeasured() {
        let mut entry = good_entry();
        entry["timing"]
            .as_object_mut()
            .unwrap()
            .remove("search_wp");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        let instances = normalize(&doc, &Criteria::default(), &[]).unwrap();
        assert_eq!(instances[0].timings.wikipedia, Timing::Unmeasured);
        assert!(instances[0].timings.search.is_measured());
    }

    #[test]
    fn test_csp_grade_below_minimum_rejected() {
        let mut entry = good_entry();
        entry["http"]["grade"] = json!("D");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &Criteria::default(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_grades_default_to_f_and_reject() {
        let mut entry = good_entry();
        entry.as_object_mut().unwrap().remove("http");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        // Default minimum csp grade is C; the implied F fails it.
        assert!(normalize(&doc, &Criteria::default(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_analytics_rejected_when_disallowed() {
        let mut criteria = Criteria::default();
        criteria.allow_analytics = false;

        let mut entry = good_entry();
        entry["analytics"] = json!(true);
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());

        // Missing analytics defaults to true and is also rejected.
        let mut entry = good_entry();
        entry.as_object_mut().unwrap().remove("analytics");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_onion_must_match_policy() {
        let mut entry = good_entry();
        entry["network_type"] = json!("tor");
        let doc = doc_with(vec![("http://x.onion", entry)]);
        assert!(normalize(&doc, &Criteria::default(), &[]).unwrap().is_empty());

        let mut criteria = Criteria::default();
        criteria.require_onion = true;
        let doc = doc_with(vec![("https://searx.example", good_entry())]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dnssec_required() {
        let mut criteria = Criteria::default();
        criteria.require_dnssec = true;

        let mut entry = good_entry();
        entry["network"]["dnssec"] = json!(false);
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());

        let doc = doc_with(vec![("https://searx.example", good_entry())]);
        assert_eq!(normalize(&doc, &criteria, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_searx_fork_excluded_when_searxng_required() {
        let mut criteria = Criteria::default();
        criteria.searxng_preference = SearxngPreference::Required;

        // Grades are perfect; the fork alone must exclude it.
        let mut entry = good_entry();
        entry["generator"] = json!("searx");
        let doc = doc_with(vec![("https://searx.example", entry)]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_searxng_fork_excluded_when_forbidden() {
        let mut criteria = Criteria::default();
        criteria.searxng_preference = SearxngPreference::Forbidden;

        let doc = doc_with(vec![("https://searx.example", good_entry())]);
        assert!(normalize(&doc, &criteria, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_url_is_dropped() {
        // A key that cannot be parsed as a URL can never be probed or
        // forwarded to, so it is dropped at admission regardless of the
        // blacklist contents.
        let doc = doc_with(vec![
            ("not a url at all", good_entry()),
            ("https://good.example", good_entry()),
        ]);
        let instances = normalize(&doc, &Criteria::default(), &[]).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, "https://good.example");
    }

    #[test]
    fn test_blacklist_matches_by_host() {
        let doc = doc_with(vec![
            ("https://bad.example/search", good_entry()),
            ("https://good.example", good_entry()),
        ]);
        let blacklist = vec!["https://bad.example".to_string()];
        let instances = normalize(&doc, &Criteria::default(), &blacklist).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, "https://good.example");
    }
}
