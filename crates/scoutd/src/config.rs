//! Configuration for scoutd.
//!
//! Loads settings from /etc/scout/config.toml or uses defaults. The criteria
//! policy lives in its own JSON file (see `scout_common::criteria`); this file
//! holds the operational knobs: port, refresh interval, directory URL, metric
//! weights, outlier multiplier and file locations.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/scout/config.toml";

/// Settings published for the forwarding proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Port the forwarding proxy listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Per-metric response-time weights. A higher weight makes a metric count
/// for more: it tightens that metric's outlier bound and shrinks its share
/// of the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_initial_weight")]
    pub initial: f64,

    #[serde(default = "default_search_weight")]
    pub search: f64,

    #[serde(default = "default_image_search_weight")]
    pub image_search: f64,

    #[serde(default = "default_wikipedia_weight")]
    pub wikipedia: f64,
}

fn default_initial_weight() -> f64 {
    1.2
}

fn default_search_weight() -> f64 {
    1.2
}

fn default_image_search_weight() -> f64 {
    0.6
}

fn default_wikipedia_weight() -> f64 {
    0.8
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            initial: default_initial_weight(),
            search: default_search_weight(),
            image_search: default_image_search_weight(),
            wikipedia: default_wikipedia_weight(),
        }
    }
}

/// Updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Minutes between full refresh runs
    #[serde(default = "default_update_interval")]
    pub update_interval_mins: u64,

    /// Instance directory URL
    #[serde(default = "default_instances_url")]
    pub instances_url: String,

    /// Criteria policy file (JSON)
    #[serde(default = "default_criteria_path")]
    pub criteria_path: PathBuf,

    /// Persisted ranked candidate list
    #[serde(default = "default_stack_path")]
    pub stack_path: PathBuf,

    /// Instances never admitted, matched by host
    #[serde(default)]
    pub instance_blacklist: Vec<String>,

    #[serde(default)]
    pub weights: Weights,

    /// A metric is an outlier when value * weight > cohort_avg * multiplier
    #[serde(default = "default_outlier_multiplier")]
    pub outlier_multiplier: f64,
}

fn default_update_interval() -> u64 {
    180
}

fn default_instances_url() -> String {
    "https://searx.space/data/instances.json".to_string()
}

fn default_criteria_path() -> PathBuf {
    PathBuf::from("/var/lib/scout/criteria.json")
}

fn default_stack_path() -> PathBuf {
    PathBuf::from("/var/lib/scout/candidates.json")
}

fn default_outlier_multiplier() -> f64 {
    2.0
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            update_interval_mins: default_update_interval(),
            instances_url: default_instances_url(),
            criteria_path: default_criteria_path(),
            stack_path: default_stack_path(),
            instance_blacklist: Vec::new(),
            weights: Weights::default(),
            outlier_multiplier: default_outlier_multiplier(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance handed to consumers while no ranked list exists yet
    #[serde(default = "default_instance")]
    pub default_instance: String,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub updater: UpdaterConfig,
}

fn default_instance() -> String {
    "https://paulgo.io".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_instance: default_instance(),
            proxy: ProxyConfig::default(),
            updater: UpdaterConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH).unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            Config::default()
        })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path);
        Ok(config)
    }

    /// Validate the loaded values. Returns every violation instead of
    /// stopping at the first one.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if reqwest::Url::parse(&self.default_instance).is_err() {
            errors.push(format!(
                "default_instance: \"{}\" is not a valid URL",
                self.default_instance
            ));
        }

        if reqwest::Url::parse(&self.updater.instances_url).is_err() {
            errors.push(format!(
                "updater.instances_url: \"{}\" is not a valid URL",
                self.updater.instances_url
            ));
        }

        if self.updater.update_interval_mins == 0 {
            errors.push("updater.update_interval_mins: must be at least 1".to_string());
        }

        let weight_checks = [
            ("initial", self.updater.weights.initial),
            ("search", self.updater.weights.search),
            ("image_search", self.updater.weights.image_search),
            ("wikipedia", self.updater.weights.wikipedia),
        ];
        for (name, w) in weight_checks {
            if !(w > 0.0 && w < 2.0) {
                errors.push(format!(
                    "updater.weights.{}: {} is out of range (0 < w < 2)",
                    name, w
                ));
            }
        }

        if self.updater.outlier_multiplier <= 0.0 {
            errors.push(format!(
                "updater.outlier_multiplier: {} must be positive",
                self.updater.outlier_multiplier
            ));
        }

        for (i, entry) in self.updater.instance_blacklist.iter().enumerate() {
            let has_host = reqwest::Url::parse(entry)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .is_some();
            if !has_host {
                errors.push(format!(
                    "updater.instance_blacklist[{}]: \"{}\" is not a URL with a host",
                    i, entry
                ));
            }
        }

        errors
    }
}
