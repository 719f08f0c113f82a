//! scoutd - keeps a ranked list of the best public SearXNG instances.
//!
//! Fetches the searx.space directory, filters it against the admission
//! criteria, scores what's left, live-probes the survivors and persists the
//! result for the forwarding proxy to consume.

use anyhow::Result;
use scout_common::{Criteria, RankedList};
use scoutd::config::Config;
use scoutd::fetcher::HttpSource;
use scoutd::probe::TcpProber;
use scoutd::updater::Updater;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("scoutd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    let violations = config.validate();
    if !violations.is_empty() {
        for violation in &violations {
            error!("Config: {}", violation);
        }
        anyhow::bail!("{} configuration problem(s), refusing to start", violations.len());
    }

    let criteria = Criteria::load(&config.updater.criteria_path)?;
    info!("Criteria loaded from {}", config.updater.criteria_path.display());

    // Until the first refresh lands, consumers get the default instance.
    if !config.updater.stack_path.exists() {
        RankedList::fallback(&config.default_instance).save(&config.updater.stack_path)?;
        info!(
            "No ranked list yet, seeded {} with {}",
            config.updater.stack_path.display(),
            config.default_instance
        );
    }

    let source = HttpSource::new(&config.updater.instances_url);
    let mut updater = Updater::new(config, criteria, source, TcpProber);

    // Tick well below the refresh interval; the updater enforces the
    // interval itself, so a failed run is retried on the next tick rather
    // than a full interval later.
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
        tick.tick().await;
        match updater.update().await {
            Ok(list) => {
                if let Some(best) = list.best() {
                    info!("Best instance: {} [{:.2}]", best.url, best.score);
                }
            }
            Err(e) => warn!("Refresh failed, will retry: {}", e),
        }
    }
}
