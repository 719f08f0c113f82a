//! Refresh orchestration.
//!
//! Runs the full pipeline (fetch, normalize, score, probe-refine) and
//! persists the ranked list. Invocations inside the refresh interval are
//! idempotent skips that return the prior list. The last-run marker only
//! advances after a fully successful run, so a failed refresh is retried on
//! the next invocation instead of waiting out the interval.

use crate::config::Config;
use crate::fetcher::{normalize, InstanceSource};
use crate::judge;
use crate::probe::Prober;
use scout_common::{Criteria, Error, RankedList};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct Updater<S, P> {
    config: Config,
    criteria: Criteria,
    source: S,
    prober: Arc<P>,
    last_run: Option<Instant>,
    last_list: Option<RankedList>,
}

impl<S: InstanceSource, P: Prober + 'static> Updater<S, P> {
    pub fn new(config: Config, criteria: Criteria, source: S, prober: P) -> Self {
        Self {
            config,
            criteria,
            source,
            prober: Arc::new(prober),
            last_run: None,
            last_list: None,
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.updater.update_interval_mins * 60)
    }

    /// Refresh with the current wall clock.
    pub async fn update(&mut self) -> Result<RankedList, Error> {
        self.update_at(Instant::now()).await
    }

    /// Refresh relative to an injected clock value.
    pub async fn update_at(&mut self, now: Instant) -> Result<RankedList, Error> {
        if let (Some(last), Some(list)) = (self.last_run, &self.last_list) {
            if now.duration_since(last) < self.interval() {
                debug!("Refresh interval not elapsed, keeping current list");
                return Ok(list.clone());
            }
        }

        let doc = self.source.fetch().await?;
        let instances = normalize(
            &doc,
            &self.criteria,
            &self.config.updater.instance_blacklist,
        )?;

        let candidates = judge::find_candidates(
            instances,
            &self.config.updater.weights,
            self.config.updater.outlier_multiplier,
        );
        let candidates = judge::refine_candidates(candidates, Arc::clone(&self.prober)).await;

        let list = RankedList::from_candidates(&candidates);
        list.save(&self.config.updater.stack_path)?;

        info!(
            "Refreshed ranked list: {} candidates, best {}",
            list.len(),
            list.best().map(|e| e.url.as_str()).unwrap_or("<none>")
        );

        self.last_run = Some(now);
        self.last_list = Some(list.clone());
        Ok(list)
    }
}
