//! Scores admitted instances and weeds out the ones that should not be
//! forwarded to: per-metric outlier rejection against the cohort average,
//! a composite weighted score, then live probe refinement of the survivors.

use crate::config::Weights;
use crate::probe::{socket_addr_of, Prober};
use scout_common::{Candidate, Instance, Timing, TimingAverages};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A metric fails when it was never measured, is negative, has no defined
/// cohort average, or is anomalously slow relative to the cohort:
/// `value * weight > avg * multiplier`.
pub fn is_outlier(avg: Option<f64>, timing: Timing, weight: f64, multiplier: f64) -> bool {
    let Some(value) = timing.value() else {
        return true;
    };
    if value < 0.0 {
        return true;
    }
    let Some(avg) = avg else {
        // No instance produced a usable measurement for this metric, so
        // none can pass it.
        return true;
    };
    value * weight > avg * multiplier
}

/// Filter outliers and produce candidates sorted by score, best first.
pub fn find_candidates(instances: Vec<Instance>, weights: &Weights, multiplier: f64) -> Vec<Candidate> {
    let avgs = TimingAverages::compute(&instances);

    let mut candidates: Vec<Candidate> = Vec::new();
    for inst in instances {
        let t = inst.timings;
        if is_outlier(avgs.initial, t.initial, weights.initial, multiplier)
            || is_outlier(avgs.search, t.search, weights.search, multiplier)
            || is_outlier(avgs.image_search, t.image_search, weights.image_search, multiplier)
            || is_outlier(avgs.wikipedia, t.wikipedia, weights.wikipedia, multiplier)
        {
            debug!("Rejected {} as an outlier", inst.url);
            continue;
        }

        // All four metrics are measured past this point.
        let score = t.initial.value().unwrap_or_default() * (1.0 / weights.initial)
            + t.search.value().unwrap_or_default() * (1.0 / weights.search)
            + t.image_search.value().unwrap_or_default() * (1.0 / weights.image_search)
            + t.wikipedia.value().unwrap_or_default() * (1.0 / weights.wikipedia);
        let score = (score * 100.0).round() / 100.0;

        candidates.push(Candidate {
            instance: inst,
            score,
        });
    }

    candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
    candidates
}

/// Live-probe the score survivors and drop every candidate that failed both
/// the bulk and the escalated probe. Order is preserved; removal is keyed by
/// endpoint URL and applied in one pass after all probes have settled.
pub async fn refine_candidates<P: Prober + 'static>(
    candidates: Vec<Candidate>,
    prober: Arc<P>,
) -> Vec<Candidate> {
    let mut dead: HashSet<String> = HashSet::new();
    let mut targets: Vec<(String, String)> = Vec::new();

    for c in &candidates {
        match socket_addr_of(&c.instance.url) {
            Some(addr) => targets.push((c.instance.url.clone(), addr)),
            None => {
                warn!("Cannot derive probe address for {}, dropping", c.instance.url);
                dead.insert(c.instance.url.clone());
            }
        }
    }

    // Bulk pass over every candidate at once. This is an all-complete
    // barrier: results are only acted on once every probe has reported.
    let mut join_set = JoinSet::new();
    for (url, addr) in targets {
        let prober = Arc::clone(&prober);
        join_set.spawn(async move {
            let report = prober.bulk(&addr).await;
            (url, addr, report)
        });
    }

    let mut suspects: Vec<(String, String)> = Vec::new();
    while let Some(res) = join_set.join_next().await {
        if let Ok((url, addr, report)) = res {
            if !report.is_alive {
                debug!("{} missed the bulk probe, escalating", url);
                suspects.push((url, addr));
            }
        }
    }

    // Escalations run concurrently and independently; outcomes are
    // collected and removals applied afterwards in a single pass.
    let mut join_set = JoinSet::new();
    for (url, addr) in suspects {
        let prober = Arc::clone(&prober);
        join_set.spawn(async move {
            let report = prober.intensive(&addr).await;
            (url, report)
        });
    }

    while let Some(res) = join_set.join_next().await {
        if let Ok((url, report)) = res {
            if !report.is_alive {
                info!("{} failed both probe tiers, dropping", url);
                dead.insert(url);
            }
        }
    }

    if dead.is_empty() {
        return candidates;
    }

    candidates
        .into_iter()
        .filter(|c| !dead.contains(&c.instance.url))
        .collect()
}
