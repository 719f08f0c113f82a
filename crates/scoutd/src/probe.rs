//! Two-tier liveness probes.
//!
//! The directory's published timings can be stale, so score-surviving
//! candidates get a live reachability check: a cheap bulk pass over every
//! candidate at once, then a slower, more tolerant pass for anything the
//! bulk pass called dead. Probes are plain TCP connects, so no raw-socket
//! privilege is needed.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

/// Bulk pass: 4 connects, 200 ms apart, 1 s timeout each.
pub const BULK_COUNT: u32 = 4;
pub const BULK_INTERVAL: Duration = Duration::from_millis(200);
pub const BULK_TIMEOUT: Duration = Duration::from_secs(1);

/// Intensive pass: 8 connects, 2 s apart, 4 s timeout each.
pub const INTENSIVE_COUNT: u32 = 8;
pub const INTENSIVE_INTERVAL: Duration = Duration::from_secs(2);
pub const INTENSIVE_TIMEOUT: Duration = Duration::from_secs(4);

/// Outcome of probing one address.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub addr: String,
    pub avg_rtt: Duration,
    pub is_alive: bool,
    /// Fraction of connect attempts that failed.
    pub packet_loss: f64,
}

/// `host:port` connect target for an instance URL.
pub fn socket_addr_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;
    Some(format!("{}:{}", host, port))
}

/// Connect to `addr` `count` times, `interval` apart, each attempt bounded
/// by `per_try_timeout`. Connection errors and resolution failures count as
/// lost attempts; they never propagate.
pub async fn probe_addr(
    addr: &str,
    count: u32,
    interval: Duration,
    per_try_timeout: Duration,
) -> ProbeReport {
    let mut rtts: Vec<Duration> = Vec::with_capacity(count as usize);
    let mut lost = 0u32;

    for attempt in 0..count {
        let started = Instant::now();
        match timeout(per_try_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => rtts.push(started.elapsed()),
            Ok(Err(e)) => {
                debug!("Probe connect to {} failed: {}", addr, e);
                lost += 1;
            }
            Err(_) => {
                debug!("Probe connect to {} timed out", addr);
                lost += 1;
            }
        }

        if attempt + 1 < count {
            sleep(interval).await;
        }
    }

    let avg_rtt = if rtts.is_empty() {
        Duration::ZERO
    } else {
        rtts.iter().sum::<Duration>() / rtts.len() as u32
    };

    ProbeReport {
        addr: addr.to_string(),
        avg_rtt,
        is_alive: !rtts.is_empty(),
        packet_loss: f64::from(lost) / f64::from(count),
    }
}

/// The probing seam: production code connects over TCP, tests substitute
/// pre-configured reports.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short first-pass probe.
    async fn bulk(&self, addr: &str) -> ProbeReport;

    /// Longer, more tolerant second-pass probe.
    async fn intensive(&self, addr: &str) -> ProbeReport;
}

/// Production prober.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn bulk(&self, addr: &str) -> ProbeReport {
        probe_addr(addr, BULK_COUNT, BULK_INTERVAL, BULK_TIMEOUT).await
    }

    async fn intensive(&self, addr: &str) -> ProbeReport {
        probe_addr(addr, INTENSIVE_COUNT, INTENSIVE_INTERVAL, INTENSIVE_TIMEOUT).await
    }
}

#[cfg(test)]
pub mod fake {
    //! Deterministic prober for tests: no sockets, pre-configured liveness.

    use super::{ProbeReport, Prober};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy)]
    pub struct FakeLiveness {
        pub bulk_alive: bool,
        pub intensive_alive: bool,
    }

    pub struct FakeProber {
        targets: HashMap<String, FakeLiveness>,
        bulk_calls: AtomicUsize,
        intensive_calls: AtomicUsize,
    }

    impl FakeProber {
        pub fn new() -> Self {
            Self {
                targets: HashMap::new(),
                bulk_calls: AtomicUsize::new(0),
                intensive_calls: AtomicUsize::new(0),
            }
        }

        /// Everything probed is alive on the first pass.
        pub fn all_alive() -> Self {
            Self::new()
        }

        pub fn target(mut self, addr: &str, bulk_alive: bool, intensive_alive: bool) -> Self {
            self.targets.insert(
                addr.to_string(),
                FakeLiveness {
                    bulk_alive,
                    intensive_alive,
                },
            );
            self
        }

        pub fn bulk_calls(&self) -> usize {
            self.bulk_calls.load(Ordering::SeqCst)
        }

        pub fn intensive_calls(&self) -> usize {
            self.intensive_calls.load(Ordering::SeqCst)
        }

        fn report(addr: &str, alive: bool) -> ProbeReport {
            ProbeReport {
                addr: addr.to_string(),
                avg_rtt: Duration::from_millis(10),
                is_alive: alive,
                packet_loss: if alive { 0.0 } else { 1.0 },
            }
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn bulk(&self, addr: &str) -> ProbeReport {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            let alive = self.targets.get(addr).map_or(true, |t| t.bulk_alive);
            Self::report(addr, alive)
        }

        async fn intensive(&self, addr: &str) -> ProbeReport {
            self.intensive_calls.fetch_add(1, Ordering::SeqCst);
            let alive = self.targets.get(addr).map_or(true, |t| t.intensive_alive);
            Self::report(addr, alive)
        }
    }
}
