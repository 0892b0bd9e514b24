// SPDX-License-Identifier: MIT
//! Connectivity monitor state machine.
//!
//! [`InternetMonitor`] owns the probe schedule: while started, a background
//! task probes the configured URLs on an interval, folds in link-layer
//! up/down transitions, and publishes status changes on a broadcast stream.
//! The stream carries transitions only — consecutive identical probe results
//! produce a single emission.
//!
//! Lifecycle: `configure()` is only accepted while stopped; `start()` and
//! `stop()` are idempotent; `stop()` closes the stream and resets the status
//! memory so the next `start()` begins from `Unknown`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigError, ConfigPatch, MonitorConfig};
use crate::link::{AssumedUp, LinkSignal};
use crate::probe::Prober;
use crate::status::{self, ConnectionStatus};

/// Status transitions are rare, so a small buffer is enough for even a
/// sluggish subscriber.
const STATUS_CHANNEL_CAPACITY: usize = 64;

struct MonitorInner {
    config: MonitorConfig,
    started: bool,
    last_status: ConnectionStatus,
    /// Incremented on every `start()`. Stale probe loops from a previous
    /// cycle detect the mismatch and discard their result instead of
    /// mutating state that no longer belongs to them.
    epoch: u64,
    status_tx: Option<broadcast::Sender<bool>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

/// Monitors internet connectivity by periodic probing.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct InternetMonitor {
    inner: Arc<RwLock<MonitorInner>>,
    link: Arc<dyn LinkSignal>,
    prober: Arc<Prober>,
}

impl Default for InternetMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl InternetMonitor {
    /// Monitor with default configuration and no real link-layer signal
    /// (probing alone decides the status).
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default(), Arc::new(AssumedUp::default()))
    }

    /// Monitor with default configuration and the given link signal source.
    pub fn with_link(link: Arc<dyn LinkSignal>) -> Self {
        Self::with_config(MonitorConfig::default(), link)
    }

    pub fn with_config(config: MonitorConfig, link: Arc<dyn LinkSignal>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MonitorInner {
                config,
                started: false,
                last_status: ConnectionStatus::Unknown,
                epoch: 0,
                status_tx: None,
                shutdown_tx: None,
            })),
            link,
            prober: Arc::new(Prober::new()),
        }
    }

    /// Overlay configuration fields. Rejected while the monitor is running;
    /// stop() first, reconfigure, then start() again.
    pub async fn configure(&self, patch: ConfigPatch) -> Result<(), ConfigError> {
        let mut state = self.inner.write().await;
        if state.started {
            warn!("configure() ignored while the monitor is running");
            return Err(ConfigError::MonitorRunning);
        }
        state.config.apply(patch);
        Ok(())
    }

    /// Start monitoring and return a receiver on the status stream.
    ///
    /// Idempotent: while already started, this subscribes to the existing
    /// stream without disturbing the schedule. On a fresh start the first
    /// emission is unconditional — `Offline` immediately if the link is
    /// down, otherwise the result of an immediate probe.
    pub async fn start(&self) -> broadcast::Receiver<bool> {
        let mut state = self.inner.write().await;
        if state.started {
            if let Some(tx) = &state.status_tx {
                debug!("start() called while already started");
                return tx.subscribe();
            }
        }

        state.started = true;
        state.epoch += 1;
        let epoch = state.epoch;

        let (status_tx, status_rx) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        state.status_tx = Some(status_tx.clone());
        state.shutdown_tx = Some(shutdown_tx);

        let link_rx = self.link.subscribe();
        let link_up = self.link.currently_up();
        if !link_up {
            // Link-layer down is authoritative: emit offline without probing.
            state.last_status = ConnectionStatus::Offline;
            let _ = status_tx.send(false);
            info!("link down at start; reporting offline without probing");
        } else {
            info!(
                urls = state.config.probe_urls.len(),
                interval_ms = state.config.poll_interval_ms,
                "connectivity monitor started"
            );
        }
        drop(state);

        tokio::spawn(run_probe_loop(
            self.inner.clone(),
            self.prober.clone(),
            status_tx,
            shutdown_rx,
            link_rx,
            link_up,
            epoch,
        ));

        status_rx
    }

    /// Stop monitoring.
    ///
    /// Idempotent. Cancels any scheduled or in-flight probe, closes the
    /// status stream (subscribers observe `RecvError::Closed`), and resets
    /// the status memory and round-robin position.
    pub async fn stop(&self) {
        let mut state = self.inner.write().await;
        if !state.started {
            return;
        }
        state.started = false;
        state.last_status = ConnectionStatus::Unknown;
        if let Some(shutdown_tx) = state.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        // The probe task drops its sender clone on exit, closing the stream.
        state.status_tx = None;
        self.prober.reset();
        info!("connectivity monitor stopped");
    }

    pub async fn is_started(&self) -> bool {
        self.inner.read().await.started
    }

    /// Last published status; `Unknown` before the first emission of the
    /// current start/stop cycle.
    pub async fn last_status(&self) -> ConnectionStatus {
        self.inner.read().await.last_status
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> MonitorConfig {
        self.inner.read().await.config.clone()
    }

    /// Subscribe to the live status stream of a running monitor.
    ///
    /// Returns `None` (with a diagnostic) when the monitor is stopped —
    /// there is no stream to observe until `start()`.
    pub async fn live_status(&self) -> Option<broadcast::Receiver<bool>> {
        let state = self.inner.read().await;
        if state.started {
            state.status_tx.as_ref().map(|tx| tx.subscribe())
        } else {
            error!("live status requested before start()");
            None
        }
    }

    /// One on-demand probe outside the schedule, usable whether or not the
    /// monitor is started. Shares the round-robin rotation with scheduled
    /// probes and never fails — all transport errors resolve `false`.
    pub async fn check_once(&self) -> bool {
        let (urls, timeout) = {
            let state = self.inner.read().await;
            (
                Arc::<[String]>::from(state.config.probe_urls.as_slice()),
                state.config.request_timeout(),
            )
        };
        self.prober.probe_once(&urls, timeout).await
    }
}

/// Apply the transition rule and publish. A completion racing `stop()` (or a
/// stale loop from a previous cycle) detects the epoch mismatch and becomes
/// a no-op.
async fn publish(
    inner: &RwLock<MonitorInner>,
    status_tx: &broadcast::Sender<bool>,
    online: bool,
    epoch: u64,
) {
    let mut state = inner.write().await;
    if !state.started || state.epoch != epoch {
        return;
    }
    match status::next_emission(state.last_status, online) {
        Some(next) => {
            state.last_status = next;
            info!(status = %next, "connectivity changed");
            // No subscribers is fine.
            let _ = status_tx.send(online);
        }
        None => trace!(online, "status unchanged; nothing emitted"),
    }
}

fn start_probe(
    prober: &Arc<Prober>,
    urls: &Arc<[String]>,
    timeout: Duration,
) -> BoxFuture<'static, bool> {
    let prober = Arc::clone(prober);
    let urls = Arc::clone(urls);
    async move { prober.probe_once(&urls, timeout).await }.boxed()
}

/// Resolve the in-flight probe, or park forever when none is pending. The
/// boxed future stays in the slot, so polling resumes where it left off.
async fn probe_completion(in_flight: &mut Option<BoxFuture<'static, bool>>) -> bool {
    match in_flight {
        Some(probe) => probe.await,
        None => std::future::pending().await,
    }
}

/// Background probe loop for one start/stop cycle.
///
/// Two sources schedule work: the interval timer (suspended while the link
/// is down) and link transitions. At most one probe is authoritative at a
/// time — a new cycle replaces (and thereby aborts) a still-pending probe so
/// a stale slow response can never overwrite a fresher verdict.
async fn run_probe_loop(
    inner: Arc<RwLock<MonitorInner>>,
    prober: Arc<Prober>,
    status_tx: broadcast::Sender<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut link_rx: watch::Receiver<bool>,
    initially_up: bool,
    epoch: u64,
) {
    let (urls, poll_interval, timeout) = {
        let state = inner.read().await;
        (
            Arc::<[String]>::from(state.config.probe_urls.as_slice()),
            state.config.poll_interval(),
            state.config.request_timeout(),
        )
    };

    let mut interval = tokio::time::interval(poll_interval);
    interval.tick().await; // consume the immediate first tick
    let mut timer_active = initially_up;
    let mut link_alive = true;
    let mut in_flight: Option<BoxFuture<'static, bool>> = if initially_up {
        Some(start_probe(&prober, &urls, timeout))
    } else {
        None
    };

    loop {
        tokio::select! {
            // Ordered: shutdown and link transitions outrank a completed
            // probe, which outranks the next tick.
            biased;

            _ = shutdown_rx.changed() => {
                debug!("probe loop shutting down");
                break;
            }

            changed = link_rx.changed(), if link_alive => {
                if changed.is_err() {
                    // Signal source dropped; keep probing on the timer alone.
                    warn!("link signal source went away");
                    link_alive = false;
                    continue;
                }
                let up = *link_rx.borrow_and_update();
                if up {
                    info!("link came up; probing to confirm reachability");
                    in_flight = Some(start_probe(&prober, &urls, timeout));
                    interval.reset();
                    timer_active = true;
                } else {
                    info!("link went down; suspending probes");
                    // Dropping the future aborts the underlying request; its
                    // eventual result is discarded, not emitted.
                    in_flight = None;
                    timer_active = false;
                    publish(&inner, &status_tx, false, epoch).await;
                }
            }

            online = probe_completion(&mut in_flight) => {
                in_flight = None;
                publish(&inner, &status_tx, online, epoch).await;
            }

            _ = interval.tick(), if timer_active => {
                if in_flight.is_some() {
                    trace!("previous probe still pending at tick; replacing it");
                }
                in_flight = Some(start_probe(&prober, &urls, timeout));
            }
        }
    }
    // Sender clone drops here; once the handle side is also cleared the
    // stream is closed and subscribers unblock.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ManualLink;

    fn offline_monitor() -> (InternetMonitor, Arc<ManualLink>) {
        let link = Arc::new(ManualLink::new(false));
        (InternetMonitor::with_link(link.clone()), link)
    }

    #[tokio::test]
    async fn starts_stopped_with_unknown_status() {
        let monitor = InternetMonitor::new();
        assert!(!monitor.is_started().await);
        assert_eq!(monitor.last_status().await, ConnectionStatus::Unknown);
    }

    #[tokio::test]
    async fn start_with_link_down_emits_offline_without_probing() {
        let (monitor, _link) = offline_monitor();
        let mut rx = monitor.start().await;
        assert_eq!(rx.recv().await.unwrap(), false);
        assert_eq!(monitor.last_status().await, ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent() {
        let (monitor, _link) = offline_monitor();
        let mut rx1 = monitor.start().await;
        let mut rx2 = monitor.start().await;
        assert!(monitor.is_started().await);

        // Both receivers observe the same single emission of this cycle.
        assert_eq!(rx1.recv().await.unwrap(), false);
        // The second start() subscribed after the emission, so it sees
        // nothing new — but the channel must still be the live one.
        assert!(matches!(
            tokio::time::timeout(Duration::from_millis(50), rx2.recv()).await,
            Err(_)
        ));

        monitor.stop().await;
        monitor.stop().await;
        assert!(!monitor.is_started().await);
    }

    #[tokio::test]
    async fn stop_resets_status_and_closes_the_stream() {
        let (monitor, _link) = offline_monitor();
        let mut rx = monitor.start().await;
        assert_eq!(rx.recv().await.unwrap(), false);

        monitor.stop().await;
        assert_eq!(monitor.last_status().await, ConnectionStatus::Unknown);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn restart_emits_again_even_for_the_same_status() {
        let (monitor, _link) = offline_monitor();
        let mut rx = monitor.start().await;
        assert_eq!(rx.recv().await.unwrap(), false);

        monitor.stop().await;
        let mut rx = monitor.start().await;
        // Fresh cycle starts from Unknown, so the duplicate is emitted.
        assert_eq!(rx.recv().await.unwrap(), false);
    }

    #[tokio::test]
    async fn configure_is_rejected_while_running() {
        let (monitor, _link) = offline_monitor();
        monitor.start().await;

        let before = monitor.config().await;
        let result = monitor
            .configure(ConfigPatch {
                urls: Some(vec!["http://probe.example/x".into()]),
                interval_ms: Some(5),
                timeout_ms: Some(5),
            })
            .await;
        assert!(matches!(result, Err(ConfigError::MonitorRunning)));

        let after = monitor.config().await;
        assert_eq!(after.probe_urls, before.probe_urls);
        assert_eq!(after.poll_interval_ms, before.poll_interval_ms);
        assert_eq!(after.request_timeout_ms, before.request_timeout_ms);
    }

    #[tokio::test]
    async fn configure_applies_while_stopped() {
        let monitor = InternetMonitor::new();
        monitor
            .configure(ConfigPatch {
                urls: Some(vec!["http://probe.example/a".into()]),
                interval_ms: Some(100),
                timeout_ms: Some(100),
            })
            .await
            .unwrap();
        let config = monitor.config().await;
        assert_eq!(config.probe_urls, vec!["http://probe.example/a"]);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[tokio::test]
    async fn live_status_requires_start() {
        let (monitor, _link) = offline_monitor();
        assert!(monitor.live_status().await.is_none());
        monitor.start().await;
        assert!(monitor.live_status().await.is_some());
        monitor.stop().await;
        assert!(monitor.live_status().await.is_none());
    }

    #[tokio::test]
    async fn check_once_normalizes_failures_to_false() {
        let monitor = InternetMonitor::new();
        monitor
            .configure(ConfigPatch {
                urls: Some(vec!["http://192.0.2.1/".into()]),
                interval_ms: None,
                timeout_ms: Some(200),
            })
            .await
            .unwrap();
        // Works without start(); unreachable target is simply offline.
        assert!(!monitor.check_once().await);
        assert!(!monitor.is_started().await);
    }
}
