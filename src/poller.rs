//! # Pipeline Poller
//!
//! Background task that periodically asks the registry for enabled
//! providers, fetches each one's pipelines, and reconciles the results into
//! the cache. Owns its own lifecycle (start/stop) independently of the HTTP
//! layer: a cycle failure is logged and retried, never fatal; only an
//! explicit stop request ends the loop.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PollerConfig;
use crate::providers::{Provider, ProviderRegistry};
use crate::repositories::PipelineCache;

enum PollerState {
    Idle,
    Running {
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    },
}

/// Background poller service. Cloning yields another handle onto the same
/// loop state.
#[derive(Clone)]
pub struct PipelinePoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    registry: Arc<ProviderRegistry>,
    cache: PipelineCache,
    default_interval: Duration,
    stop_join_timeout: Duration,
    state: tokio::sync::Mutex<PollerState>,
}

impl PipelinePoller {
    /// Create a new poller over the given registry and cache.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: PipelineCache,
        config: &PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                registry,
                cache,
                default_interval: Duration::from_secs(config.default_interval_seconds),
                stop_join_timeout: Duration::from_secs(config.stop_join_timeout_seconds),
                state: tokio::sync::Mutex::new(PollerState::Idle),
            }),
        }
    }

    /// Start the background loop. A no-op (logged) when already running.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if matches!(*state, PollerState::Running { .. }) {
            warn!("pipeline poller already running");
            return;
        }

        let shutdown = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { inner.run_loop(token).await });

        *state = PollerState::Running { shutdown, handle };
        info!("pipeline poller started");
    }

    /// Request the loop to stop and wait for it to exit, up to a bounded
    /// join timeout. Does not cancel a remote call already in flight; it
    /// prevents the next cycle from starting.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        match std::mem::replace(&mut *state, PollerState::Idle) {
            PollerState::Idle => {
                debug!("pipeline poller not running; stop is a no-op");
            }
            PollerState::Running { shutdown, handle } => {
                info!("pipeline poller stopping");
                shutdown.cancel();
                match timeout(self.inner.stop_join_timeout, handle).await {
                    Ok(Ok(())) => info!("pipeline poller stopped"),
                    Ok(Err(err)) => error!(error = ?err, "pipeline poller task failed"),
                    Err(_) => warn!(
                        timeout = ?self.inner.stop_join_timeout,
                        "pipeline poller did not exit within the join timeout"
                    ),
                }
            }
        }
    }

    /// Whether the background loop is currently active.
    pub async fn is_running(&self) -> bool {
        matches!(*self.inner.state.lock().await, PollerState::Running { .. })
    }

    /// Run one fetch-and-reconcile cycle and return the next sleep duration.
    /// Exposed for the `poll` CLI subcommand and tests.
    pub async fn poll_once(&self) -> anyhow::Result<Duration> {
        self.inner.poll_once().await
    }
}

impl PollerInner {
    #[instrument(skip_all)]
    async fn run_loop(&self, shutdown: CancellationToken) {
        loop {
            let cycle_started = Instant::now();
            let sleep_for = match self.poll_once().await {
                Ok(next) => next,
                Err(err) => {
                    error!(error = ?err, "poller cycle failed");
                    counter!("poller_cycle_failures_total").increment(1);
                    self.default_interval
                }
            };
            histogram!("poller_cycle_duration_ms")
                .record(cycle_started.elapsed().as_secs_f64() * 1_000.0);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(sleep_for) => {}
            }
        }
    }

    /// One fetch-and-reconcile cycle.
    ///
    /// Reads a fresh enabled-provider snapshot each call so providers added,
    /// removed or toggled between cycles take effect without a restart. Each
    /// provider is isolated: a fetch or reconcile failure is logged and the
    /// remaining providers still run.
    async fn poll_once(&self) -> anyhow::Result<Duration> {
        let providers = self.registry.get_enabled();
        if providers.is_empty() {
            debug!("no enabled providers; idling");
            return Ok(self.default_interval);
        }

        debug!(providers = providers.len(), "updating cache");

        for provider in &providers {
            let metric_labels = vec![("provider", provider.name().to_string())];
            match provider.fetch_pipelines().await {
                Ok(pipelines) => {
                    match self.cache.reconcile_batch(provider.name(), &pipelines).await {
                        Ok(stats) => {
                            counter!("poller_pipelines_reconciled_total", &metric_labels)
                                .increment(stats.upserted as u64);
                            if stats.failed > 0 {
                                warn!(
                                    provider = %provider.name(),
                                    failed = stats.failed,
                                    "some pipeline records failed to save"
                                );
                            }
                        }
                        Err(err) => {
                            counter!("poller_reconcile_failures_total", &metric_labels)
                                .increment(1);
                            error!(
                                provider = %provider.name(),
                                error = %err,
                                "failed to reconcile provider batch"
                            );
                        }
                    }
                }
                Err(err) => {
                    counter!("poller_fetch_failures_total", &metric_labels).increment(1);
                    warn!(
                        provider = %provider.name(),
                        error = %err,
                        "fetch failed; provider contributes nothing this cycle"
                    );
                }
            }
        }

        Ok(next_sleep_interval(
            providers.iter().map(|p| p.config().refresh_interval),
            self.default_interval,
        ))
    }
}

/// Next sleep duration: the minimum refresh interval across currently
/// enabled providers, falling back to the poller default when that minimum
/// is zero or undefined. This couples the global tick rate to the most
/// demanding provider.
fn next_sleep_interval(
    intervals: impl IntoIterator<Item = u64>,
    default_interval: Duration,
) -> Duration {
    intervals
        .into_iter()
        .filter(|&seconds| seconds > 0)
        .min()
        .map(Duration::from_secs)
        .unwrap_or(default_interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(30);

    #[test]
    fn next_sleep_is_minimum_interval() {
        assert_eq!(
            next_sleep_interval([10, 30], DEFAULT),
            Duration::from_secs(10)
        );
        assert_eq!(
            next_sleep_interval([30, 10], DEFAULT),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn next_sleep_falls_back_to_default_when_undefined() {
        assert_eq!(next_sleep_interval([], DEFAULT), DEFAULT);
    }

    #[test]
    fn next_sleep_ignores_zero_intervals() {
        assert_eq!(next_sleep_interval([0, 0], DEFAULT), DEFAULT);
        assert_eq!(
            next_sleep_interval([0, 45], DEFAULT),
            Duration::from_secs(45)
        );
    }
}
