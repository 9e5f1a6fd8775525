//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: a single probe call tests whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: more than reset_timeout since the last failure
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream dependency (see `registry.rs`)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering a recovering upstream)
//! - The per-call timeout drops the losing future, cancelling the call
//! - State lives behind a std mutex that is never held across an await
//! - Settings can be swapped at runtime; counters and state are kept

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{timeout, Instant};

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::ResilienceError;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime counters for one breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    /// Unix time in milliseconds of the last state change.
    pub last_state_change: u64,
}

/// Read-only view of a breaker, suitable for health responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Unix time in milliseconds of the most recent failure.
    pub last_failure_time: Option<u64>,
    pub ms_since_last_failure: Option<u64>,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub stats: BreakerStats,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    /// Start of the open window: the latest failure, or a forced open.
    last_failure: Option<Instant>,
    last_failure_at: Option<SystemTime>,
    probe_in_flight: bool,
    /// Bumped on every transition so stale permits cannot settle a newer probe.
    generation: u64,
    stats: BreakerStats,
}

/// Called with `(name, from, to)` on every transition.
///
/// Runs while the breaker lock is held, so it must not call back into the
/// breaker.
pub type StateChangeHook = Box<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// A circuit breaker guarding calls to one upstream dependency.
pub struct CircuitBreaker {
    name: String,
    config: ArcSwap<BreakerConfig>,
    inner: Mutex<BreakerInner>,
    on_state_change: Option<StateChangeHook>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &self.inner)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        metrics::record_circuit_state(&name, CircuitState::Closed);
        Self {
            name,
            config: ArcSwap::from_pointee(config),
            on_state_change: None,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_at: None,
                probe_in_flight: false,
                generation: 0,
                stats: BreakerStats {
                    last_state_change: unix_millis(SystemTime::now()),
                    ..BreakerStats::default()
                },
            }),
        }
    }

    /// Register a callback for state transitions.
    pub fn with_state_change_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> Arc<BreakerConfig> {
        self.config.load_full()
    }

    /// Swap in new settings. State and counters are kept; a changed
    /// threshold or timeout applies from the next call.
    pub fn update_config(&self, config: BreakerConfig) {
        if *self.config.load_full() == config {
            return;
        }
        tracing::info!(
            circuit = %self.name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            call_timeout_ms = config.call_timeout_ms,
            "Circuit breaker reconfigured"
        );
        self.config.store(Arc::new(config));
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`ResilienceError::CircuitOpen`] without calling `operation`
    /// while the circuit is open, and with [`ResilienceError::Timeout`] when
    /// the call does not settle within `call_timeout_ms`.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let permit = self.admit().map_err(|retry_after| ResilienceError::CircuitOpen {
            name: self.name.clone(),
            retry_after,
        })?;

        let call_timeout = self.config.load().call_timeout();
        match timeout(call_timeout, operation()).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::debug!(circuit = %self.name, probe = permit.probe, error = %e, "Guarded call failed");
                permit.failure();
                Err(ResilienceError::Upstream(e))
            }
            Err(_) => {
                tracing::warn!(
                    circuit = %self.name,
                    timeout_ms = call_timeout.as_millis() as u64,
                    "Guarded call timed out"
                );
                permit.failure();
                Err(ResilienceError::Timeout {
                    name: self.name.clone(),
                    after: call_timeout,
                })
            }
        }
    }

    /// Like [`execute`](Self::execute), but returns `fallback()` instead of
    /// failing when the circuit rejects the call.
    pub async fn execute_with_fallback<T, E, F, Fut, FB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        FB: FnOnce() -> T,
    {
        match self.execute(operation).await {
            Err(ResilienceError::CircuitOpen { .. }) => {
                tracing::debug!(circuit = %self.name, "Circuit open, serving fallback");
                Ok(fallback())
            }
            other => other,
        }
    }

    /// Read-only snapshot for observability.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let config = self.config.load();
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_at.map(unix_millis),
            ms_since_last_failure: inner
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64),
            failure_threshold: config.failure_threshold,
            reset_timeout_ms: config.reset_timeout_ms,
            call_timeout_ms: config.call_timeout_ms,
            stats: inner.stats.clone(),
        }
    }

    /// Force the circuit Closed and clear the failure count.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Force the circuit Open, e.g. for maintenance. It recovers through the
    /// usual Half-Open probe once `reset_timeout_ms` has passed.
    pub fn force_open(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(SystemTime::now());
        self.transition(&mut inner, CircuitState::Open);
    }

    /// Zero the lifetime counters. State and failure count are untouched.
    pub fn reset_stats(&self) {
        let mut inner = self.lock();
        inner.stats = BreakerStats {
            last_state_change: unix_millis(SystemTime::now()),
            ..BreakerStats::default()
        };
        tracing::debug!(circuit = %self.name, "Circuit breaker stats reset");
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed. `Err` carries the time left until
    /// the next probe is admitted.
    fn admit(&self) -> Result<Permit<'_>, Duration> {
        let mut inner = self.lock();
        inner.stats.total_requests += 1;

        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false, inner.generation)),
            CircuitState::Open => {
                let reset_timeout = self.config.load().reset_timeout();
                let elapsed = inner
                    .last_failure
                    .map(|at| Instant::now().saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);

                if elapsed > reset_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Ok(Permit::new(self, true, inner.generation))
                } else {
                    self.reject(&mut inner);
                    Err(reset_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    self.reject(&mut inner);
                    Err(Duration::ZERO)
                } else {
                    inner.probe_in_flight = true;
                    Ok(Permit::new(self, true, inner.generation))
                }
            }
        }
    }

    fn reject(&self, inner: &mut BreakerInner) {
        inner.stats.rejected_requests += 1;
        metrics::record_circuit_rejection(&self.name);
        tracing::debug!(circuit = %self.name, state = %inner.state, "Call rejected by open circuit");
    }

    fn on_success(&self, probe: bool, generation: u64) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.stats.successful_requests += 1;

        if probe && inner.generation == generation {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    fn on_failure(&self, probe: bool, generation: u64) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(SystemTime::now());
        inner.stats.failed_requests += 1;

        let current_probe = probe && inner.generation == generation;
        let threshold_reached = inner.state == CircuitState::Closed
            && inner.failure_count >= self.config.load().failure_threshold;

        if current_probe || threshold_reached {
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    /// A probe future was dropped before it settled.
    fn release_probe(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            tracing::debug!(circuit = %self.name, "Probe abandoned, slot released");
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.generation += 1;
        inner.probe_in_flight = false;
        inner.stats.last_state_change = unix_millis(SystemTime::now());

        match to {
            CircuitState::Open => tracing::warn!(
                circuit = %self.name,
                from = %from,
                failures = inner.failure_count,
                "Circuit breaker OPEN"
            ),
            CircuitState::HalfOpen => tracing::info!(
                circuit = %self.name,
                from = %from,
                "Circuit breaker HALF_OPEN, testing recovery"
            ),
            CircuitState::Closed => tracing::info!(
                circuit = %self.name,
                from = %from,
                "Circuit breaker CLOSED"
            ),
        }
        metrics::record_circuit_transition(&self.name, from, to);
        if let Some(hook) = &self.on_state_change {
            hook(&self.name, from, to);
        }
    }
}

/// Admission ticket for one call.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    generation: u64,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool, generation: u64) -> Self {
        Self {
            breaker,
            probe,
            generation,
            settled: false,
        }
    }

    fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe, self.generation);
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe, self.generation);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Down;

    impl std::fmt::Display for Down {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("upstream down")
        }
    }

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "product",
            BreakerConfig {
                failure_threshold: threshold,
                reset_timeout_ms: reset_ms,
                call_timeout_ms: 10_000,
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> ResilienceError<Down> {
        breaker
            .execute(|| async { Err::<(), _>(Down) })
            .await
            .unwrap_err()
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<&'static str, ResilienceError<Down>> {
        breaker.execute(|| async { Ok::<_, Down>("ok") }).await
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_fails_fast() {
        let breaker = breaker(3, 1000);

        for _ in 0..3 {
            assert!(matches!(fail(&breaker).await, ResilienceError::Upstream(Down)));
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.failure_count(), 3);

        let calls = AtomicU32::new(0);
        let err = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Down>(())
            })
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        match err {
            ResilienceError::CircuitOpen { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_millis(1000));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let breaker = breaker(3, 1000);
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.failure_count(), 2);

        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.failure_count(), 0);

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes_circuit() {
        let breaker = breaker(3, 1000);
        for _ in 0..3 {
            fail(&breaker).await;
        }

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(succeed(&breaker).await.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_open_until_reset_timeout_strictly_elapsed() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await;

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(succeed(&breaker).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_and_refreshes_failure_time() {
        let breaker = breaker(2, 1000);
        fail(&breaker).await;
        fail(&breaker).await;

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert_eq!(breaker.snapshot().ms_since_last_failure, Some(1100));

        assert!(matches!(fail(&breaker).await, ResilienceError::Upstream(Down)));
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.ms_since_last_failure, Some(0));

        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_single_probe() {
        let breaker = Arc::new(breaker(1, 1000));
        fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(1100)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let probe = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .execute(|| async move {
                        let _ = release_rx.await;
                        Ok::<_, Down>("probe")
                    })
                    .await
            })
        };

        while breaker.state() != CircuitState::HalfOpen {
            tokio::task::yield_now().await;
        }

        let calls = AtomicU32::new(0);
        let err = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Down>("second")
            })
            .await
            .unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), "probe");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_probe_releases_slot() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(1100)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            breaker.execute(|| std::future::pending::<Result<(), Down>>()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure_and_cancels_call() {
        let breaker = CircuitBreaker::new(
            "slow",
            BreakerConfig {
                failure_threshold: 2,
                reset_timeout_ms: 1000,
                call_timeout_ms: 200,
            },
        );
        let finished = Arc::new(AtomicBool::new(false));

        let start = Instant::now();
        let flag = finished.clone();
        let err = breaker
            .execute(|| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Down>(())
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_secs(1));
        assert_eq!(breaker.failure_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_served_when_open() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await;

        let value = breaker
            .execute_with_fallback(|| async { Ok::<_, Down>("live") }, || "cached")
            .await
            .unwrap();
        assert_eq!(value, "cached");

        let calls = AtomicU32::new(0);
        let value = breaker
            .execute_with_fallback(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<&str, _>(Down)
                },
                || "cached",
            )
            .await
            .unwrap();
        assert_eq!(value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_not_used_for_upstream_errors() {
        let breaker = breaker(5, 1000);
        let err = breaker
            .execute_with_fallback(|| async { Err::<&str, _>(Down) }, || "cached")
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::Upstream(Down)));
    }

    #[tokio::test(start_paused = true)]
    async fn admin_reset_and_force_open() {
        let breaker = breaker(1, 1000);

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        let snapshot = breaker.snapshot();
        assert!(snapshot.last_failure_time.is_some());
        assert_eq!(snapshot.ms_since_last_failure, Some(0));
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(succeed(&breaker).await.is_ok());

        breaker.force_open();
        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reports_counters() {
        let breaker = breaker(2, 1000);
        succeed(&breaker).await.unwrap();
        fail(&breaker).await;
        fail(&breaker).await;
        let _ = succeed(&breaker).await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.name, "product");
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 2);
        assert!(snapshot.last_failure_time.is_some());
        assert_eq!(snapshot.failure_threshold, 2);
        assert_eq!(snapshot.reset_timeout_ms, 1000);
        assert_eq!(snapshot.stats.total_requests, 4);
        assert_eq!(snapshot.stats.successful_requests, 1);
        assert_eq!(snapshot.stats.failed_requests, 2);
        assert_eq!(snapshot.stats.rejected_requests, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "OPEN");
        assert_eq!(json["failure_count"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stats_keeps_state() {
        let breaker = breaker(1, 1000);
        succeed(&breaker).await.unwrap();
        fail(&breaker).await;
        let _ = succeed(&breaker).await;

        breaker.reset_stats();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.stats.total_requests, 0);
        assert_eq!(snapshot.stats.failed_requests, 0);
        assert_eq!(snapshot.stats.rejected_requests, 0);
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_hook_sees_every_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let breaker = breaker(1, 1000).with_state_change_hook(move |name, from, to| {
            log.lock().unwrap().push((name.to_string(), from, to));
        });

        fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        succeed(&breaker).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("product".to_string(), CircuitState::Closed, CircuitState::Open),
                ("product".to_string(), CircuitState::Open, CircuitState::HalfOpen),
                ("product".to_string(), CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn updated_config_applies_to_next_call() {
        let breaker = breaker(5, 1000);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.update_config(BreakerConfig {
            failure_threshold: 2,
            reset_timeout_ms: 1000,
            call_timeout_ms: 10_000,
        });
        assert_eq!(breaker.failure_count(), 1);

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.snapshot().failure_threshold, 2);
    }

    #[test]
    fn state_names() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
    }
}
