//! Cached, rate-limited health probes.
//!
//! # Responsibilities
//! - Run a subsystem's check function at most once per minimum interval
//! - Convert check outcomes and errors into a `SystemHealth` report
//! - Never let a check failure escape to the caller
//!
//! # Design Decisions
//! - The cache is injected (`HealthCache`), not global
//! - Probes for the same name are serialized; a caller that waited on the lock
//!   sees the freshly cached report instead of running the check again
//! - Probe settings can be swapped at runtime on config reload

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HealthConfig;
use crate::health::aggregate::Subsystem;
use crate::health::cache::{CachedProbe, HealthCache};
use crate::health::check::{CheckFn, CheckOutcome, ProbeError};
use crate::health::status::{HealthStatus, SystemHealth};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Probe `system_name`, reusing the cached report if it is younger than
/// `minimum_minutes_between_requests`.
pub async fn probe<F, Fut>(
    system_name: &str,
    cache: &dyn HealthCache,
    minimum_minutes_between_requests: u64,
    check: F,
    active_message: Option<&str>,
) -> SystemHealth
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<CheckOutcome, ProbeError>>,
{
    let min_interval = Duration::from_secs(minimum_minutes_between_requests.saturating_mul(60));
    run_probe(system_name, cache, min_interval, None, check, active_message).await
}

async fn run_probe<F, Fut>(
    system_name: &str,
    cache: &dyn HealthCache,
    min_interval: Duration,
    timeout: Option<Duration>,
    check: F,
    active_message: Option<&str>,
) -> SystemHealth
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<CheckOutcome, ProbeError>>,
{
    let lock = cache.entry_lock(system_name);
    let _guard = lock.lock().await;

    if let Some(cached) = cache.get(system_name) {
        if cached.checked_at.elapsed() < min_interval {
            tracing::trace!(system = %system_name, "Returning cached health report");
            return cached.report;
        }
    }

    let attempt = AssertUnwindSafe(async move { check().await }).catch_unwind();
    let outcome = match with_deadline(timeout, attempt).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(ProbeError::Dependency("health check panicked".to_string())),
        Err(e) => Err(ProbeError::Dependency(format!("health check {}", e))),
    };

    let report = build_report(system_name, outcome, active_message);

    if report.status != HealthStatus::Active {
        tracing::warn!(
            system = %system_name,
            status = %report.status,
            message = report.status_message.as_deref().unwrap_or(""),
            "Health probe reported a problem"
        );
    } else {
        tracing::debug!(system = %system_name, "Health probe refreshed");
    }
    metrics::record_probe(system_name, report.status);

    cache.set(system_name, CachedProbe::new(report.clone()));
    report
}

fn build_report(
    system_name: &str,
    outcome: Result<CheckOutcome, ProbeError>,
    active_message: Option<&str>,
) -> SystemHealth {
    match outcome {
        Ok(CheckOutcome::Healthy) => {
            let report = SystemHealth::new(system_name, HealthStatus::Active);
            match active_message {
                Some(message) => report.with_message(message),
                None => report,
            }
        }
        Ok(CheckOutcome::Degraded(message)) => {
            SystemHealth::new(system_name, HealthStatus::Impaired).with_message(message)
        }
        Ok(CheckOutcome::Unhealthy(message)) => {
            SystemHealth::new(system_name, HealthStatus::Failure).with_message(message)
        }
        Ok(CheckOutcome::Unknown(message)) => {
            SystemHealth::new(system_name, HealthStatus::Unknown).with_message(message)
        }
        Ok(CheckOutcome::Report(report)) => report.stamped(),
        Err(e) => {
            let message = if e.message().trim().is_empty() {
                format!("Unexpected error while checking {}", system_name)
            } else {
                e.message().to_string()
            };
            SystemHealth::new(system_name, e.status()).with_message(message)
        }
    }
}

/// Reloadable probe settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Minimum age of a cached report before the check runs again.
    pub min_interval: Duration,
    /// Deadline for a single check.
    pub timeout: Option<Duration>,
    /// Message attached to synthetic `active` reports.
    pub active_message: Option<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for ProbeSettings {
    fn from(config: &HealthConfig) -> Self {
        Self {
            min_interval: Duration::from_secs(config.min_minutes_between_requests.saturating_mul(60)),
            timeout: (config.probe_timeout_secs > 0)
                .then(|| Duration::from_secs(config.probe_timeout_secs)),
            active_message: config.active_message.clone(),
        }
    }
}

/// Probes subsystems against a shared cache.
pub struct Prober {
    cache: Arc<dyn HealthCache>,
    settings: ArcSwap<ProbeSettings>,
}

impl Prober {
    pub fn new(cache: Arc<dyn HealthCache>, settings: ProbeSettings) -> Self {
        Self {
            cache,
            settings: ArcSwap::from_pointee(settings),
        }
    }

    pub fn settings(&self) -> Arc<ProbeSettings> {
        self.settings.load_full()
    }

    /// Replace the settings used by subsequent probes.
    pub fn update_settings(&self, settings: ProbeSettings) {
        tracing::info!(
            min_interval = ?settings.min_interval,
            timeout = ?settings.timeout,
            "Probe settings updated"
        );
        self.settings.store(Arc::new(settings));
    }

    pub fn cache(&self) -> &Arc<dyn HealthCache> {
        &self.cache
    }

    pub async fn probe<F, Fut>(&self, system_name: &str, check: F) -> SystemHealth
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CheckOutcome, ProbeError>>,
    {
        let settings = self.settings.load_full();
        run_probe(
            system_name,
            self.cache.as_ref(),
            settings.min_interval,
            settings.timeout,
            check,
            settings.active_message.as_deref(),
        )
        .await
    }
}

/// A named check bound to a prober, usable as an aggregate subsystem.
pub struct ProbeTarget {
    name: String,
    prober: Arc<Prober>,
    check: CheckFn,
}

impl ProbeTarget {
    pub fn new<F, Fut>(name: impl Into<String>, prober: Arc<Prober>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckOutcome, ProbeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            prober,
            check: Arc::new(move || Box::pin(check())),
        }
    }
}

impl Subsystem for ProbeTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> BoxFuture<'_, SystemHealth> {
        let check = Arc::clone(&self.check);
        Box::pin(self.prober.probe(&self.name, move || check()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::cache::MemoryHealthCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_check(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures_util::future::Ready<Result<CheckOutcome, ProbeError>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(CheckOutcome::Healthy))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_respects_minimum_interval() {
        let cache = MemoryHealthCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        probe("db", &cache, 5, counting_check(&calls), None).await;
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        probe("db", &cache, 5, counting_check(&calls), None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        probe("db", &cache, 5, counting_check(&calls), None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_always_refreshes() {
        let cache = MemoryHealthCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        probe("db", &cache, 0, counting_check(&calls), None).await;
        probe("db", &cache, 0, counting_check(&calls), None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_structured_report_is_restamped() {
        let cache = MemoryHealthCache::new();
        let report = probe(
            "db",
            &cache,
            1,
            || async {
                Ok(CheckOutcome::Report(SystemHealth {
                    name: "db".into(),
                    status: HealthStatus::Active,
                    subsystems: None,
                    status_message: None,
                    time_stamp: 0,
                }))
            },
            None,
        )
        .await;

        assert_eq!(report.status, HealthStatus::Active);
        assert_eq!(report.name, "db");
        assert!(report.time_stamp > 0);
        assert_eq!(cache.get("db").unwrap().report, report);
    }

    #[tokio::test]
    async fn test_healthy_uses_active_message() {
        let cache = MemoryHealthCache::new();
        let report = probe("api", &cache, 1, || async { Ok(CheckOutcome::Healthy) }, Some("all good")).await;

        assert_eq!(report.status, HealthStatus::Active);
        assert_eq!(report.status_message.as_deref(), Some("all good"));
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let cache = MemoryHealthCache::new();

        let report = probe(
            "config",
            &cache,
            1,
            || async { Err(ProbeError::Configuration("DATABASE_URL not set".into())) },
            None,
        )
        .await;
        assert_eq!(report.status, HealthStatus::Impaired);
        assert_eq!(report.status_message.as_deref(), Some("DATABASE_URL not set"));

        let report = probe(
            "db",
            &cache,
            1,
            || async { Err(ProbeError::Dependency(String::new())) },
            None,
        )
        .await;
        assert_eq!(report.status, HealthStatus::Failure);
        assert_eq!(
            report.status_message.as_deref(),
            Some("Unexpected error while checking db")
        );

        // Failures are cached too.
        assert_eq!(cache.get("db").unwrap().report.status, HealthStatus::Failure);
    }

    async fn exploding_check() -> Result<CheckOutcome, ProbeError> {
        panic!("driver bug")
    }

    #[tokio::test]
    async fn test_panicking_check_is_a_cached_failure() {
        let cache = MemoryHealthCache::new();
        let report = probe("db", &cache, 1, exploding_check, None).await;

        assert_eq!(report.status, HealthStatus::Failure);
        assert_eq!(report.status_message.as_deref(), Some("health check panicked"));
        assert_eq!(cache.get("db").unwrap().report, report);

        // The lock was released and the failure is served from the cache.
        let calls = Arc::new(AtomicUsize::new(0));
        let again = probe("db", &cache, 1, counting_check(&calls), None).await;
        assert_eq!(again, report);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_timeout_is_a_failure() {
        let prober = Prober::new(
            Arc::new(MemoryHealthCache::new()),
            ProbeSettings {
                min_interval: Duration::ZERO,
                timeout: Some(Duration::from_secs(2)),
                active_message: None,
            },
        );

        let report = prober
            .probe("slow", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(CheckOutcome::Healthy)
            })
            .await;

        assert_eq!(report.status, HealthStatus::Failure);
        assert!(report.status_message.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_probes_run_check_once() {
        let prober = Arc::new(Prober::new(
            Arc::new(MemoryHealthCache::new()),
            ProbeSettings {
                min_interval: Duration::from_secs(60),
                timeout: None,
                active_message: None,
            },
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        let target = {
            let calls = calls.clone();
            Arc::new(ProbeTarget::new("db", prober.clone(), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(CheckOutcome::Healthy)
                }
            }))
        };

        let reports = futures_util::future::join_all((0..5).map(|_| target.probe())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(reports.iter().all(|r| r.status == HealthStatus::Active));
    }

    #[tokio::test]
    async fn test_update_settings() {
        let prober = Prober::new(Arc::new(MemoryHealthCache::new()), ProbeSettings::default());
        prober.update_settings(ProbeSettings {
            min_interval: Duration::ZERO,
            timeout: None,
            active_message: Some("ok".into()),
        });
        assert_eq!(prober.settings().active_message.as_deref(), Some("ok"));
    }
}
