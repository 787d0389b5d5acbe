//! System health aggregation.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::health::status::{HealthStatus, SystemHealth};

pub const FAILURE_MESSAGE: &str = "One or more subsystems are failing";
pub const IMPAIRED_MESSAGE: &str = "One or more subsystems are impaired";
pub const UNKNOWN_MESSAGE: &str = "One or more subsystems are in an unknown state";

/// Anything that can report its own health.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    fn probe(&self) -> BoxFuture<'_, SystemHealth>;
}

/// Probe every subsystem in order and roll the results up under `service_name`.
///
/// Subsystems are probed one after another so the report keeps their order.
pub async fn poll_system_health(
    service_name: &str,
    subsystems: &[Arc<dyn Subsystem>],
) -> SystemHealth {
    let mut status = HealthStatus::Active;
    let mut message: Option<&'static str> = None;
    let mut results = Vec::with_capacity(subsystems.len());

    for subsystem in subsystems {
        let report = subsystem.probe().await;

        match report.status {
            HealthStatus::Failure => {
                status = HealthStatus::Failure;
                message = Some(FAILURE_MESSAGE);
            }
            HealthStatus::Impaired if status != HealthStatus::Failure => {
                status = HealthStatus::Impaired;
                message = Some(IMPAIRED_MESSAGE);
            }
            HealthStatus::Unknown
                if status != HealthStatus::Failure && status != HealthStatus::Impaired =>
            {
                status = HealthStatus::Unknown;
                message = Some(UNKNOWN_MESSAGE);
            }
            _ => {}
        }

        results.push(report);
    }

    let aggregate = SystemHealth::new(service_name, status).with_subsystems(results);
    match message {
        Some(message) => aggregate.with_message(message),
        None => aggregate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, HealthStatus);

    impl Subsystem for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn probe(&self) -> BoxFuture<'_, SystemHealth> {
            let report = SystemHealth::new(self.0, self.1);
            Box::pin(async move { report })
        }
    }

    fn subsystems(statuses: &[HealthStatus]) -> Vec<Arc<dyn Subsystem>> {
        const NAMES: [&str; 4] = ["a", "b", "c", "d"];
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Arc::new(Fixed(NAMES[i], *s)) as Arc<dyn Subsystem>)
            .collect()
    }

    #[tokio::test]
    async fn test_all_active() {
        use HealthStatus::*;
        let report = poll_system_health("svc", &subsystems(&[Active, Active])).await;

        assert_eq!(report.name, "svc");
        assert_eq!(report.status, Active);
        assert!(report.status_message.is_none());
        assert_eq!(report.subsystems.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_cannot_be_downgraded() {
        use HealthStatus::*;
        for order in [
            [Active, Failure, Impaired],
            [Failure, Unknown, Active],
            [Impaired, Unknown, Failure],
        ] {
            let report = poll_system_health("svc", &subsystems(&order)).await;
            assert_eq!(report.status, Failure);
            assert_eq!(report.status_message.as_deref(), Some(FAILURE_MESSAGE));
            assert_eq!(report.rolled_up_status(), report.status);
        }
    }

    #[tokio::test]
    async fn test_impaired_beats_unknown() {
        use HealthStatus::*;
        let report = poll_system_health("svc", &subsystems(&[Unknown, Impaired, Unknown])).await;
        assert_eq!(report.status, Impaired);

        let report = poll_system_health("svc", &subsystems(&[Active, Unknown])).await;
        assert_eq!(report.status, Unknown);
    }

    #[tokio::test]
    async fn test_children_keep_order() {
        use HealthStatus::*;
        let report = poll_system_health("svc", &subsystems(&[Active, Failure, Active, Unknown])).await;
        let names: Vec<_> = report.subsystems.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_empty_is_active() {
        let report = poll_system_health("svc", &[]).await;
        assert_eq!(report.status, HealthStatus::Active);
        assert_eq!(report.subsystems, Some(vec![]));
    }
}
