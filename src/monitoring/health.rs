use crate::db::Store;
use crate::monitor::Monitor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub database_ok: bool,
    pub monitor_cycle_age_ms: Option<i64>,
}

/// Monitor cycles more than this many periods old mark the service degraded
/// (the cycle loop is still alive, but clearly behind).
const STALE_CYCLE_THRESHOLD: Duration = Duration::from_secs(30);

pub struct HealthCheck {
    store: Arc<dyn Store>,
    monitor: Arc<Monitor>,
}

impl HealthCheck {
    pub fn new(store: Arc<dyn Store>, monitor: Arc<Monitor>) -> Self {
        Self { store, monitor }
    }

    pub async fn check(&self) -> SystemHealth {
        let database_ok = self.store.ping().await.is_ok();

        let last_cycle = self.monitor.last_cycle_at_ms();
        let cycle_age_ms = if last_cycle == 0 {
            None
        } else {
            Some(Utc::now().timestamp_millis() - last_cycle)
        };

        let status = if !database_ok {
            HealthStatus::Unhealthy
        } else {
            match cycle_age_ms {
                Some(age) if age > STALE_CYCLE_THRESHOLD.as_millis() as i64 => HealthStatus::Degraded,
                _ => HealthStatus::Healthy,
            }
        };

        SystemHealth {
            status,
            database_ok,
            monitor_cycle_age_ms: cycle_age_ms,
        }
    }
}
