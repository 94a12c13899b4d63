pub mod health;
pub mod metrics;

pub use health::{HealthCheck, HealthStatus, SystemHealth};
pub use metrics::Metrics;
