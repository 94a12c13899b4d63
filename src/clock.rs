//! Day boundaries for the PnL ledger are computed in a fixed reference
//! timezone (UTC−8), never the process's local wall-clock zone and never a
//! named zone such as "America/Los_Angeles" — DST is intentionally not
//! modelled, since that would shift day boundaries twice a year and silently
//! change which day a trade's PnL lands in.

use crate::constants::REFERENCE_TZ_WEST_SECONDS;
use chrono::{DateTime, FixedOffset, Utc};

fn reference_offset() -> FixedOffset {
    FixedOffset::west_opt(REFERENCE_TZ_WEST_SECONDS).expect("fixed offset is within ±23:59:59")
}

/// Abstracts over wall-clock time so Monitor/PnL tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn day_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&reference_offset());
        local
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_local_timezone(reference_offset())
            .single()
            .expect("fixed offset has no ambiguous instants")
            .with_timezone(&Utc)
    }

    fn day_end(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start(instant) + chrono::Duration::days(1) - chrono::Duration::milliseconds(1)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
