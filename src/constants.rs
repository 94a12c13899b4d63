use std::time::Duration;

/// Reserved mint for native SOL wrapped as an SPL token.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Seconds *west* of UTC applied for all day-boundary math (UTC−8). Not a
/// named zone — deliberately not DST-aware (see Clock design notes).
pub const REFERENCE_TZ_WEST_SECONDS: i32 = 8 * 3600;

/// Monitor cycle period.
pub const MONITOR_CYCLE_PERIOD: Duration = Duration::from_secs(5);

/// Signatures preloaded into `SeenSignatures` when a wallet newly joins the
/// active set.
pub const PRELOAD_SIGNATURE_COUNT: usize = 20;

/// Signatures requested per wallet per cycle.
pub const CYCLE_SIGNATURE_LIMIT: usize = 15;

/// Balance/token delta magnitudes below this are treated as noise (fees,
/// dust) and dropped.
pub const DUST_THRESHOLD: f64 = 1e-6;

/// Default cap on outstanding ChainClient requests.
pub const DEFAULT_MAX_CONCURRENT_RPC_REQUESTS: usize = 10;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WS_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Scale of the fixed-precision decimal columns, per the persisted schema.
pub const AMOUNT_SCALE: u32 = 9;
pub const PNL_SCALE: u32 = 6;
