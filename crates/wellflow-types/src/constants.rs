//! System-wide constants for the WellFlow settlement core.

/// Decimal places for payout amounts (currency precision).
pub const PAYOUT_SCALE: u32 = 6;

/// Maximum entries in the event dedup buffer before oldest-first eviction.
pub const DEDUP_BUFFER_CAPACITY: usize = 1_000;

/// Maximum length of a caller-supplied idempotency key, in bytes.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Retention window for idempotency records, in seconds (7 days).
///
/// Must exceed any plausible client retry window: purging a record whose
/// effects are still externally visible would allow re-execution.
pub const IDEMPOTENCY_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// Default consensus-log topic for settlement events.
pub const DEFAULT_EVENT_TOPIC: &str = "wellflow.settlements";

/// Maximum number of documents in a single anchored bundle.
pub const MAX_BUNDLE_DOCUMENTS: usize = 10_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "WellFlow";
