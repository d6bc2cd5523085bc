// Single source of truth for all default values.

// --- Bus ---
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
pub const DEFAULT_DEDUP_TTL_SECS: u64 = 60;
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 1_024;

// --- Gate ---
pub const DEFAULT_EVALUATION_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_DECISION_HISTORY_CAPACITY: usize = 10_000;

// --- Ledger ---
pub const DEFAULT_BIAS_WINDOW_SECS: u64 = 7 * 24 * 3600; // 7 days
pub const DEFAULT_TREND_DEAD_BAND: f64 = 0.02;
pub const DEFAULT_TREND_SMA_WINDOW: usize = 3;
pub const DEFAULT_OVERRIDE_HISTORY_CAPACITY: usize = 10_000;

// --- Alerting ---
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RENOTIFY_TIMEOUT_SECS: u64 = 900; // 15 minutes
pub const DEFAULT_MAX_ESCALATIONS: u32 = 3;
pub const DEFAULT_SIGNAL_ACK_TTL_SECS: u64 = 300; // 5 minutes
pub const DEFAULT_ALERT_HISTORY_CAPACITY: usize = 10_000;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

// --- Persistence ---
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 500;
pub const DEFAULT_FLUSH_BATCH_SIZE: usize = 256;
pub const DEFAULT_MAX_PENDING_RECORDS: usize = 50_000;
pub const DEFAULT_RETENTION_MAX_RECORDS: usize = 100_000;
pub const DEFAULT_RETENTION_MAX_AGE_DAYS: i64 = 365;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = true;
