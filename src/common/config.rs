/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Sampling defaults
    pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
    pub const DEFAULT_FLUSH_EVERY: u64 = 1000;
    pub const STATUS_LOG_PERIOD_SECS: u64 = 5;
    pub const FAILURE_WARN_THRESHOLD: u32 = 3;
    // Intervals below this are limited by hardware and scheduler granularity
    pub const MIN_SANE_INTERVAL_SECS: f64 = 0.005;

    // Query timeout: a hung vendor call must never stall the schedule for
    // more than a small multiple of the interval
    pub const QUERY_TIMEOUT_FACTOR: u32 = 2;
    pub const MIN_QUERY_TIMEOUT_MS: u64 = 250;

    // Network Configuration (Redfish)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_REDFISH_CHASSIS: &'static str = "1";
}
