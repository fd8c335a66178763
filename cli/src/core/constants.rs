// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "AgsLog";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "agslog";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".agslog";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "agslog.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "AGSLOG_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "AGSLOG_DATA_DIR";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "AGSLOG_LOG";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL autocheckpoint interval in pages
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Max bind parameters per SELECT when resolving lookup ids in chunks
pub const SQLITE_IN_CHUNK_SIZE: usize = 500;

// =============================================================================
// Aggregation Buckets
// =============================================================================

/// Bucket width of the standard fact tables and the summary table
pub const HOUR_BUCKET_SECS: i64 = 3_600;

/// Bucket width of the burst table
pub const MINUTE_BUCKET_SECS: i64 = 60;

/// Seconds per day, used when resampling hourly buckets to daily figures
pub const DAY_SECS: i64 = 86_400;

// =============================================================================
// Ingestion
// =============================================================================

/// Default ceiling on buffered records before a forced flush
pub const DEFAULT_MAX_RAW_RECORDS: usize = 1_000_000;

/// Truncation length for malformed-line previews in warnings
pub const MALFORMED_PREVIEW_LEN: usize = 120;

// =============================================================================
// Retention Defaults (days)
// =============================================================================

/// Default retention window for service fact rows
pub const DEFAULT_SERVICE_RETENTION_DAYS: u32 = 30;

/// Default retention window for IP address fact rows
pub const DEFAULT_IP_RETENTION_DAYS: u32 = 30;

/// Default retention window for referer fact rows
pub const DEFAULT_REFERER_RETENTION_DAYS: u32 = 7;

/// Default retention window for user agent fact rows
pub const DEFAULT_USER_AGENT_RETENTION_DAYS: u32 = 7;

/// Default retention window for minute-resolution burst rows
pub const DEFAULT_BURST_RETENTION_DAYS: u32 = 14;

// =============================================================================
// Service Catalog
// =============================================================================

/// HTTP timeout for catalog requests in seconds
pub const CATALOG_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Report Feed
// =============================================================================

/// Rows per top-N table in the report feed
pub const REPORT_TOP_N: i64 = 20;

/// Days of hourly service history included in the report feed
pub const REPORT_TIMESERIES_DAYS: i64 = 7;

/// Hours of minute-resolution burst history included in the report feed
pub const REPORT_BURST_HOURS: i64 = 24;
