//! Immutable application configuration, built once at startup from the
//! environment (teacher pattern: `rate_limit::RateLimitConfig::from_env`,
//! generalized to cover every component instead of just rate limits).
//! No module reads `std::env` during request handling — everything flows
//! through this struct, injected as managed Rocket state.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // --- Object storage ---
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub max_object_size_bytes: i64,
    pub allowed_mime_prefixes: Vec<String>,
    pub blocked_mime_types: Vec<String>,
    pub upload_url_ttl: Duration,
    pub download_url_ttl: Duration,
    pub per_user_storage_quota_bytes: i64,
    pub per_user_inflight_upload_cap: usize,

    // --- Share policy ---
    pub allowed_expiry_secs: Vec<i64>,
    pub anonymous_shares_allowed: bool,

    // --- Expiry / cleanup engine ---
    pub sweep_interval: Duration,
    pub sweep_grace: Duration,
    pub sweep_batch_size: usize,
    pub deleted_retention: Option<Duration>,

    // --- Admission controller ---
    pub rate_limits: RateLimitConfig,
    pub redis_url: Option<String>,

    // --- Signaling hub ---
    pub room_cap: usize,
    pub max_rooms: usize,
    pub max_send_queue_bytes: usize,
    pub max_frame_bytes: usize,
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub anonymous_p2p_allowed: bool,

    // --- Sessions ---
    pub session_cookie_name: String,
    pub session_secret: Vec<u8>,
    pub session_ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct TierLimit {
    pub anon_per_ip: usize,
    pub auth_per_user: usize,
    pub ip_ceiling: usize,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub upload: TierLimit,
    pub download: TierLimit,
    pub api: TierLimit,
    pub auth: TierLimit,
    /// Number of sub-buckets per window (§4.5: fine enough that burst-then-idle
    /// is not rewarded).
    pub sub_buckets: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            upload: TierLimit { anon_per_ip: 5, auth_per_user: 30, ip_ceiling: 60, window: Duration::from_secs(60) },
            download: TierLimit { anon_per_ip: 20, auth_per_user: 120, ip_ceiling: 240, window: Duration::from_secs(60) },
            api: TierLimit { anon_per_ip: 60, auth_per_user: 300, ip_ceiling: 600, window: Duration::from_secs(60) },
            auth: TierLimit { anon_per_ip: 5, auth_per_user: 10, ip_ceiling: 20, window: Duration::from_secs(300) },
            sub_buckets: 10,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) => v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn env_secs_list(key: &str, default: &[i64]) -> Vec<i64> {
    let parsed: Vec<i64> = match env::var(key) {
        Ok(v) => v
            .split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .collect(),
        Err(_) => Vec::new(),
    };
    if parsed.is_empty() { default.to_vec() } else { parsed }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let session_secret = env::var("FILEDROP_SESSION_SECRET")
            .unwrap_or_else(|_| "dev-only-insecure-secret-change-me".to_string())
            .into_bytes();

        Self {
            s3_bucket: env_string("FILEDROP_S3_BUCKET", "filedrop-dev"),
            s3_endpoint: env::var("FILEDROP_S3_ENDPOINT").ok(),
            s3_region: env_string("FILEDROP_S3_REGION", "us-east-1"),
            max_object_size_bytes: env_parse("FILEDROP_MAX_OBJECT_SIZE", 5 * 1024 * 1024 * 1024),
            allowed_mime_prefixes: env_csv("FILEDROP_ALLOWED_MIME_PREFIXES", &[]),
            blocked_mime_types: env_csv(
                "FILEDROP_BLOCKED_MIME_TYPES",
                &["application/x-msdownload", "application/x-sh"],
            ),
            upload_url_ttl: Duration::from_secs(env_parse("FILEDROP_UPLOAD_TTL_SECS", 900)),
            download_url_ttl: Duration::from_secs(env_parse("FILEDROP_DOWNLOAD_TTL_SECS", 300)),
            per_user_storage_quota_bytes: env_parse(
                "FILEDROP_USER_QUOTA_BYTES",
                50 * 1024 * 1024 * 1024,
            ),
            per_user_inflight_upload_cap: env_parse("FILEDROP_USER_INFLIGHT_CAP", 10),

            allowed_expiry_secs: env_secs_list(
                "FILEDROP_ALLOWED_EXPIRY_SECS",
                &[2 * 3600, 5 * 3600, 24 * 3600],
            ),
            anonymous_shares_allowed: env_parse("FILEDROP_ANON_SHARES_ALLOWED", true),

            sweep_interval: Duration::from_secs(env_parse("FILEDROP_SWEEP_INTERVAL_SECS", 300)),
            sweep_grace: Duration::from_secs(env_parse("FILEDROP_SWEEP_GRACE_SECS", 30)),
            sweep_batch_size: env_parse("FILEDROP_SWEEP_BATCH_SIZE", 200),
            deleted_retention: {
                let secs: u64 = env_parse("FILEDROP_DELETED_RETENTION_SECS", 7 * 24 * 3600);
                if secs == 0 { None } else { Some(Duration::from_secs(secs)) }
            },

            rate_limits: RateLimitConfig::default(),
            redis_url: env::var("FILEDROP_REDIS_URL").ok(),

            room_cap: env_parse("FILEDROP_ROOM_CAP", 8),
            max_rooms: env_parse("FILEDROP_MAX_ROOMS", 10_000),
            max_send_queue_bytes: env_parse("FILEDROP_MAX_SEND_QUEUE_BYTES", 1_048_576),
            max_frame_bytes: env_parse("FILEDROP_MAX_FRAME_BYTES", 65_536),
            heartbeat_interval: Duration::from_secs(env_parse("FILEDROP_HEARTBEAT_SECS", 15)),
            idle_timeout: Duration::from_secs(env_parse("FILEDROP_IDLE_TIMEOUT_SECS", 60)),
            anonymous_p2p_allowed: env_parse("FILEDROP_ANON_P2P_ALLOWED", true),

            session_cookie_name: env_string("FILEDROP_SESSION_COOKIE", "fd_session"),
            session_secret,
            session_ttl: Duration::from_secs(env_parse("FILEDROP_SESSION_TTL_SECS", 30 * 24 * 3600)),
        }
    }
}
