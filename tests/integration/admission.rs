use crate::common::test_client_with_config;
use filedrop_core::config::{AppConfig, TierLimit};
use rocket::http::Status;
use std::time::Duration;

fn tight_limit() -> TierLimit {
    TierLimit { anon_per_ip: 2, auth_per_user: 2, ip_ceiling: 2, window: Duration::from_secs(60) }
}

fn config_with_tight_api_tier() -> AppConfig {
    let mut config = AppConfig::from_env();
    config.rate_limits.api = tight_limit();
    config
}

// S4: tiered rate limiting trips the configured anon_per_ip ceiling and
// reports Retry-After/X-RateLimit-Limit on the response that trips it.
#[test]
fn anonymous_caller_is_rate_limited_past_configured_ceiling() {
    let client = test_client_with_config(config_with_tight_api_tier());

    for _ in 0..2 {
        let res = client.get("/share/nonexistent").dispatch();
        assert_eq!(res.status(), Status::NotFound);
    }

    let res = client.get("/share/nonexistent").dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
    assert!(res.headers().get_one("Retry-After").is_some());
    assert_eq!(res.headers().get_one("X-RateLimit-Limit"), Some("2"));
}

#[test]
fn rate_limit_buckets_are_independent_per_tier() {
    let mut config = AppConfig::from_env();
    config.rate_limits.api = tight_limit();
    config.rate_limits.download = TierLimit { anon_per_ip: 50, auth_per_user: 50, ip_ceiling: 50, window: Duration::from_secs(60) };
    let client = test_client_with_config(config);

    for _ in 0..2 {
        client.get("/share/nonexistent").dispatch();
    }
    let res = client.get("/share/nonexistent").dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);

    // A different tier (download) must not be affected by the api tier
    // having been exhausted for this same caller.
    let res = client
        .post("/share/nonexistent/download")
        .header(rocket::http::ContentType::JSON)
        .body(serde_json::json!({}).to_string())
        .dispatch();
    assert_ne!(res.status(), Status::TooManyRequests);
}
