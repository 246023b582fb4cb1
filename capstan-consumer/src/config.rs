use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "GATEWAY_URL", default = "http://localhost:3400")]
    pub gateway_url: String,

    // No default: the consumer must present the same token the gateway checks.
    #[envconfig(from = "INTERNAL_API_TOKEN")]
    pub internal_api_token: String,

    pub max_jobs_per_tick: Option<usize>, // Defaults to 10, clamped to [1, 50]
    pub poll_interval_seconds: Option<u64>, // Defaults to 5
    pub request_timeout_seconds: Option<u64>, // Defaults to 30
}

// Raw env fields above, resolved values below; envconfig can't express
// defaults that need computation, so the split mirrors how the rest of the
// fleet does it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway_url: String,
    pub token: String,
    pub jobs_per_tick: usize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn to_app_config(self) -> AppConfig {
        AppConfig {
            gateway_url: self.gateway_url.trim_end_matches('/').to_owned(),
            token: self.internal_api_token,
            jobs_per_tick: self.max_jobs_per_tick.unwrap_or(10).clamp(1, 50),
            poll_interval: Duration::from_secs(self.poll_interval_seconds.unwrap_or(5)),
            request_timeout: Duration::from_secs(self.request_timeout_seconds.unwrap_or(30)),
        }
    }
}
