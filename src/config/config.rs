use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub log_level: String,
    pub request_timeout: Duration,
    pub credentials_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            api_base_url: env::var("CHIATIEN_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            credentials_path: env::var("CHIATIEN_CREDENTIALS_PATH")
                .unwrap_or_else(|_| ".chiatien/credentials.json".to_string()),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
