use std::time::Duration;
use std::{env, io};

use tracing::debug;

const DEFAULT_GEOCODER_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = "bd-address-resolver/0.1.0 (batch address cleaning)";
const DEFAULT_REQUEST_DELAY_MS: u64 = 1_100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub geocoder_endpoint: String,
    pub geocoder_user_agent: String,
    pub country_code: String,
    pub country_suffix: String,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub retry_unresolved: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            geocoder_endpoint: env::var("GEOCODER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_ENDPOINT.to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            country_code: env::var("GEOCODER_COUNTRY_CODE").unwrap_or_else(|_| "bd".to_string()),
            country_suffix: env::var("GEOCODER_COUNTRY_SUFFIX")
                .unwrap_or_else(|_| "Bangladesh".to_string()),
            request_delay: Duration::from_millis(parse_u64(
                "GEOCODER_REQUEST_DELAY_MS",
                DEFAULT_REQUEST_DELAY_MS,
            )),
            request_timeout: Duration::from_secs(parse_u64(
                "GEOCODER_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            retry_unresolved: parse_bool("RETRY_UNRESOLVED", true),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            geocoder_endpoint: DEFAULT_GEOCODER_ENDPOINT.to_string(),
            geocoder_user_agent: DEFAULT_USER_AGENT.to_string(),
            country_code: "bd".to_string(),
            country_suffix: "Bangladesh".to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry_unresolved: true,
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_overrides_from_env() {
        env::set_var("GEOCODER_ENDPOINT", "http://localhost:9999/search");
        env::set_var("GEOCODER_REQUEST_DELAY_MS", "50");
        env::set_var("RETRY_UNRESOLVED", "false");

        let config = AppConfig::from_env();

        assert_eq!(config.geocoder_endpoint, "http://localhost:9999/search");
        assert_eq!(config.request_delay, Duration::from_millis(50));
        assert!(!config.retry_unresolved);
        assert_eq!(config.country_code, "bd");

        env::remove_var("GEOCODER_ENDPOINT");
        env::remove_var("GEOCODER_REQUEST_DELAY_MS");
        env::remove_var("RETRY_UNRESOLVED");
    }

    #[test]
    fn defaults_match_service_policy() {
        let config = AppConfig::default();
        assert_eq!(config.request_delay, Duration::from_millis(1_100));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert!(config.retry_unresolved);
    }
}
