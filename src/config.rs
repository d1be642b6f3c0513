use crate::error::{ClientError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Backend the clients talk to unless told otherwise
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// Settings shared by the payment and unit clients
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root; resources live at `<api_base_url>/payments` and `<api_base_url>/units`
    pub api_base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    /// Attach `UnitFilters` to `GET /units/me` as a query string
    pub send_unit_filters: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: None,
            user_agent: concat!("rental-client/", env!("CARGO_PKG_VERSION")).to_string(),
            send_unit_filters: false,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `RENTAL_API_URL`, `RENTAL_TIMEOUT_SECS` and `RENTAL_SEND_UNIT_FILTERS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("RENTAL_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }

        if let Some(secs) = lookup("RENTAL_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    ClientError::config(format!(
                        "RENTAL_TIMEOUT_SECS must be a positive whole number of seconds, got '{}'",
                        secs
                    ))
                })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(flag) = lookup("RENTAL_SEND_UNIT_FILTERS") {
            config.send_unit_filters = parse_flag(&flag).ok_or_else(|| {
                ClientError::config(format!(
                    "RENTAL_SEND_UNIT_FILTERS must be true or false, got '{}'",
                    flag
                ))
            })?;
        }

        debug!("Loaded client config: {:?}", config);
        Ok(config)
    }

    /// API root without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Build the HTTP transport shared by both clients
    pub fn build_http_client(&self) -> Result<Client> {
        let mut builder = Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| ClientError::config(format!("Failed to create HTTP client: {}", e)))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
