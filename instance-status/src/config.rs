use std::net::SocketAddr;

use envconfig::Envconfig;
use once_cell::sync::Lazy;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:1518")]
    pub address: SocketAddr,

    /// Base URL of the orchestrator's list API.
    #[envconfig(default = "http://127.0.0.1:8001")]
    pub orchestrator_url: String,

    /// Bearer token for the orchestrator; unset means anonymous access,
    /// as with a local API proxy.
    pub orchestrator_token: Option<String>,

    /// Base URL of the resource-usage metrics gateway.
    #[envconfig(default = "http://127.0.0.1:8080")]
    pub usage_api_url: String,

    /// Admission gate capacity, shared across all instance endpoints.
    #[envconfig(default = "200")]
    pub max_in_flight_requests: usize,

    /// Fan-out width of one bulk status request.
    #[envconfig(default = "15")]
    pub bulk_status_workers: usize,

    /// Per-call deadline for both upstreams, so a hung orchestrator cannot
    /// pin admission slots forever.
    #[envconfig(default = "10")]
    pub upstream_timeout_seconds: u64,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            orchestrator_url: "http://127.0.0.1:8001".to_string(),
            orchestrator_token: None,
            usage_api_url: "http://127.0.0.1:8080".to_string(),
            max_in_flight_requests: 200,
            bulk_status_workers: 15,
            upstream_timeout_seconds: 2,
        }
    }
}

pub static DEFAULT_TEST_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn default_config_matches_the_documented_values() {
        let config = Config::init_from_env().unwrap();
        assert_eq!(
            config.address,
            SocketAddr::from_str("127.0.0.1:1518").unwrap()
        );
        assert_eq!(config.orchestrator_url, "http://127.0.0.1:8001");
        assert_eq!(config.orchestrator_token, None);
        assert_eq!(config.usage_api_url, "http://127.0.0.1:8080");
        assert_eq!(config.max_in_flight_requests, 200);
        assert_eq!(config.bulk_status_workers, 15);
        assert_eq!(config.upstream_timeout_seconds, 10);
    }

    #[test]
    fn test_config_binds_an_ephemeral_port() {
        let config = Config::default_test_config();
        assert_eq!(config.address.port(), 0);
    }
}
