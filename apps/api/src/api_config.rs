use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use ipnet::IpNet;
use retreat_access_application::DEFAULT_CACHE_TTL_SECONDS;
use retreat_access_core::{AppError, UserId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub cache_ttl_seconds: u64,
    pub trusted_proxies: Vec<IpNet>,
    pub dev_seed_owner: Option<UserId>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let database_url = optional_env("DATABASE_URL");
        if migrate_only && database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = match optional_env("API_PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?,
            None => 3001,
        };

        let cache_ttl_seconds = match optional_env("ACCESS_CACHE_TTL_SECONDS") {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!("invalid ACCESS_CACHE_TTL_SECONDS: {error}"))
            })?,
            None => DEFAULT_CACHE_TTL_SECONDS,
        };

        let trusted_proxies =
            parse_trusted_proxies(optional_env("TRUSTED_PROXY_CIDRS").unwrap_or_default().as_str())?;

        let dev_seed_owner = optional_env("DEV_SEED_OWNER_ID")
            .map(|value| UserId::parse(value.as_str()))
            .transpose()?;

        Ok(Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            cache_ttl_seconds,
            trusted_proxies,
            dev_seed_owner,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            migrate_only: false,
            database_url: None,
            api_host: "127.0.0.1".to_owned(),
            api_port: 0,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            trusted_proxies: Vec::new(),
            dev_seed_owner: None,
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Parses a comma-separated CIDR list. Bare addresses are treated as
/// single-host networks.
pub fn parse_trusted_proxies(value: &str) -> Result<Vec<IpNet>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if let Ok(address) = IpAddr::from_str(entry) {
                return Ok(IpNet::from(address));
            }

            IpNet::from_str(entry).map_err(|error| {
                AppError::Validation(format!(
                    "invalid TRUSTED_PROXY_CIDRS entry '{entry}': {error}"
                ))
            })
        })
        .collect()
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::parse_trusted_proxies;

    #[test]
    fn trusted_proxies_accept_cidrs_and_bare_addresses() {
        let parsed = parse_trusted_proxies("10.0.0.0/8, 192.168.1.7 ,::1");
        assert!(matches!(parsed, Ok(ref networks) if networks.len() == 3));
    }

    #[test]
    fn empty_trusted_proxy_list_is_allowed() {
        let parsed = parse_trusted_proxies("  ");
        assert!(matches!(parsed, Ok(ref networks) if networks.is_empty()));
    }

    #[test]
    fn malformed_trusted_proxy_is_rejected() {
        let parsed = parse_trusted_proxies("10.0.0.0/40");
        assert!(parsed.is_err());
    }
}
