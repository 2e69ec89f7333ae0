//! Retreat access cleanup worker.
//!
//! Periodically expires lapsed delegations and memberships. Every pass only
//! moves rows from a live status to `expired`, so it may run next to the API
//! and next to other workers.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use retreat_access_application::{
    AccessControlService, AccessPorts, CacheStore, DEFAULT_CACHE_TTL_SECONDS,
};
use retreat_access_core::{AppError, AppResult};
use retreat_access_infrastructure::{
    InMemoryPermissionCache, PostgresAccessRepository, PostgresAuditRepository,
    PostgresDelegationRepository, PostgresOverrideRepository, PostgresPolicyRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 300;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    cleanup_interval_seconds: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let access_control = build_access_control(pool);

    info!(
        cleanup_interval_seconds = config.cleanup_interval_seconds,
        run_once = config.run_once,
        "retreat-access-worker started"
    );

    if config.run_once {
        return run_cleanup_pass(&access_control).await;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = run_cleanup_pass(&access_control).await {
                    warn!(error = %error, "cleanup pass failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                info!("retreat-access-worker stopping");
                return Ok(());
            }
        }
    }
}

async fn run_cleanup_pass(access_control: &AccessControlService) -> AppResult<()> {
    let (delegations, memberships) = access_control.run_cleanup().await?;
    if delegations > 0 || memberships > 0 {
        info!(
            expired_delegations = delegations,
            expired_memberships = memberships,
            "cleanup pass expired lapsed grants"
        );
    } else {
        info!("cleanup pass found nothing to expire");
    }

    Ok(())
}

fn build_access_control(pool: PgPool) -> AccessControlService {
    let access_repository = Arc::new(PostgresAccessRepository::new(pool.clone()));
    let policy_repository = Arc::new(PostgresPolicyRepository::new(pool.clone()));
    let ports = AccessPorts {
        roles: access_repository.clone(),
        memberships: access_repository.clone(),
        retreats: access_repository,
        delegations: Arc::new(PostgresDelegationRepository::new(pool.clone())),
        overrides: Arc::new(PostgresOverrideRepository::new(pool.clone())),
        inheritance_rules: policy_repository.clone(),
        delegation_rules: policy_repository,
        audit: Arc::new(PostgresAuditRepository::new(pool)),
    };

    AccessControlService::new(
        ports,
        CacheStore::new(
            Arc::new(InMemoryPermissionCache::new()),
            DEFAULT_CACHE_TTL_SECONDS,
        ),
    )
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let cleanup_interval_seconds =
            parse_cleanup_interval(env::var("CLEANUP_INTERVAL_SECONDS").ok().as_deref())?;
        let run_once = env::args().nth(1).as_deref() == Some("once");

        Ok(Self {
            database_url,
            cleanup_interval_seconds,
            run_once,
        })
    }
}

fn parse_cleanup_interval(value: Option<&str>) -> AppResult<u64> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_CLEANUP_INTERVAL_SECONDS);
    };

    let seconds = value.parse::<u64>().map_err(|error| {
        AppError::Validation(format!(
            "invalid CLEANUP_INTERVAL_SECONDS value '{value}': {error}"
        ))
    })?;

    if seconds == 0 {
        return Err(AppError::Validation(
            "CLEANUP_INTERVAL_SECONDS must be greater than zero".to_owned(),
        ));
    }

    Ok(seconds)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use retreat_access_core::AppError;

    use super::{DEFAULT_CLEANUP_INTERVAL_SECONDS, parse_cleanup_interval};

    #[test]
    fn cleanup_interval_defaults_when_unset() {
        assert!(matches!(
            parse_cleanup_interval(None),
            Ok(DEFAULT_CLEANUP_INTERVAL_SECONDS)
        ));
        assert!(matches!(
            parse_cleanup_interval(Some("  ")),
            Ok(DEFAULT_CLEANUP_INTERVAL_SECONDS)
        ));
    }

    #[test]
    fn cleanup_interval_parses_seconds() {
        assert!(matches!(parse_cleanup_interval(Some("60")), Ok(60)));
    }

    #[test]
    fn zero_or_malformed_intervals_are_rejected() {
        assert!(matches!(
            parse_cleanup_interval(Some("0")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_cleanup_interval(Some("five")),
            Err(AppError::Validation(_))
        ));
    }
}
