//! Configuration for the credit engine and its PostgreSQL store.

use crate::error::CreditError;

/// Connection settings for the PostgreSQL store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct CreditConfig {
    /// Installment count applied when an order does not specify one.
    pub default_installment_count: i32,
    /// Days past an installment's due date before an order counts as
    /// defaulted (advisory reporting only).
    pub grace_days: i64,
    /// Absent when the engine runs against a non-database store.
    pub database: Option<DatabaseConfig>,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            default_installment_count: 4,
            grace_days: 7,
            database: None,
        }
    }
}

impl CreditConfig {
    /// Load configuration from the environment (with dev-time `.env`
    /// support). `DATABASE_URL` is optional; the engine can run against
    /// the in-memory store without it.
    pub fn from_env() -> Result<Self, CreditError> {
        dotenvy::dotenv().ok();

        let database = match std::env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseConfig {
                url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1)?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            default_installment_count: env_or("CREDIT_DEFAULT_INSTALLMENT_COUNT", 4)?,
            grace_days: env_or("CREDIT_GRACE_DAYS", 7)?,
            database,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, CreditError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| CreditError::Config(anyhow::anyhow!("invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
