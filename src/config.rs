use std::env;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATABASE_NAME: &str = "interior_shop";
const DEFAULT_DB_TIMEOUT_SECS: u64 = 5;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_name: String,
    pub bind_addr: String,
    /// When set, the catalog collections are wiped and re-seeded at startup.
    pub reset_database: bool,
    /// Upper bound applied to every persistence call.
    pub db_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| DEFAULT_DATABASE_NAME.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            reset_database: env::var("RESET_DATABASE").is_ok(),
            db_timeout: parse_timeout(env::var("DB_TIMEOUT_SECS").ok()),
        }
    }
}

fn parse_timeout(raw: Option<String>) -> Duration {
    let secs = raw
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DB_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults_when_unset_or_garbage() {
        assert_eq!(parse_timeout(None), Duration::from_secs(5));
        assert_eq!(parse_timeout(Some("soon".into())), Duration::from_secs(5));
    }

    #[test]
    fn timeout_parses_seconds() {
        assert_eq!(parse_timeout(Some("30".into())), Duration::from_secs(30));
    }
}
