use std::str::FromStr;

use crate::models::ReservationStatus;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} should be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub exchange: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub db_pool_size: u32,
    pub run_migrations: bool,
    pub initial_status: ReservationStatus,
    pub amqp: AmqpConfig,
}

impl Config {
    /// Reads `.env` (when present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let initial_status =
            parse_or(&lookup, "RESERVATION_INITIAL_STATUS", ReservationStatus::Pending)?;
        if !initial_status.is_active() {
            return Err(ConfigError::Invalid {
                name: "RESERVATION_INITIAL_STATUS",
                value: initial_status.to_string(),
            });
        }

        let db_pool_size: u32 = parse_or(&lookup, "DB_POOL_SIZE", 10)?;
        if db_pool_size == 0 {
            return Err(ConfigError::Invalid { name: "DB_POOL_SIZE", value: "0".to_owned() });
        }

        Ok(Config {
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1".to_owned()),
            port: parse_or(&lookup, "PORT", 8080)?,
            db_pool_size,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            initial_status,
            amqp: AmqpConfig {
                enabled: parse_or(&lookup, "NOTIFICATIONS_ENABLED", true)?,
                host: lookup("AMQP_HOST").unwrap_or_else(|| "localhost".to_owned()),
                port: parse_or(&lookup, "AMQP_PORT", 5672)?,
                username: lookup("AMQP_USER").unwrap_or_else(|| "guest".to_owned()),
                password: lookup("AMQP_PASSWORD").unwrap_or_else(|| "guest".to_owned()),
                exchange: lookup("NOTIFICATION_EXCHANGE")
                    .unwrap_or_else(|| "restaurant.events".to_owned()),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
