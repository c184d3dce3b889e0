use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;

pub const DEFAULT_MAX_CREDITS: i64 = 24;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub max_credits_per_semester: i64,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://registrar.db?mode=rwc".to_string());
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let max_connections = parse_var("DB_MAX_CONNECTIONS", 5)?;
        let max_credits_per_semester = parse_var("MAX_CREDITS_PER_SEMESTER", DEFAULT_MAX_CREDITS)?;

        if max_credits_per_semester <= 0 {
            return Err(AppError::Config(
                "MAX_CREDITS_PER_SEMESTER must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            max_credits_per_semester,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
