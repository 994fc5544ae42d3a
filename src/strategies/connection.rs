//! Connection settings shared by the database drivers

use super::options::{get_int, get_str};
use super::StrategyError;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
}

/// Validate `host`, `port`, `username` and `password`
///
/// Host and username must be non-empty strings. An empty or missing password
/// only logs a warning. The port defaults to `default_port`.
pub fn validate_connection(
    driver: &'static str,
    options: &toml::Table,
    default_port: u16,
) -> Result<ConnectionInfo, StrategyError> {
    let host = required_string(driver, options, "host")?;
    let username = required_string(driver, options, "username")?;

    let password = get_str(driver, options, "password")?
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if password.is_none() {
        warn!("The '{}' password is empty! It may be okay, maybe not", driver);
    }

    let port = match get_int(driver, options, "port")? {
        None => default_port,
        Some(p) if (1..=65535).contains(&p) => p as u16,
        Some(p) => {
            return Err(StrategyError::validation(
                driver,
                format!("the given 'port' ({}) should be between 1 and 65535", p),
            ))
        }
    };

    Ok(ConnectionInfo {
        host,
        port,
        username,
        password,
    })
}

fn required_string(
    driver: &'static str,
    options: &toml::Table,
    key: &str,
) -> Result<String, StrategyError> {
    match get_str(driver, options, key)? {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(StrategyError::validation(
            driver,
            format!("you should pass a non-empty '{}' option", key),
        )),
    }
}
