//! # Configuration State
//!
//! Front desk configuration loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`BEDBOOK_*`)
//! 2. Defaults (this file)
//!
//! | Variable                  | Example        | Field                         |
//! |---------------------------|----------------|-------------------------------|
//! | `BEDBOOK_DB_PATH`         | `/tmp/bb.db`   | `database_path`               |
//! | `BEDBOOK_OPEN`            | `09:00`        | `hours.open`                  |
//! | `BEDBOOK_CLOSE`           | `21:30`        | `hours.close`                 |
//! | `BEDBOOK_SLOT_STEP`       | `15`           | `hours.slot_step_minutes`     |
//! | `BEDBOOK_SOON_MINUTES`    | `45`           | `hours.booked_soon_minutes`   |
//! | `BEDBOOK_UTC_OFFSET`      | `330`          | `hours.utc_offset_minutes`    |
//! | `BEDBOOK_OVERPAYMENT`     | `reject`       | `overpayment`                 |
//! | `BEDBOOK_CURRENCY_SYMBOL` | `₹`            | `currency_symbol`             |
//!
//! Configuration is read-only after initialization, so no lock is needed.

use std::path::PathBuf;

use bedbook_core::{BusinessHours, CoreError, OverpaymentPolicy};
use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::Serialize;
use thiserror::Error;

const DB_FILE_NAME: &str = "bedbook.db";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value we cannot use.
    #[error("Invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The parsed hours are inconsistent (e.g. close before open).
    #[error("Invalid business hours: {0}")]
    Hours(#[from] CoreError),

    /// No per-user data directory on this platform and no explicit path.
    #[error("Could not determine app data directory; set BEDBOOK_DB_PATH")]
    NoDataDir,

    #[error("Could not create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Front desk configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Opening hours, slot grid and the "booked soon" window.
    pub hours: BusinessHours,

    /// What to do with payments above the outstanding balance.
    pub overpayment: OverpaymentPolicy,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    /// Number of decimal places for currency
    pub currency_decimals: u8,
}

impl DeskConfig {
    /// Configuration with the given database path and default everything else.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        DeskConfig {
            database_path: path.into(),
            hours: BusinessHours::default(),
            overpayment: OverpaymentPolicy::default(),
            currency_symbol: "$".to_string(),
            currency_decimals: 2,
        }
    }

    /// Loads configuration from `BEDBOOK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup("BEDBOOK_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };
        let mut config = DeskConfig::with_database(database_path);

        let defaults = config.hours;
        let open = parse_var(&lookup, "BEDBOOK_OPEN", parse_time)?.unwrap_or(defaults.open);
        let close = parse_var(&lookup, "BEDBOOK_CLOSE", parse_time)?.unwrap_or(defaults.close);
        let step = parse_var(&lookup, "BEDBOOK_SLOT_STEP", parse_int::<i64>)?
            .unwrap_or(defaults.slot_step_minutes);
        let soon = parse_var(&lookup, "BEDBOOK_SOON_MINUTES", parse_int::<i64>)?
            .unwrap_or(defaults.booked_soon_minutes);
        let offset = parse_var(&lookup, "BEDBOOK_UTC_OFFSET", parse_int::<i32>)?
            .unwrap_or(defaults.utc_offset_minutes);
        config.hours = BusinessHours::new(open, close, step, soon, offset)?;

        if let Some(policy) = parse_var(&lookup, "BEDBOOK_OVERPAYMENT", parse_policy)? {
            config.overpayment = policy;
        }
        if let Some(symbol) = lookup("BEDBOOK_CURRENCY_SYMBOL") {
            config.currency_symbol = symbol;
        }

        Ok(config)
    }

    /// Creates the directory holding the database file, if any.
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Formats a cent amount as a currency string.
    ///
    /// ## Example
    /// ```rust
    /// use front_desk::DeskConfig;
    ///
    /// let config = DeskConfig::with_database("bedbook.db");
    /// assert_eq!(config.format_currency(1234), "$12.34");
    /// assert_eq!(config.format_currency(-50), "-$0.50");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let divisor = 10_i64.pow(self.currency_decimals as u32);
        let whole = (cents / divisor).abs();
        let frac = (cents % divisor).abs();
        let sign = if cents < 0 { "-" } else { "" };

        if self.currency_decimals > 0 {
            format!(
                "{}{}{}.{:0width$}",
                sign,
                self.currency_symbol,
                whole,
                frac,
                width = self.currency_decimals as usize
            )
        } else {
            format!("{}{}{}", sign, self.currency_symbol, whole)
        }
    }
}

/// Platform data directory, e.g. `~/.local/share/bedbook/bedbook.db` on Linux.
fn default_database_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("com", "bedbook", "bedbook").ok_or(ConfigError::NoDataDir)?;
    Ok(dirs.data_dir().join(DB_FILE_NAME))
}

fn parse_var<F, T, P>(lookup: &F, key: &'static str, parse: P) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => parse(value.trim())
            .map(Some)
            .map_err(|reason| ConfigError::Invalid { key, value, reason }),
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| "expected HH:MM".to_string())
}

fn parse_int<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value.parse::<T>().map_err(|_| "expected an integer".to_string())
}

fn parse_policy(value: &str) -> Result<OverpaymentPolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "allow" => Ok(OverpaymentPolicy::Allow),
        "reject" => Ok(OverpaymentPolicy::Reject),
        _ => Err("expected allow or reject".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DeskConfig::from_lookup(lookup(&[("BEDBOOK_DB_PATH", "/tmp/bb.db")])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/bb.db"));
        assert_eq!(config.hours, BusinessHours::default());
        assert_eq!(config.overpayment, OverpaymentPolicy::Allow);
    }

    #[test]
    fn test_env_overrides() {
        let config = DeskConfig::from_lookup(lookup(&[
            ("BEDBOOK_DB_PATH", "/tmp/bb.db"),
            ("BEDBOOK_OPEN", "09:00"),
            ("BEDBOOK_CLOSE", "21:30"),
            ("BEDBOOK_SLOT_STEP", "15"),
            ("BEDBOOK_SOON_MINUTES", "45"),
            ("BEDBOOK_UTC_OFFSET", "330"),
            ("BEDBOOK_OVERPAYMENT", "Reject"),
            ("BEDBOOK_CURRENCY_SYMBOL", "₹"),
        ]))
        .unwrap();

        assert_eq!(config.hours.open, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.hours.close, NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        assert_eq!(config.hours.slot_step_minutes, 15);
        assert_eq!(config.hours.booked_soon_minutes, 45);
        assert_eq!(config.hours.utc_offset_minutes, 330);
        assert_eq!(config.overpayment, OverpaymentPolicy::Reject);
        assert_eq!(config.format_currency(990), "₹9.90");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DeskConfig::from_lookup(lookup(&[
            ("BEDBOOK_DB_PATH", "/tmp/bb.db"),
            ("BEDBOOK_SLOT_STEP", "half an hour"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BEDBOOK_SLOT_STEP", .. }));

        let err = DeskConfig::from_lookup(lookup(&[
            ("BEDBOOK_DB_PATH", "/tmp/bb.db"),
            ("BEDBOOK_OPEN", "22:00"),
            ("BEDBOOK_CLOSE", "08:00"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Hours(_)));

        let err = DeskConfig::from_lookup(lookup(&[
            ("BEDBOOK_DB_PATH", "/tmp/bb.db"),
            ("BEDBOOK_OVERPAYMENT", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_format_currency() {
        let config = DeskConfig::with_database("bedbook.db");
        assert_eq!(config.format_currency(0), "$0.00");
        assert_eq!(config.format_currency(1), "$0.01");
        assert_eq!(config.format_currency(-1234), "-$12.34");
        assert_eq!(config.format_currency(123456789), "$1234567.89");
    }
}
