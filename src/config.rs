use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_DATABASE_PATH: &str = "portal.db";
pub const DEFAULT_SENDCHAMP_BASE_URL: &str = "https://api.sendchamp.com/api/v1";
pub const DEFAULT_SENDER_NAME: &str = "SC-OTP";
pub const DEFAULT_ROUTE: &str = "dnd";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION: &str = "2023/2024";
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";

/// Gateway settings. `api_key` is optional so the portal still starts without it.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub sender_name: String,
    pub route: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub sms: SmsSettings,
    /// Academic session label stamped on new assignments and results.
    pub session: String,
    pub admin: Option<AdminSeed>,
}

impl Settings {
    /// Loads `.env` (if any) and reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs = match get("SMS_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("SMS_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: get("ADMIN_NAME").unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
                email,
                password,
            }),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!("[settings] ADMIN_EMAIL and ADMIN_PASSWORD must both be set; skipping admin seed.");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            database_path: PathBuf::from(
                get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            sms: SmsSettings {
                api_key: get("SENDCHAMP_API_KEY"),
                base_url: get("SENDCHAMP_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SENDCHAMP_BASE_URL.to_string()),
                sender_name: get("SMS_SENDER_NAME").unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
                route: get("SMS_ROUTE").unwrap_or_else(|| DEFAULT_ROUTE.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            session: get("ACADEMIC_SESSION").unwrap_or_else(|| DEFAULT_SESSION.to_string()),
            admin,
        })
    }
}
