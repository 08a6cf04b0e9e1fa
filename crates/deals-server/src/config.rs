use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::Result;
use chrono::Duration;
use tracing::{debug, warn};

use deals_api::ApiConfig;

const DEV_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = var("DEALS_JWT_SECRET").unwrap_or_else(|| DEV_SECRET.into());
        if jwt_secret == DEV_SECRET {
            warn!("DEALS_JWT_SECRET is not set, using the development secret");
        }

        let access_minutes: i64 = try_load("DEALS_ACCESS_TOKEN_MINUTES", "30")?;
        let refresh_days: i64 = try_load("DEALS_REFRESH_TOKEN_DAYS", "7")?;

        Ok(Self {
            host: var("DEALS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: try_load("DEALS_PORT", "3000")?,
            db_path: PathBuf::from(var("DEALS_DB_PATH").unwrap_or_else(|| "deals.db".into())),
            jwt_secret,
            api: ApiConfig {
                access_token_ttl: Duration::minutes(access_minutes),
                refresh_token_ttl: Duration::days(refresh_days),
                admin_emails: var("DEALS_ADMIN_EMAILS")
                    .map(|raw| parse_list(&raw))
                    .unwrap_or_default(),
                lock_decided_content: try_load("DEALS_LOCK_DECIDED_CONTENT", "true")?,
                secure_cookies: try_load("DEALS_SECURE_COOKIES", "false")?,
            },
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}

/// Comma-separated, case-insensitive.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_is_trimmed_and_lowercased() {
        assert_eq!(
            parse_list(" Boss@Example.com, ,ops@example.com "),
            vec!["boss@example.com", "ops@example.com"]
        );
        assert!(parse_list("").is_empty());
    }
}
