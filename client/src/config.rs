use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub session_file: PathBuf,
    pub timezone: Option<Tz>,
    pub request_timeout: Duration,
    pub payment: PaymentConfig,
}

/// Budget for the payment-status polling task.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(900),
            max_consecutive_failures: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("CLINIC_API_URL").context("CLINIC_API_URL must be set")?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            anyhow::bail!("CLINIC_API_URL must be an http(s) URL, got {api_url}");
        }

        let timezone = match std::env::var("CLINIC_TIMEZONE") {
            Ok(name) if !name.trim().is_empty() => Some(
                name.trim()
                    .parse::<Tz>()
                    .map_err(|e| anyhow::anyhow!("CLINIC_TIMEZONE is not a valid IANA zone: {e}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            api_url,
            session_file: std::env::var("CLINIC_SESSION_FILE")
                .unwrap_or_else(|_| ".clinic-session.json".into())
                .into(),
            timezone,
            request_timeout: Duration::from_secs(secs_var("CLINIC_REQUEST_TIMEOUT_SECS", 30)?),
            payment: PaymentConfig {
                poll_interval: Duration::from_secs(secs_var("PAYMENT_POLL_INTERVAL_SECS", 5)?),
                timeout: Duration::from_secs(secs_var("PAYMENT_TIMEOUT_SECS", 900)?),
                max_consecutive_failures: std::env::var("PAYMENT_MAX_FAILURES")
                    .unwrap_or_else(|_| "5".into())
                    .parse()
                    .context("PAYMENT_MAX_FAILURES must be a number")?,
            },
        })
    }
}

fn secs_var(name: &str, default: u64) -> anyhow::Result<u64> {
    let secs: u64 = match std::env::var(name) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{name} must be a number of seconds"))?,
        Err(_) => default,
    };
    if secs == 0 {
        anyhow::bail!("{name} must be greater than zero");
    }
    Ok(secs)
}
