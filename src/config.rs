use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
#[cfg(test)]
use std::collections::HashMap;
use std::env;

pub const DEFAULT_API_BASE_URL: &str = "https://mobile.southwest.com/api";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/13.0.5 Safari/605.1.15";

/// Credentials for the HTTP email API
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub bcc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Airline API
    pub airline_base_url: String,
    pub user_agent: String,
    pub airline_api_key: Option<String>,
    /// Extra headers sent on every airline request (e.g. captured session headers)
    pub airline_headers: BTreeMap<String, String>,
    pub request_timeout_secs: u64,

    // Scheduling
    pub check_in_skew_secs: i64,
    pub transient_retry_secs: u64,
    pub max_transient_retries: u32,

    // Email notifications (disabled when not configured)
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|s| !s.trim().is_empty());

        let airline_headers = match get("AIRLINE_API_HEADERS") {
            Some(raw) => serde_json::from_str(&raw)
                .context("AIRLINE_API_HEADERS must be a JSON object of string values")?,
            None => BTreeMap::new(),
        };

        let mail = match (get("MAIL_API_URL"), get("MAIL_API_KEY"), get("MAIL_FROM")) {
            (Some(api_url), Some(api_key), Some(from)) => Some(MailConfig {
                api_url,
                api_key,
                from,
                bcc: get("MAIL_BCC"),
            }),
            (None, None, None) => None,
            (url, key, from) => {
                let missing: Vec<&str> = [
                    ("MAIL_API_URL", url.is_none()),
                    ("MAIL_API_KEY", key.is_none()),
                    ("MAIL_FROM", from.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name)
                .collect();
                bail!("Email is partially configured; missing {}", missing.join(", "))
            }
        };

        Ok(Config {
            airline_base_url: get("AIRLINE_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            user_agent: get("AIRLINE_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            airline_api_key: get("AIRLINE_API_KEY"),
            airline_headers,
            request_timeout_secs: get("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,

            check_in_skew_secs: get("CHECK_IN_SKEW_SECS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("CHECK_IN_SKEW_SECS must be an integer")?,
            transient_retry_secs: get("TRANSIENT_RETRY_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_transient_retries: get("MAX_TRANSIENT_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),

            mail,
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !Self::is_http_url(&self.airline_base_url) {
            errors.push(format!(
                "AIRLINE_API_BASE_URL '{}' must start with http:// or https://.",
                self.airline_base_url
            ));
        }

        if self.user_agent.trim().is_empty() {
            errors.push("AIRLINE_USER_AGENT cannot be empty.".to_string());
        }

        if !(0..=59).contains(&self.check_in_skew_secs) {
            errors.push(format!(
                "CHECK_IN_SKEW_SECS={} out of range (0-59).",
                self.check_in_skew_secs
            ));
        }

        if self.request_timeout_secs == 0 {
            errors.push("REQUEST_TIMEOUT_SECS must be greater than 0.".to_string());
        } else if self.request_timeout_secs > 300 {
            errors.push(format!(
                "REQUEST_TIMEOUT_SECS={} seems too long (max recommended: 300).",
                self.request_timeout_secs
            ));
        }

        if self.transient_retry_secs == 0 {
            errors.push("TRANSIENT_RETRY_SECS must be greater than 0.".to_string());
        }

        if let Some(mail) = &self.mail {
            if !Self::is_http_url(&mail.api_url) {
                errors.push(format!(
                    "MAIL_API_URL '{}' must start with http:// or https://.",
                    mail.api_url
                ));
            }
            if !Self::looks_like_email(&mail.from) {
                errors.push(format!("MAIL_FROM '{}' is not an email address.", mail.from));
            }
            if let Some(bcc) = &mail.bcc {
                if !Self::looks_like_email(bcc) {
                    errors.push(format!("MAIL_BCC '{}' is not an email address.", bcc));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    fn is_http_url(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Loose check: something@something, optionally as `Name <addr>`
    pub fn looks_like_email(addr: &str) -> bool {
        let addr = match (addr.find('<'), addr.rfind('>')) {
            (Some(start), Some(end)) if start < end => &addr[start + 1..end],
            _ => addr,
        };
        match addr.trim().split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
            None => false,
        }
    }
}
