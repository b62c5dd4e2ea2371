use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::dispatcher::DEFAULT_DISMISSAL_LABEL;
use crate::github::DEFAULT_API_URL;
use crate::ip_filter::AllowedNetworks;
use crate::status::DEFAULT_STATUS_CONTEXT;

#[derive(Clone)]
pub struct Config {
    /// Approvals needed for a `success` status. Zero means no change requests suffice.
    pub required_approval_count: u32,
    pub github_webhook_secret: String,
    pub github_access_token: String,
    /// Never empty.
    pub allowed_networks: AllowedNetworks,
    pub port: u16,
    pub github_api_url: String,
    pub status_context: String,
    pub dismissal_label: String,
    pub github_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required_approval_count = lookup("REQUIRED_APPROVAL_COUNT")
            .context("REQUIRED_APPROVAL_COUNT environment variable is required")?
            .trim()
            .parse::<u32>()
            .context("REQUIRED_APPROVAL_COUNT must be a non-negative integer")?;

        let github_webhook_secret = lookup("GITHUB_WEBHOOK_SECRET")
            .context("GITHUB_WEBHOOK_SECRET environment variable is required")?;

        let github_access_token = lookup("GITHUB_ACCESS_TOKEN")
            .context("GITHUB_ACCESS_TOKEN environment variable is required")?;

        let allowed_networks = AllowedNetworks::parse(
            &lookup("GITHUB_ALLOWED_IPS")
                .context("GITHUB_ALLOWED_IPS environment variable is required")?,
        )
        .context("GITHUB_ALLOWED_IPS must be a comma-separated list of IPs or CIDR ranges")?;
        if allowed_networks.is_empty() {
            bail!("GITHUB_ALLOWED_IPS must name at least one IP or CIDR range");
        }

        let port = parse_optional(lookup("PORT"))
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let github_api_url =
            parse_optional(lookup("GITHUB_API_URL")).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let status_context = parse_optional(lookup("STATUS_CONTEXT"))
            .unwrap_or_else(|| DEFAULT_STATUS_CONTEXT.to_string());

        let dismissal_label = parse_optional(lookup("DISMISSAL_LABEL"))
            .unwrap_or_else(|| DEFAULT_DISMISSAL_LABEL.to_string());

        let github_timeout = parse_optional(lookup("GITHUB_TIMEOUT_SECS"))
            .unwrap_or_else(|| "5".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("GITHUB_TIMEOUT_SECS must be a valid number")?;

        Ok(Config {
            required_approval_count,
            github_webhook_secret,
            github_access_token,
            allowed_networks,
            port,
            github_api_url,
            status_context,
            dismissal_label,
            github_timeout,
        })
    }
}

/// Treat missing, empty and whitespace-only values alike as unset.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
