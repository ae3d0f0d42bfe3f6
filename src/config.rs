use crate::identity_lock::LockStrategy;

/// Production Help Scout Mailbox API endpoint.
pub const DEFAULT_HELPSCOUT_BASE_URL: &str = "https://api.helpscout.net/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub helpscout_api_key: String,
    pub helpscout_base_url: String,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub identity_lock: LockStrategy,
    pub webhook_secret: Option<String>, // Optional: ingest is open when unset
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_source(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Help Scout Base URL: {}", config.helpscout_base_url);
        tracing::debug!(
            "Request timeout: {}s, max retries: {}",
            config.request_timeout_secs,
            config.max_retries
        );
        tracing::debug!("Identity lock strategy: {:?}", config.identity_lock);
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set, /v1/identify accepts unauthenticated requests");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    fn from_source<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            helpscout_api_key: var("HELPSCOUT_API_KEY")
                .ok_or_else(|| anyhow::anyhow!("HELPSCOUT_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("HELPSCOUT_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            helpscout_base_url: var("HELPSCOUT_BASE_URL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HELPSCOUT_BASE_URL.to_string())
                .parse::<url::Url>()
                .map_err(|e| anyhow::anyhow!("HELPSCOUT_BASE_URL is not a valid URL: {}", e))
                .and_then(|url| {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        anyhow::bail!("HELPSCOUT_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.as_str().trim_end_matches('/').to_string())
                })?,
            request_timeout_secs: var("HELPSCOUT_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HELPSCOUT_TIMEOUT_SECS must be a whole number"))?,
            max_retries: var("HELPSCOUT_MAX_RETRIES")
                .unwrap_or_else(|| "2".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HELPSCOUT_MAX_RETRIES must be a whole number"))?,
            retry_base_delay_ms: var("HELPSCOUT_RETRY_BASE_MS")
                .unwrap_or_else(|| "500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HELPSCOUT_RETRY_BASE_MS must be a whole number"))?,
            identity_lock: var("IDENTITY_LOCK")
                .map(|s| s.parse::<LockStrategy>())
                .transpose()?
                .unwrap_or_default(),
            webhook_secret: var("WEBHOOK_SECRET").filter(|s| !s.trim().is_empty()),
        })
    }
}
