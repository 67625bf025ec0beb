use std::fmt;
use std::time::Duration;

use crate::collect::global_variables::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, ENV_OUT_SR, ENV_TIMEOUT_SECS, ENV_TOKEN,
};
use crate::error::{ArcGisError, Result};
use crate::geo_core::SpatialReference;

/// Settings shared by every request issued through a `ServiceHandle`
#[derive(Clone)]
pub struct ClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
    /// Opaque token appended to every request as the `token` parameter
    pub token: Option<String>,
    /// Output spatial reference for query geometries (server default when `None`)
    pub out_sr: Option<SpatialReference>,
    /// When set, queries page through `exceededTransferLimit` responses
    /// with this many records per request
    pub page_size: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token: None,
            out_sr: None,
            page_size: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("out_sr", &self.out_sr)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration overlaid with `ARCGIS_TOKEN`, `ARCGIS_TIMEOUT_SECS`
    /// and `ARCGIS_OUT_SR` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::default();

        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty()) {
            config.token = Some(token.trim().to_string());
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ArcGisError::Config(format!("{} must be a whole number of seconds, got '{}'", ENV_TIMEOUT_SECS, raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_OUT_SR) {
            let wkid: i32 = raw.trim().parse().map_err(|_| {
                ArcGisError::Config(format!("{} must be a numeric WKID, got '{}'", ENV_OUT_SR, raw))
            })?;
            config.out_sr = Some(SpatialReference::new(wkid));
        }

        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_out_sr(mut self, out_sr: SpatialReference) -> Self {
        self.out_sr = Some(out_sr);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }
}
