//! Installer configuration.
//!
//! Environment variables:
//! - `LR_ENABLED`: `false`/`0`/`no`/`off` turns installation into a no-op
//! - `LR_PROXY_PREFIX`: proxy name prefix (default `LogRedact`)
//! - `LR_ERROR_POLICY`: `ignore` (default) or `propagate`

use serde::{Deserialize, Serialize};

use crate::proxy::{ErrorPolicy, DEFAULT_PROXY_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Whether installation wraps anything at all.
    pub enabled: bool,

    /// Prefix of proxy sink names (`<prefix>-<original>`).
    pub proxy_prefix: String,

    pub error_policy: ErrorPolicy,
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            enabled: true,
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            error_policy: ErrorPolicy::Ignore,
        }
    }
}

impl InstallConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup. Unparseable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = InstallConfig::default();

        if let Some(enabled) = lookup("LR_ENABLED").as_deref().and_then(parse_flag) {
            config.enabled = enabled;
        }
        if let Some(prefix) = lookup("LR_PROXY_PREFIX") {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                config.proxy_prefix = prefix.to_string();
            }
        }
        if let Some(policy) = lookup("LR_ERROR_POLICY").and_then(|v| v.parse().ok()) {
            config.error_policy = policy;
        }

        config
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_proxy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.proxy_prefix = prefix.into();
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
