//! Client configuration loaded from environment variables.
//!
//! All settings have defaults pointing at the public services, so a client
//! works with zero configuration.

use std::time::Duration;

use storylink_shared::constants::{
    DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LINK_API_URL, DEFAULT_REALTIME_URL,
    DEFAULT_STORY_NAME_LEN,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Realtime service endpoint, speaking JSON `{event, data}` WebSocket frames.
    /// Env: `STORYLINK_REALTIME_URL`
    pub realtime_url: String,

    /// Base URL of the story metadata API.
    /// Env: `STORYLINK_API_URL`
    pub api_url: String,

    /// Link-shortening endpoint used to create pairing links.
    /// Env: `STORYLINK_LINK_API_URL`
    pub link_api_url: String,

    /// Key sent to the link-shortening service.
    /// Env: `STORYLINK_LINK_KEY`
    /// Default: empty.
    pub link_key: String,

    /// Number of view key characters naming a freshly minted story.
    /// Env: `STORYLINK_STORY_NAME_LEN`
    /// Default: `20`
    pub story_name_len: usize,

    /// Timeout for metadata and link requests.
    /// Env: `STORYLINK_HTTP_TIMEOUT_SECS`
    /// Default: `10`
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            link_api_url: DEFAULT_LINK_API_URL.to_string(),
            link_key: String::new(),
            story_name_len: DEFAULT_STORY_NAME_LEN,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("STORYLINK_REALTIME_URL") {
            config.realtime_url = url;
        }

        if let Some(url) = lookup("STORYLINK_API_URL") {
            config.api_url = url;
        }

        if let Some(url) = lookup("STORYLINK_LINK_API_URL") {
            config.link_api_url = url;
        }

        if let Some(key) = lookup("STORYLINK_LINK_KEY") {
            config.link_key = key;
        }

        if let Some(val) = lookup("STORYLINK_STORY_NAME_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.story_name_len = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid STORYLINK_STORY_NAME_LEN, using default"
                ),
            }
        }

        if let Some(val) = lookup("STORYLINK_HTTP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.http_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid STORYLINK_HTTP_TIMEOUT_SECS, using default"
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.story_name_len, 20);
        assert_eq!(config.realtime_url, DEFAULT_REALTIME_URL);
        assert!(config.link_key.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STORYLINK_API_URL", "http://localhost:3000"),
            ("STORYLINK_LINK_KEY", "key_test"),
            ("STORYLINK_STORY_NAME_LEN", "12"),
            ("STORYLINK_HTTP_TIMEOUT_SECS", "3"),
        ]);
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.link_key, "key_test");
        assert_eq!(config.story_name_len, 12);
        assert_eq!(config.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("STORYLINK_STORY_NAME_LEN", "0"),
            ("STORYLINK_HTTP_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.story_name_len, DEFAULT_STORY_NAME_LEN);
        assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    }
}
