use std::env;

use essentials::warn;

pub const PORT_VAR: &str = "QUERY_CACHE_PORT";
pub const HOST_VAR: &str = "QUERY_CACHE_HOST";
pub const ACTIVE_VAR: &str = "QUERY_CACHE_ACTIVE";

/// Where the proxy lives and whether this process runs inside a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub host: String,
    pub port: Option<u16>,
    /// Set during non-interactive builds, the only context in which the
    /// proxy is consulted by default.
    pub build_context: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            build_context: false,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var(HOST_VAR).unwrap_or(defaults.host),
            port: env::var(PORT_VAR).ok().and_then(|port| {
                port.trim()
                    .parse()
                    .inspect_err(|e| warn!(value = %port, error = %e, "Ignoring invalid proxy port"))
                    .ok()
            }),
            build_context: is_truthy(env::var("CI").ok()) || is_truthy(env::var(ACTIVE_VAR).ok()),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_build_context(mut self, build_context: bool) -> Self {
        self.build_context = build_context;
        self
    }

    /// Base url of the proxy, if a port is known.
    pub fn proxy_url(&self) -> Option<String> {
        self.port.map(|port| format!("http://{}:{}/", self.host, port))
    }
}

fn is_truthy(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("1") | Some("true") | Some("TRUE") | Some("True")
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builds_proxy_url() {
        let config = FetchConfig::default().with_port(4000);
        assert_eq!(config.proxy_url().as_deref(), Some("http://127.0.0.1:4000/"));
        assert_eq!(FetchConfig::default().proxy_url(), None);
    }

    #[test]
    fn recognizes_truthy_values() {
        assert!(is_truthy(Some("true".to_string())));
        assert!(is_truthy(Some("1".to_string())));
        assert!(!is_truthy(Some("false".to_string())));
        assert!(!is_truthy(Some(String::new())));
        assert!(!is_truthy(None));
    }
}
