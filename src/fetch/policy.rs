use async_trait::async_trait;
use http::Method;

use super::probe::DefaultProxyCheck;
use crate::codec::RequestOptions;

/// Per-call decisions of [`QueryFetch`](super::QueryFetch).
///
/// Every method has a default, so implementors override only what they need.
#[async_trait]
pub trait CachePolicy: Send + Sync {
    /// Whether the call takes part in deduplication at all. Defaults to `GET`
    /// requests only.
    async fn should_cache(&self, _url: &str, options: &RequestOptions) -> bool {
        options.method() == Method::GET
    }

    async fn calculate_cache_key(&self, url: &str, _options: &RequestOptions) -> String {
        url.to_string()
    }

    async fn in_memory_cache_enabled(&self) -> bool {
        true
    }

    /// Whether calls go through the proxy. `default` runs the built-in check,
    /// so overrides can refine it instead of replacing it.
    async fn proxy_enabled(&self, default: DefaultProxyCheck<'_>) -> bool {
        default.check().await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl CachePolicy for DefaultPolicy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_get_requests_only() {
        let policy = DefaultPolicy;
        assert!(policy.should_cache("https://example.com", &RequestOptions::new()).await);
        assert!(
            !policy
                .should_cache(
                    "https://example.com",
                    &RequestOptions::new().with_method(Method::POST)
                )
                .await
        );
        assert_eq!(
            policy
                .calculate_cache_key("https://example.com", &RequestOptions::new())
                .await,
            "https://example.com"
        );
        assert!(policy.in_memory_cache_enabled().await);
    }
}
