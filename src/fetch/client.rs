use std::{collections::HashMap, sync::Arc};

use essentials::{debug, warn};
use http::Method;

use super::{
    policy::{CachePolicy, DefaultPolicy},
    probe::{DefaultProxyCheck, ProxyStatus},
};
use crate::{
    codec::{
        serialize_response, FetchResponse, QueryFetchResponse, RequestOptions, SerializedRequest,
        SerializedResponse,
    },
    config::FetchConfig,
    report::{CacheHit, CacheType, NoopReporter, Reporter},
    store::{CoalescingStore, Lookup, RequestState},
    Error, Result, Transport,
};

/// A builder for [`QueryFetch`].
pub struct QueryFetchBuilder {
    transport: Arc<dyn Transport>,
    policy: Arc<dyn CachePolicy>,
    config: FetchConfig,
    proxy_status: Arc<ProxyStatus>,
    reporter: Arc<dyn Reporter>,
}

impl QueryFetchBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: Arc::new(DefaultPolicy),
            config: FetchConfig::from_env(),
            proxy_status: ProxyStatus::shared(),
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Set the per-call decisions.
    /// The default is [`DefaultPolicy`].
    pub fn with_policy(mut self, policy: impl CachePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Set where the proxy lives.
    /// The default is read from the environment.
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Use a separate probe outcome instead of the process-wide one.
    pub fn with_proxy_status(mut self, proxy_status: Arc<ProxyStatus>) -> Self {
        self.proxy_status = proxy_status;
        self
    }

    /// Set the reporter receiving memory cache hits.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn build(self) -> QueryFetch {
        QueryFetch {
            store: CoalescingStore::new(),
            transport: self.transport,
            policy: self.policy,
            config: self.config,
            proxy_status: self.proxy_status,
            reporter: self.reporter,
        }
    }
}

/// Deduplicating fetch: an in-process cache in front of the shared proxy.
pub struct QueryFetch {
    store: CoalescingStore,
    transport: Arc<dyn Transport>,
    policy: Arc<dyn CachePolicy>,
    config: FetchConfig,
    proxy_status: Arc<ProxyStatus>,
    reporter: Arc<dyn Reporter>,
}

impl QueryFetch {
    pub fn builder(transport: impl Transport + 'static) -> QueryFetchBuilder {
        QueryFetchBuilder::new(Arc::new(transport))
    }

    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    pub fn cache(&self) -> CacheView<'_> {
        CacheView { store: &self.store }
    }

    pub fn proxy_status(&self) -> &Arc<ProxyStatus> {
        &self.proxy_status
    }

    pub async fn query_fetch(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Box<dyn FetchResponse>> {
        if !self.policy.should_cache(url, options).await {
            debug!(url = url, "Request is not cached");
            return self.transport.fetch(url, options).await;
        }
        if !self.policy.in_memory_cache_enabled().await {
            return self.normalized_fetch(url, options).await;
        }
        let key = self.policy.calculate_cache_key(url, options).await;
        let response = match self.store.lookup(&key) {
            Lookup::Resolved(response) => {
                self.report(key);
                response
            }
            Lookup::Wait(waiter) => {
                debug!(key = %key, "Waiting for inflight request");
                let response = waiter.wait().await?;
                self.report(key);
                response
            }
            Lookup::Owner(guard) => {
                let result = match self.normalized_fetch(url, options).await {
                    Ok(response) => serialize_response(response).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(response) => guard.resolve(response),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Request failed");
                        guard.fail(e.clone());
                        return Err(e);
                    }
                }
            }
        };
        Ok(Box::new(QueryFetchResponse::new(response.as_ref().clone())))
    }

    fn report(&self, key: String) {
        self.reporter
            .report(&CacheHit::new(key, CacheType::MemoryCache));
    }

    /// Sends the call through the proxy when it is enabled and the body can
    /// cross it, and directly otherwise.
    async fn normalized_fetch(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Box<dyn FetchResponse>> {
        let default = DefaultProxyCheck {
            config: &self.config,
            status: &self.proxy_status,
            transport: self.transport.as_ref(),
        };
        if !self.policy.proxy_enabled(default).await {
            return self.transport.fetch(url, options).await;
        }
        let Ok(request) = SerializedRequest::strict(url, options) else {
            debug!(url = url, "Body cannot cross the proxy, requesting directly");
            return self.transport.fetch(url, options).await;
        };
        let proxy_url = self
            .config
            .proxy_url()
            .ok_or_else(|| Error::ProxyUnreachable("proxy port is not configured".to_string()))?;
        let body = serde_json::to_string(&request).map_err(Error::decode)?;
        let proxy_options = RequestOptions::new()
            .with_method(Method::POST)
            .with_body(body)
            .with_header("content-type", "application/json");
        debug!(url = url, proxy = %proxy_url, "Requesting through proxy");
        let response = self.transport.fetch(&proxy_url, &proxy_options).await?;
        if !response.ok() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|e| e.to_string());
            return Err(Error::ProxyResponse { status, body });
        }
        let serialized = serde_json::from_str::<SerializedResponse>(&response.text().await?)
            .map_err(Error::decode)?;
        Ok(Box::new(QueryFetchResponse::new(serialized)))
    }
}

/// Read access to a client's in-process cache, plus [`CacheView::clear`].
pub struct CacheView<'a> {
    store: &'a CoalescingStore,
}

impl CacheView<'_> {
    pub fn get(&self, key: &str) -> Option<RequestState> {
        self.store.get(key)
    }

    pub fn snapshot(&self) -> HashMap<String, RequestState> {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn clear(&self) {
        self.store.clear();
    }
}
