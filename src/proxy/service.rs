use std::sync::Arc;

use essentials::{debug, warn};

use crate::{
    codec::{serialize_response, RequestOptions, SerializedRequest, SerializedResponse},
    report::{CacheHit, CacheType, NoopReporter, Reporter},
    store::{CoalescingStore, Lookup},
    Result, Transport,
};

pub(crate) type CalculateCacheKey = dyn Fn(&str, &RequestOptions) -> String + Send + Sync + 'static;

/// Performs each real call at most once per cache key and answers every
/// caller with the same serialized response.
pub struct ProxyService {
    store: CoalescingStore,
    transport: Arc<dyn Transport>,
    calculate_cache_key: Box<CalculateCacheKey>,
    reporter: Arc<dyn Reporter>,
}

impl ProxyService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            store: CoalescingStore::new(),
            transport,
            calculate_cache_key: Box::new(|url, _| url.to_string()),
            reporter: Arc::new(NoopReporter),
        }
    }

    pub fn with_cache_key(
        mut self,
        calculate_cache_key: impl Fn(&str, &RequestOptions) -> String + Send + Sync + 'static,
    ) -> Self {
        self.calculate_cache_key = Box::new(calculate_cache_key);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn cache(&self) -> &CoalescingStore {
        &self.store
    }

    pub async fn handle(&self, request: SerializedRequest) -> Result<Arc<SerializedResponse>> {
        let options = request.to_options()?;
        let key = (self.calculate_cache_key)(&request.url, &options);
        match self.store.lookup(&key) {
            Lookup::Resolved(response) => {
                debug!(key = %key, "Serving cached response");
                self.reporter
                    .report(&CacheHit::new(key, CacheType::ServerCache));
                Ok(response)
            }
            Lookup::Wait(waiter) => {
                debug!(key = %key, "Waiting for inflight request");
                let response = waiter.wait().await?;
                self.reporter
                    .report(&CacheHit::new(key, CacheType::ServerCache));
                Ok(response)
            }
            Lookup::Owner(guard) => {
                let result = match self.transport.fetch(&request.url, &options).await {
                    Ok(response) => serialize_response(response).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(response) => Ok(guard.resolve(response)),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Real request failed");
                        guard.fail(e.clone());
                        Err(e)
                    }
                }
            }
        }
    }
}
