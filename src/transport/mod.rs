mod client;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::{HttpResponse, HttpTransport};
use crate::{
    codec::{FetchResponse, RequestOptions},
    Result,
};

/// Performs a real outbound request.
///
/// The engine never talks to the network itself: both the proxy and the
/// client are handed a transport, which is also how tests hold calls pending.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Box<dyn FetchResponse>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Box<dyn FetchResponse>> {
        (**self).fetch(url, options).await
    }
}
