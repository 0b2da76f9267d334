use async_trait::async_trait;
use essentials::debug;
use hyper::ext::ReasonPhrase;
use reqwest::{redirect::Policy, Client, Response, Url};

use super::Transport;
use crate::{
    codec::{Body, FetchResponse, Redirect, RequestOptions},
    Error, Result,
};

/// [`Transport`] over the network, backed by `reqwest`.
///
/// Redirect handling is a client setting in `reqwest`, so one client is kept
/// per [`Redirect`] policy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    follow: Client,
    manual: Client,
    error: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            follow: build_client(Policy::default())?,
            manual: build_client(Policy::none())?,
            error: build_client(Policy::custom(|attempt| {
                attempt.error("redirects are not allowed for this request")
            }))?,
        })
    }

    fn client(&self, redirect: Option<Redirect>) -> &Client {
        match redirect {
            None | Some(Redirect::Follow) => &self.follow,
            Some(Redirect::Manual) => &self.manual,
            Some(Redirect::Error) => &self.error,
        }
    }
}

fn build_client(policy: Policy) -> Result<Client> {
    Client::builder()
        .redirect(policy)
        .build()
        .map_err(Error::transport)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Box<dyn FetchResponse>> {
        let method = options.method();
        debug!(url = url, method = %method, "Performing request");
        let mut request = self.client(options.redirect).request(method, url);
        for (name, value) in options.headers.normalize() {
            request = request.header(name, value);
        }
        request = match &options.body {
            Some(Body::Text(text)) => request.body(text.clone()),
            Some(Body::Bytes(bytes)) => request.body(bytes.clone()),
            None => request,
        };
        let response = request.send().await.map_err(Error::transport)?;
        let redirected = Url::parse(url)
            .map(|requested| requested != *response.url())
            .unwrap_or(false);
        debug!(url = url, status = response.status().as_u16(), redirected = redirected, "Request finished");
        Ok(Box::new(HttpResponse::new(response, redirected)))
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    url: String,
    redirected: bool,
    inner: Response,
}

impl HttpResponse {
    fn new(inner: Response, redirected: bool) -> Self {
        Self {
            url: inner.url().to_string(),
            redirected,
            inner,
        }
    }
}

#[async_trait]
impl FetchResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// The reason phrase sent by the origin, or the canonical one when the
    /// origin sent the standard phrase.
    fn status_text(&self) -> &str {
        self.inner
            .extensions()
            .get::<ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .or_else(|| self.inner.status().canonical_reason())
            .unwrap_or_default()
    }

    fn redirected(&self) -> bool {
        self.redirected
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.inner
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    async fn text(self: Box<Self>) -> Result<String> {
        self.inner.text().await.map_err(Error::body_read)
    }
}
