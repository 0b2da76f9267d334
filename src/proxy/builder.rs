use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Result;
use essentials::info;

use super::{handler::ProxyHandler, service::CalculateCacheKey, ProxyService};
use crate::{
    codec::RequestOptions,
    http::server::Server as HttpServer,
    report::{NoopReporter, Reporter},
    Transport,
};

/// Creates a builder for a proxy performing real calls with `transport`.
pub fn builder(transport: impl Transport + 'static) -> ProxyServerBuilder {
    ProxyServerBuilder::new(Arc::new(transport))
}

/// A builder for the proxy server.
pub struct ProxyServerBuilder {
    transport: Arc<dyn Transport>,
    host: IpAddr,
    port: u16,
    calculate_cache_key: Option<Box<CalculateCacheKey>>,
    reporter: Arc<dyn Reporter>,
}

impl ProxyServerBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            calculate_cache_key: None,
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Set the host to listen on.
    /// The default host is 127.0.0.1
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the port to listen on.
    /// The default port is 0, which picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set how cache keys are derived from incoming requests.
    /// The default key is the request url.
    pub fn with_cache_key(
        mut self,
        calculate_cache_key: impl Fn(&str, &RequestOptions) -> String + Send + Sync + 'static,
    ) -> Self {
        self.calculate_cache_key = Some(Box::new(calculate_cache_key));
        self
    }

    /// Set the reporter receiving server cache hits.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Bind the listener. The port is known once this returns.
    pub async fn build(self) -> Result<ProxyServer> {
        let mut service = ProxyService::new(self.transport).with_reporter(self.reporter);
        if let Some(calculate_cache_key) = self.calculate_cache_key {
            service = service.with_cache_key(calculate_cache_key);
        }
        let service = Arc::new(service);
        let server = HttpServer::bind(
            SocketAddr::new(self.host, self.port),
            ProxyHandler::new(service.clone()),
        )
        .await?;
        Ok(ProxyServer {
            local_addr: server.local_addr()?,
            service,
            server,
        })
    }
}

pub struct ProxyServer {
    local_addr: SocketAddr,
    service: Arc<ProxyService>,
    server: HttpServer<ProxyHandler>,
}

impl ProxyServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn service(&self) -> &Arc<ProxyService> {
        &self.service
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr, "Proxy started");
        self.server.run().await
    }
}
