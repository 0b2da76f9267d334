use anyhow::{Context, Result};
use async_trait::async_trait;
use essentials::{debug, warn};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};

#[async_trait]
pub trait Handler {
    async fn handle(&self, stream: TcpStream);
}

pub struct Server<H: Handler + Send + Sync + 'static> {
    listener: TcpListener,
    handler: Arc<H>,
}

impl<H: Handler + Send + Sync + 'static> Server<H> {
    /// Binds the listener right away so the port is known before [`Server::run`].
    pub async fn bind(addr: SocketAddr, handler: H) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to address: {}", addr))?;
        debug!("Listening on: {}", listener.local_addr()?);
        Ok(Self {
            listener,
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read the listener address")
    }

    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Failed to accept connection: {:?}", e);
                    continue;
                }
            };
            debug!("Accepted connection from: {}", peer);
            let handler = self.handler.clone();
            tokio::spawn(async move {
                handler.handle(stream).await;
            });
        }
    }
}
