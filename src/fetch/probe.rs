use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use essentials::{debug, info, warn};
use serde::Deserialize;

use crate::{
    codec::RequestOptions,
    config::FetchConfig,
    store::{PubSub, Subscription},
    Error, Result, Transport,
};

/// Whether the local proxy has been reached by this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyConnectionState {
    #[default]
    NotChecked,
    Checking,
    Available,
    Unavailable,
}

/// Outcome of the proxy health probe, shared by every client of a process.
///
/// The probe runs once; callers arriving while it is running wait for its
/// outcome.
#[derive(Default)]
pub struct ProxyStatus {
    state: Mutex<ProxyConnectionState>,
    events: PubSub<ProxyConnectionState>,
}

enum Next {
    Settled(bool),
    Wait(Subscription<ProxyConnectionState>),
    Probe,
}

impl ProxyStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status shared by every client of this process that was not given
    /// its own.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<ProxyStatus>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    fn state(&self) -> MutexGuard<'_, ProxyConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> ProxyConnectionState {
        *self.state()
    }

    /// Returns whether the proxy is available, running `probe` if nobody has
    /// checked yet.
    pub async fn check<F, Fut>(&self, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let next = {
            let mut state = self.state();
            match *state {
                ProxyConnectionState::Available => Next::Settled(true),
                ProxyConnectionState::Unavailable => Next::Settled(false),
                ProxyConnectionState::Checking => Next::Wait(self.events.subscribe()),
                ProxyConnectionState::NotChecked => {
                    *state = ProxyConnectionState::Checking;
                    Next::Probe
                }
            }
        };
        match next {
            Next::Settled(available) => available,
            Next::Wait(mut subscription) => {
                debug!("Waiting for proxy probe");
                while let Some(state) = subscription.recv().await {
                    match state {
                        ProxyConnectionState::Available => return true,
                        ProxyConnectionState::Unavailable => return false,
                        _ => continue,
                    }
                }
                false
            }
            Next::Probe => {
                let guard = ProbeGuard {
                    status: self,
                    settled: false,
                };
                let available = probe().await;
                guard.settle(available);
                available
            }
        }
    }

    fn settle(&self, available: bool) {
        let state = if available {
            ProxyConnectionState::Available
        } else {
            ProxyConnectionState::Unavailable
        };
        *self.state() = state;
        info!(state = ?state, "Proxy probe finished");
        self.events.notify(state);
    }
}

/// Marks the proxy unavailable if the probing future is dropped.
struct ProbeGuard<'a> {
    status: &'a ProxyStatus,
    settled: bool,
}

impl ProbeGuard<'_> {
    fn settle(mut self, available: bool) {
        self.settled = true;
        self.status.settle(available);
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.status.settle(false);
        }
    }
}

/// The built-in proxy check handed to
/// [`CachePolicy::proxy_enabled`](super::CachePolicy::proxy_enabled).
///
/// The proxy is only used inside a build context and only after it answered
/// the health probe.
pub struct DefaultProxyCheck<'a> {
    pub(crate) config: &'a FetchConfig,
    pub(crate) status: &'a ProxyStatus,
    pub(crate) transport: &'a dyn Transport,
}

impl DefaultProxyCheck<'_> {
    pub async fn check(self) -> bool {
        if !self.config.build_context {
            return false;
        }
        let Some(url) = self.config.proxy_url() else {
            debug!("Proxy port is not configured");
            return false;
        };
        self.status
            .check(|| async {
                match ping(self.transport, &url).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "Proxy is not available, requests go out directly");
                        false
                    }
                }
            })
            .await
    }
}

#[derive(Deserialize)]
struct Pong {
    result: String,
}

async fn ping(transport: &dyn Transport, url: &str) -> Result<()> {
    let response = transport
        .fetch(url, &RequestOptions::new())
        .await
        .map_err(|e| Error::ProxyUnreachable(e.to_string()))?;
    if !response.ok() {
        return Err(Error::ProxyUnreachable(format!(
            "health probe answered {}",
            response.status()
        )));
    }
    let text = response.text().await?;
    match serde_json::from_str::<Pong>(&text) {
        Ok(pong) if pong.result == "pong" => Ok(()),
        _ => Err(Error::ProxyUnreachable(format!(
            "unexpected health probe answer: {text}"
        ))),
    }
}
