mod client;
mod policy;
mod probe;

pub use client::{CacheView, QueryFetch, QueryFetchBuilder};
pub use policy::{CachePolicy, DefaultPolicy};
pub use probe::{DefaultProxyCheck, ProxyConnectionState, ProxyStatus};
