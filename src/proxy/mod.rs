mod builder;
mod handler;
mod service;

pub use builder::{builder, ProxyServer, ProxyServerBuilder};
pub use handler::ProxyHandler;
pub use service::ProxyService;
