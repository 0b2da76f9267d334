//! Request deduplication for fleets of short-lived build processes.
//!
//! Each process deduplicates its own calls with a [`QueryFetch`] client, and
//! routes cacheable calls through one shared proxy so a logical request is
//! performed once for the whole fleet.
//!
//! # Example usage
//!
//! ```no_run
//! use query_cache::{codec::RequestOptions, proxy, HttpTransport, QueryFetch};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let server = proxy::builder(HttpTransport::new()?).build().await?;
//! let port = server.port();
//! tokio::spawn(server.run());
//!
//! let client = QueryFetch::builder(HttpTransport::new()?)
//!     .with_port(port)
//!     .build();
//! let response = client
//!     .query_fetch("https://example.com", &RequestOptions::new())
//!     .await?;
//! println!("{}", response.text().await?);
//! # Ok(())
//! # }
//! ```
pub mod codec;
pub mod config;
mod error;
pub mod fetch;
pub mod http;
pub mod io;
pub mod proxy;
pub mod report;
pub mod store;
mod transport;
mod utils;

pub use config::FetchConfig;
pub use error::{Error, Result};
pub use fetch::{CachePolicy, DefaultPolicy, QueryFetch};
pub use transport::{HttpResponse, HttpTransport, Transport};
