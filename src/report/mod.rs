mod aggregate;

pub use aggregate::{report_file_name, ReportBuilder, ReportRow, Totals};

use essentials::warn;
use serde::{Deserialize, Serialize};

/// Which cache tier served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheType {
    ServerCache,
    MemoryCache,
}

/// One cache hit, as printed by [`StdoutReporter`] and read back by
/// [`ReportBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHit {
    pub cache_key: String,
    pub cache_type: CacheType,
    pub process_id: u32,
}

impl CacheHit {
    pub fn new(cache_key: impl Into<String>, cache_type: CacheType) -> Self {
        Self {
            cache_key: cache_key.into(),
            cache_type,
            process_id: std::process::id(),
        }
    }
}

/// Receives every cache hit of a store owner.
pub trait Reporter: Send + Sync {
    fn report(&self, hit: &CacheHit);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _hit: &CacheHit) {}
}

/// Prints each hit as a JSON line padded by blank lines, so the lines survive
/// being interleaved with other build output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&self, hit: &CacheHit) {
        match serde_json::to_string(hit) {
            Ok(line) => println!("\n{line}\n"),
            Err(e) => warn!(key = %hit.cache_key, error = %e, "Failed to encode cache hit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn encodes_hit_line() {
        let hit = CacheHit {
            cache_key: "https://example.com".to_string(),
            cache_type: CacheType::ServerCache,
            process_id: 42,
        };
        assert_eq!(
            serde_json::to_value(&hit).unwrap(),
            json!({
                "cacheKey": "https://example.com",
                "cacheType": "server-cache",
                "processId": 42,
            })
        );
    }

    #[test]
    fn stamps_current_process() {
        let hit = CacheHit::new("key", CacheType::MemoryCache);
        assert_eq!(hit.process_id, std::process::id());
    }
}
