use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io::{self, Write},
    path::Path,
};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use super::{CacheHit, CacheType};

/// Name of the CSV file written for a report generated at `now`.
pub fn report_file_name(now: DateTime<Utc>) -> String {
    format!(
        "query-cache-{}.csv",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[derive(Debug, Default)]
struct Hits {
    server: usize,
    memory: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub cache_key: String,
    pub total_hits: usize,
    pub server_hits: usize,
    pub memory_hits: usize,
    /// Memory hits per process, in the order of [`ReportBuilder::process_ids`].
    pub process_hits: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub total_hits: usize,
    pub server_hits: usize,
    pub memory_hits: usize,
}

/// Aggregates cache-hit lines into per-key counts.
#[derive(Debug)]
pub struct ReportBuilder {
    hits: HashMap<String, Hits>,
    process_ids: BTreeSet<u32>,
    unsafe_chars: Regex,
}

impl ReportBuilder {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hits: HashMap::new(),
            process_ids: BTreeSet::new(),
            unsafe_chars: Regex::new(r#"["',]"#)?,
        })
    }

    /// Records the hit on `line`, if any. Returns whether the line was a hit.
    pub fn add_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        match serde_json::from_str::<CacheHit>(line) {
            Ok(hit) => {
                self.add(hit);
                true
            }
            Err(_) => false,
        }
    }

    pub fn add(&mut self, hit: CacheHit) {
        let hits = self.hits.entry(hit.cache_key).or_default();
        match hit.cache_type {
            CacheType::ServerCache => hits.server += 1,
            CacheType::MemoryCache => {
                self.process_ids.insert(hit.process_id);
                *hits.memory.entry(hit.process_id).or_default() += 1;
            }
        }
    }

    pub fn process_ids(&self) -> Vec<u32> {
        self.process_ids.iter().copied().collect()
    }

    /// Rows sorted by total hits, most hit first.
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut rows = self
            .hits
            .iter()
            .map(|(cache_key, hits)| {
                let memory_hits = hits.memory.values().sum::<usize>();
                ReportRow {
                    cache_key: cache_key.clone(),
                    total_hits: hits.server + memory_hits,
                    server_hits: hits.server,
                    memory_hits,
                    process_hits: self
                        .process_ids
                        .iter()
                        .map(|id| hits.memory.get(id).copied().unwrap_or(0))
                        .collect(),
                }
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.total_hits
                .cmp(&a.total_hits)
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        rows
    }

    pub fn totals(&self) -> Totals {
        self.rows().iter().fold(Totals::default(), |acc, row| Totals {
            total_hits: acc.total_hits + row.total_hits,
            server_hits: acc.server_hits + row.server_hits,
            memory_hits: acc.memory_hits + row.memory_hits,
        })
    }

    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let pids = self
            .process_ids
            .iter()
            .map(|id| format!("Hits pid {id}"))
            .collect::<Vec<_>>();
        writeln!(
            writer,
            "Cache Key,Total Hits,Hits Server,Hits Memory,{}",
            pids.join(",")
        )?;
        for row in self.rows() {
            let process_hits = row
                .process_hits
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>();
            writeln!(
                writer,
                "{},{},{},{},{}",
                self.unsafe_chars.replace_all(&row.cache_key, ""),
                row.total_hits,
                row.server_hits,
                row.memory_hits,
                process_hits.join(",")
            )?;
        }
        writer.flush()
    }

    pub fn summary(&self, path: &Path) -> String {
        let totals = self.totals();
        format!(
            "\n=== Query Cache ===\n\
             {:>7} total cache hits.\n\
             {:>7} hits in memory.\n\
             {:>7} hits in the proxy.\n\
             {:>7} build processes found.\n\
             ===================\n\n\
             Wrote out extended report out to {}\n",
            totals.total_hits,
            totals.memory_hits,
            totals.server_hits,
            self.process_ids.len(),
            path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn hit(key: &str, cache_type: CacheType, process_id: u32) -> CacheHit {
        CacheHit {
            cache_key: key.to_string(),
            cache_type,
            process_id,
        }
    }

    fn builder() -> ReportBuilder {
        let mut builder = ReportBuilder::new().unwrap();
        builder.add(hit("https://a.com", CacheType::MemoryCache, 20));
        builder.add(hit("https://a.com", CacheType::MemoryCache, 10));
        builder.add(hit("https://a.com", CacheType::ServerCache, 30));
        builder.add(hit("https://b.com/?q=\"x\",'y'", CacheType::ServerCache, 30));
        builder.add(hit("https://c.com", CacheType::MemoryCache, 10));
        builder
    }

    #[test]
    fn ignores_lines_that_are_not_hits() {
        let mut builder = ReportBuilder::new().unwrap();
        assert!(!builder.add_line(""));
        assert!(!builder.add_line("[query-cache] Up on port 3000."));
        assert!(!builder.add_line(r#"{"cacheKey":"a"}"#));
        assert!(builder.add_line(
            r#"{"cacheKey":"a","cacheType":"memory-cache","processId":7}"#
        ));
        assert_eq!(builder.process_ids(), vec![7]);
    }

    #[test]
    fn sorts_rows_by_total_hits() {
        let rows = builder().rows();
        assert_eq!(
            rows.iter().map(|row| row.total_hits).collect::<Vec<_>>(),
            vec![3, 1, 1]
        );
        assert_eq!(rows[0].process_hits, vec![1, 1]);
        assert_eq!(rows[0].server_hits, 1);
        assert_eq!(rows[0].memory_hits, 2);
    }

    #[test]
    fn writes_csv() {
        let mut out = Vec::new();
        builder().write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Cache Key,Total Hits,Hits Server,Hits Memory,Hits pid 10,Hits pid 20\n\
             https://a.com,3,1,2,1,1\n\
             https://b.com/?q=xy,1,1,0,0,0\n\
             https://c.com,1,0,1,1,0\n"
        );
    }

    #[test]
    fn totals_all_rows() {
        assert_eq!(
            builder().totals(),
            Totals {
                total_hits: 5,
                server_hits: 2,
                memory_hits: 3,
            }
        );
        assert!(builder()
            .summary(Path::new("report.csv"))
            .contains("      2 build processes found."));
    }

    #[test]
    fn names_file_after_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 0).unwrap();
        assert_eq!(
            report_file_name(now),
            "query-cache-2024-07-01T12:30:00.000Z.csv"
        );
    }
}
