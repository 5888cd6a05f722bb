//! Time-bounded memoisation of query results.
//!
//! Identical SQL text within the TTL is answered from memory instead of
//! re-running the job. Failures are never stored, so a corrected credential
//! or a transient outage does not stick around for the full TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use super::error::WarehouseError;
use super::models::QueryResult;
use super::QueryRunner;

/// Default lifetime of a cached result
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct Entry {
    result: Arc<QueryResult>,
    stored_at: Instant,
}

/// Outcome of a cached lookup
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub result: Arc<QueryResult>,
    /// True when served without contacting the warehouse
    pub from_cache: bool,
}

/// Wraps a runner with a per-query-text cache
pub struct CachedRunner<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<R: QueryRunner> CachedRunner<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        CachedRunner {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Run `sql`, reusing a result stored less than `ttl` ago
    pub fn run(&self, sql: &str) -> Result<CachedResult, WarehouseError> {
        self.run_at(sql, Instant::now())
    }

    fn run_at(&self, sql: &str, now: Instant) -> Result<CachedResult, WarehouseError> {
        if let Some(result) = self.lookup(sql, now) {
            debug!("query cache hit");
            return Ok(CachedResult {
                result,
                from_cache: true,
            });
        }

        debug!("query cache miss");
        let result = Arc::new(self.inner.run_query(sql)?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                sql.to_string(),
                Entry {
                    result: Arc::clone(&result),
                    stored_at: now,
                },
            );
        }
        Ok(CachedResult {
            result,
            from_cache: false,
        })
    }

    fn lookup(&self, sql: &str, now: Instant) -> Option<Arc<QueryResult>> {
        let mut entries = self.entries.lock().ok()?;
        entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < self.ttl);
        entries.get(sql).map(|e| Arc::clone(&e.result))
    }

    /// Drop every stored result
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::models::{Column, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails on queries containing "fail"
    #[derive(Default)]
    struct CountingRunner {
        calls: AtomicUsize,
    }

    impl QueryRunner for CountingRunner {
        fn run_query(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if sql.contains("fail") {
                return Err(WarehouseError::Job("boom".into()));
            }
            Ok(QueryResult::new(
                vec![Column::new("n", "INT64")],
                vec![vec![Value::Int(1)]],
            ))
        }
    }

    fn calls(runner: &CachedRunner<CountingRunner>) -> usize {
        runner.inner().calls.load(Ordering::SeqCst)
    }

    #[test]
    fn test_hit_within_ttl() {
        let runner = CachedRunner::new(CountingRunner::default(), Duration::from_secs(600));
        let start = Instant::now();

        let first = runner.run_at("SELECT 1", start).unwrap();
        let second = runner
            .run_at("SELECT 1", start + Duration::from_secs(599))
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.result, &second.result));
        assert_eq!(calls(&runner), 1);
    }

    #[test]
    fn test_miss_after_expiry() {
        let runner = CachedRunner::new(CountingRunner::default(), Duration::from_secs(600));
        let start = Instant::now();

        runner.run_at("SELECT 1", start).unwrap();
        let later = runner
            .run_at("SELECT 1", start + Duration::from_secs(600))
            .unwrap();

        assert!(!later.from_cache);
        assert_eq!(calls(&runner), 2);
    }

    #[test]
    fn test_distinct_queries_cached_separately() {
        let runner = CachedRunner::new(CountingRunner::default(), DEFAULT_TTL);
        runner.run("SELECT 1").unwrap();
        runner.run("SELECT 2").unwrap();
        assert_eq!(calls(&runner), 2);
        assert_eq!(runner.len(), 2);
    }

    #[test]
    fn test_failures_not_cached() {
        let runner = CachedRunner::new(CountingRunner::default(), DEFAULT_TTL);
        assert!(runner.run("SELECT fail").is_err());
        assert!(runner.run("SELECT fail").is_err());
        assert_eq!(calls(&runner), 2);
        assert_eq!(runner.len(), 0);
    }

    #[test]
    fn test_clear() {
        let runner = CachedRunner::new(CountingRunner::default(), DEFAULT_TTL);
        runner.run("SELECT 1").unwrap();
        runner.clear();
        assert!(!runner.run("SELECT 1").unwrap().from_cache);
        assert_eq!(calls(&runner), 2);
    }
}
