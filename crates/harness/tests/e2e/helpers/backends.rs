//! Scripted SQL backends for startup scenarios.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tsunagi_core::backend::SqlBackend;
use tsunagi_core::error::ConnectionError;
use tsunagi_core::types::Row;
use tsunagi_mock_services::InMemoryBackend;

/// Backend whose probe fails a configured number of times before the
/// in-memory store takes over.
///
/// Clones share counters and the store, so a test can keep one handle for
/// assertions while the connection owns another.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct FlakyBackend {
    inner: InMemoryBackend,
    failures_left: Arc<AtomicU32>,
    probes: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl FlakyBackend {
    /// Backend that refuses the first `times` probes.
    pub fn failing(times: u32) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            failures_left: Arc::new(AtomicU32::new(times)),
            probes: Arc::new(AtomicU32::new(0)),
        }
    }

    /// How many probes have been attempted so far.
    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    /// The in-memory store behind this backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }
}

impl SqlBackend for FlakyBackend {
    async fn probe(&self) -> Result<(), ConnectionError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionError::Query {
                reason: "the database system is starting up".to_owned(),
            });
        }
        self.inner.probe().await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ConnectionError> {
        self.inner.table_exists(table).await
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, ConnectionError> {
        self.inner.fetch_rows(table).await
    }

    async fn count_rows(&self, table: &str) -> Result<u64, ConnectionError> {
        self.inner.count_rows(table).await
    }

    async fn sample_rows(&self, table: &str, limit: u32) -> Result<Vec<Row>, ConnectionError> {
        self.inner.sample_rows(table, limit).await
    }

    async fn clear_table(&self, table: &str) -> Result<(), ConnectionError> {
        self.inner.clear_table(table).await
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, ConnectionError> {
        self.inner.insert_rows(table, columns, rows).await
    }

    async fn execute(&self, sql: &str) -> Result<u64, ConnectionError> {
        self.inner.execute(sql).await
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        self.inner.query(sql).await
    }
}
