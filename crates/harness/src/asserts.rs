//! Assertion helpers for E2E scenarios.
//!
//! These panic with readable messages instead of returning errors, so a
//! failing scenario points straight at the check that broke.

use tsunagi_core::backend::SqlBackend;
use tsunagi_core::types::{ExecutionRecord, ExecutionStatus, IntegrityReport};

/// Assert that an execution finished with SUCCESS.
///
/// # Panics
///
/// Panics if the status is FAILED or TIMEOUT, printing the error message
/// when one was recorded.
pub fn assert_execution_succeeded(record: &ExecutionRecord) {
    assert!(
        record.status == ExecutionStatus::Success,
        "execution {} finished with {} (error: {})",
        record.execution_id,
        record.status,
        record.error_message.as_deref().unwrap_or("none"),
    );
}

/// Assert that an execution finished with FAILED.
///
/// # Panics
///
/// Panics if the status is anything other than FAILED.
pub fn assert_execution_failed(record: &ExecutionRecord) {
    assert!(
        record.status == ExecutionStatus::Failed,
        "execution {} finished with {}, expected FAILED",
        record.execution_id,
        record.status,
    );
}

/// Assert that a table holds exactly `expected` rows.
///
/// # Panics
///
/// Panics if the count differs or the table cannot be counted.
pub async fn assert_row_count<B: SqlBackend>(backend: &B, table: &str, expected: u64) {
    let actual = match backend.count_rows(table).await {
        Ok(count) => count,
        Err(err) => panic!("failed to count rows in '{table}': {err}"),
    };
    assert!(
        actual == expected,
        "table '{table}' holds {actual} rows, expected {expected}",
    );
}

/// Assert that a copy did not lose rows.
///
/// Filtering pipelines legitimately write fewer rows than they read, so
/// this only rejects a target that shrank below the source.
///
/// # Panics
///
/// Panics if the target holds fewer rows than the source.
pub fn assert_no_data_loss(report: &IntegrityReport) {
    assert!(
        report.target_count >= report.source_count,
        "data loss: {} holds {} rows but {} holds {}",
        report.source_table,
        report.source_count,
        report.target_table,
        report.target_count,
    );
}

/// Assert that source and target row counts match.
///
/// # Panics
///
/// Panics if the counts differ.
pub fn assert_integrity(report: &IntegrityReport) {
    assert!(
        report.counts_match,
        "integrity mismatch: {report}",
    );
}
