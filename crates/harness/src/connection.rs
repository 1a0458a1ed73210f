//! E2E connection harness.
//!
//! [`E2eConnection`] is the single object a test scenario holds. Connecting
//! probes the SQL backend until it answers (startup ordering against
//! containers is racy, so this retries on a configured budget) and checks
//! the pipeline simulator once at startup. The simulator is optional: when
//! it is down, pipeline executions run locally against the SQL backend and
//! the harness records that it fell back.
//!
//! Every pipeline or copy-activity invocation writes one audit row to the
//! `pipeline_execution_log` table, remote and local alike. Audit failures
//! are logged, never propagated, so a missing audit table cannot fail a
//! scenario that does not assert on it.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use tsunagi_core::backend::SqlBackend;
use tsunagi_core::config::{SimulatorConfig, SqlConfig, TsunagiConfig};
use tsunagi_core::error::{ConnectionError, TsunagiError};
use tsunagi_core::types::{ExecutionRecord, IntegrityReport, Row};
use tsunagi_mock_services::{MockBlobStorage, MockDatabase, MockSftpServer};

use crate::pipeline::{PipelineKind, TransformRegistry};
use crate::simulator::SimulatorClient;
use crate::sql::PgBackend;

/// Audit table written once per pipeline invocation.
const AUDIT_TABLE: &str = "pipeline_execution_log";

const AUDIT_DDL: &str = "CREATE TABLE pipeline_execution_log (
    log_id bigint GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    pipeline_name text NOT NULL,
    execution_start timestamptz NOT NULL,
    execution_end timestamptz NOT NULL,
    status text NOT NULL,
    records_processed bigint NOT NULL,
    error_message text
)";

/// Rows captured per side in an integrity report.
const INTEGRITY_SAMPLE_ROWS: u32 = 5;

/// Connection to every service a scenario touches.
///
/// Generic over the SQL backend so scenarios can run against a live
/// PostgreSQL or the in-memory mock with the same code.
#[derive(Debug)]
pub struct E2eConnection<B: SqlBackend> {
    config: TsunagiConfig,
    backend: B,
    simulator: SimulatorClient,
    simulator_available: bool,
    blob: MockBlobStorage,
    sftp: MockSftpServer,
    database: MockDatabase,
    transforms: TransformRegistry,
}

impl E2eConnection<PgBackend> {
    /// Connect using a lazily pooled PostgreSQL backend.
    pub async fn connect(config: TsunagiConfig) -> Result<Self, TsunagiError> {
        let backend = PgBackend::new(&config.sql)?;
        Self::with_backend(config, backend).await
    }
}

impl<B: SqlBackend> E2eConnection<B> {
    /// Connect with a caller-supplied SQL backend.
    ///
    /// Probes the backend until it answers or the attempt budget runs out,
    /// then checks the simulator once per configured attempt. A dead
    /// simulator is not an error; it only disables remote execution.
    pub async fn with_backend(config: TsunagiConfig, backend: B) -> Result<Self, TsunagiError> {
        wait_for_sql(&backend, &config.sql).await?;
        let simulator = SimulatorClient::new(&config.simulator)?;
        let simulator_available = wait_for_simulator(&simulator, &config.simulator).await;
        Ok(Self {
            config,
            backend,
            simulator,
            simulator_available,
            blob: MockBlobStorage::new(),
            sftp: MockSftpServer::new(),
            database: MockDatabase::new(),
            transforms: TransformRegistry::with_builtins(),
        })
    }

    /// Run a pipeline end to end and return its execution record.
    ///
    /// Tries the remote simulator first when it was reachable at startup;
    /// any transport or protocol failure falls back to local simulation.
    /// This never fails: a broken local run is reported as a FAILED record.
    pub async fn execute_pipeline_simulation(
        &self,
        pipeline_name: &str,
        parameters: Value,
    ) -> ExecutionRecord {
        let record = match self.try_remote_pipeline(pipeline_name, &parameters).await {
            Some(record) => record,
            None => self.run_local_pipeline(pipeline_name).await,
        };
        self.log_execution(pipeline_name, &record).await;
        record
    }

    /// Run a single copy activity and return its execution record.
    ///
    /// Same remote-first, local-fallback behavior as
    /// [`execute_pipeline_simulation`](Self::execute_pipeline_simulation),
    /// but the table pair comes from the caller instead of the pipeline
    /// catalogue.
    pub async fn execute_copy_activity_simulation(
        &self,
        pipeline_name: &str,
        activity_name: &str,
        source: &str,
        sink: &str,
    ) -> ExecutionRecord {
        let record = match self
            .try_remote_copy(pipeline_name, activity_name, source, sink)
            .await
        {
            Some(record) => record,
            None => {
                let label = format!("{pipeline_name}/{activity_name}");
                self.run_local_copy(&label, source, sink).await
            }
        };
        self.log_execution(pipeline_name, &record).await;
        record
    }

    /// Compare a source and target table after a pipeline run.
    ///
    /// Captures row counts and the first rows of each side ordered by the
    /// leading column. The report only describes; assertions live in
    /// [`crate::asserts`].
    pub async fn validate_data_integrity(
        &self,
        source_table: &str,
        target_table: &str,
    ) -> Result<IntegrityReport, TsunagiError> {
        let source_count = self.backend.count_rows(source_table).await?;
        let target_count = self.backend.count_rows(target_table).await?;
        let source_sample = self
            .backend
            .sample_rows(source_table, INTEGRITY_SAMPLE_ROWS)
            .await?;
        let target_sample = self
            .backend
            .sample_rows(target_table, INTEGRITY_SAMPLE_ROWS)
            .await?;
        let counts_match = source_count == target_count;
        info!(
            source = source_table,
            target = target_table,
            source_count,
            target_count,
            counts_match,
            "data integrity validated"
        );
        Ok(IntegrityReport {
            source_table: source_table.to_owned(),
            target_table: target_table.to_owned(),
            source_count,
            target_count,
            counts_match,
            source_sample,
            target_sample,
        })
    }

    /// Run a raw SQL query against the backend.
    pub async fn execute_query(&self, sql: &str) -> Result<Vec<Row>, TsunagiError> {
        Ok(self.backend.query(sql).await?)
    }

    /// Look up a remote execution by id.
    ///
    /// Always goes to the simulator; local executions finish synchronously
    /// and have nothing to look up.
    pub async fn remote_execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionRecord, TsunagiError> {
        Ok(self.simulator.execution_status(execution_id).await?)
    }

    async fn try_remote_pipeline(
        &self,
        pipeline_name: &str,
        parameters: &Value,
    ) -> Option<ExecutionRecord> {
        if !self.simulator_available {
            return None;
        }
        match self.simulator.execute_pipeline(pipeline_name, parameters).await {
            Ok(record) => {
                info!(
                    pipeline = pipeline_name,
                    execution_id = %record.execution_id,
                    status = %record.status,
                    "remote pipeline execution completed"
                );
                Some(record)
            }
            Err(err) => {
                warn!(
                    pipeline = pipeline_name,
                    error = %err,
                    "remote pipeline execution failed, falling back to local simulation"
                );
                None
            }
        }
    }

    async fn try_remote_copy(
        &self,
        pipeline_name: &str,
        activity_name: &str,
        source: &str,
        sink: &str,
    ) -> Option<ExecutionRecord> {
        if !self.simulator_available {
            return None;
        }
        match self
            .simulator
            .execute_copy_activity(pipeline_name, activity_name, source, sink)
            .await
        {
            Ok(record) => {
                info!(
                    pipeline = pipeline_name,
                    activity = activity_name,
                    execution_id = %record.execution_id,
                    status = %record.status,
                    "remote copy activity completed"
                );
                Some(record)
            }
            Err(err) => {
                warn!(
                    pipeline = pipeline_name,
                    activity = activity_name,
                    error = %err,
                    "remote copy activity failed, falling back to local simulation"
                );
                None
            }
        }
    }

    async fn run_local_pipeline(&self, pipeline_name: &str) -> ExecutionRecord {
        let kind = PipelineKind::from_name(pipeline_name);
        match kind.tables() {
            Some((source, sink)) => self.run_local_copy(pipeline_name, source, sink).await,
            None => {
                debug!(
                    pipeline = pipeline_name,
                    "no local definition, recording immediate success"
                );
                let now = Utc::now();
                ExecutionRecord::success(ExecutionRecord::generate_id(), now, now, 0)
            }
        }
    }

    async fn run_local_copy(&self, label: &str, source: &str, sink: &str) -> ExecutionRecord {
        let execution_id = ExecutionRecord::generate_id();
        let start_time = Utc::now();
        match self.copy_table(source, sink).await {
            Ok(rows) => {
                info!(
                    pipeline = label,
                    source,
                    sink,
                    rows,
                    "local simulation completed"
                );
                ExecutionRecord::success(execution_id, start_time, Utc::now(), rows)
            }
            Err(err) => {
                warn!(
                    pipeline = label,
                    source,
                    sink,
                    error = %err,
                    "local simulation failed"
                );
                ExecutionRecord::failed(
                    execution_id,
                    start_time,
                    Utc::now(),
                    format!("local simulation of '{label}' failed: {err}"),
                )
            }
        }
    }

    /// Read the source, apply the registered transform, rewrite the sink.
    async fn copy_table(&self, source: &str, sink: &str) -> Result<u64, ConnectionError> {
        let rows = self.backend.fetch_rows(source).await?;
        let rows = self.transforms.apply(source, sink, &rows);
        self.backend.clear_table(sink).await?;
        if rows.is_empty() {
            return Ok(0);
        }
        let columns: Vec<String> = rows[0].keys().cloned().collect();
        self.backend.insert_rows(sink, &columns, &rows).await
    }

    async fn log_execution(&self, pipeline_name: &str, record: &ExecutionRecord) {
        if let Err(err) = self.write_audit_row(pipeline_name, record).await {
            warn!(
                pipeline = pipeline_name,
                error = %err,
                "failed to write audit row"
            );
        }
    }

    async fn write_audit_row(
        &self,
        pipeline_name: &str,
        record: &ExecutionRecord,
    ) -> Result<(), ConnectionError> {
        self.ensure_audit_table().await?;
        let columns: Vec<String> = [
            "pipeline_name",
            "execution_start",
            "execution_end",
            "status",
            "records_processed",
            "error_message",
        ]
        .iter()
        .map(|c| (*c).to_owned())
        .collect();
        let mut row = Row::new();
        row.insert(
            "pipeline_name".to_owned(),
            Value::String(pipeline_name.to_owned()),
        );
        row.insert(
            "execution_start".to_owned(),
            Value::String(record.start_time.to_rfc3339()),
        );
        row.insert(
            "execution_end".to_owned(),
            Value::String(record.end_time.to_rfc3339()),
        );
        row.insert("status".to_owned(), Value::String(record.status.to_string()));
        row.insert(
            "records_processed".to_owned(),
            Value::from(record.rows_processed),
        );
        row.insert(
            "error_message".to_owned(),
            record
                .error_message
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        self.backend.insert_rows(AUDIT_TABLE, &columns, &[row]).await?;
        Ok(())
    }

    async fn ensure_audit_table(&self) -> Result<(), ConnectionError> {
        if self.backend.table_exists(AUDIT_TABLE).await? {
            return Ok(());
        }
        debug!(table = AUDIT_TABLE, "creating audit table");
        self.backend.execute(AUDIT_DDL).await?;
        Ok(())
    }

    /// Configuration this connection was built from.
    pub fn config(&self) -> &TsunagiConfig {
        &self.config
    }

    /// The SQL backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The simulator client, reachable or not.
    pub fn simulator(&self) -> &SimulatorClient {
        &self.simulator
    }

    /// Whether the simulator answered its startup probe.
    pub fn simulator_available(&self) -> bool {
        self.simulator_available
    }

    /// Mock blob storage for staging scenario files.
    pub fn blob(&self) -> &MockBlobStorage {
        &self.blob
    }

    pub fn blob_mut(&mut self) -> &mut MockBlobStorage {
        &mut self.blob
    }

    /// Mock SFTP server for staging scenario transfers.
    pub fn sftp(&self) -> &MockSftpServer {
        &self.sftp
    }

    pub fn sftp_mut(&mut self) -> &mut MockSftpServer {
        &mut self.sftp
    }

    /// Mock record database for staging scenario records.
    pub fn database(&self) -> &MockDatabase {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut MockDatabase {
        &mut self.database
    }

    /// Row transforms used by local simulation.
    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformRegistry {
        &mut self.transforms
    }
}

async fn wait_for_sql<B: SqlBackend>(
    backend: &B,
    config: &SqlConfig,
) -> Result<(), ConnectionError> {
    let mut last_reason = String::new();
    for attempt in 1..=config.probe_attempts {
        match backend.probe().await {
            Ok(()) => {
                info!(attempt, "sql backend is ready");
                return Ok(());
            }
            Err(err) => {
                debug!(
                    attempt,
                    max_attempts = config.probe_attempts,
                    error = %err,
                    "sql probe failed"
                );
                last_reason = err.to_string();
            }
        }
        if attempt < config.probe_attempts {
            sleep(Duration::from_secs(config.probe_delay_secs)).await;
        }
    }
    Err(ConnectionError::StartupFailed {
        service: "sql".to_owned(),
        attempts: config.probe_attempts,
        reason: last_reason,
    })
}

async fn wait_for_simulator(client: &SimulatorClient, config: &SimulatorConfig) -> bool {
    let mut last_reason = String::new();
    for attempt in 1..=config.probe_attempts {
        match client.health().await {
            Ok(()) => {
                info!(attempt, url = client.base_url(), "simulator is ready");
                return true;
            }
            Err(err) => {
                debug!(
                    attempt,
                    max_attempts = config.probe_attempts,
                    error = %err,
                    "simulator probe failed"
                );
                last_reason = err.to_string();
            }
        }
        if attempt < config.probe_attempts {
            sleep(Duration::from_secs(config.probe_delay_secs)).await;
        }
    }
    warn!(
        url = client.base_url(),
        attempts = config.probe_attempts,
        reason = %last_reason,
        "simulator unreachable, falling back to local simulation"
    );
    false
}
