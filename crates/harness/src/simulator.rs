//! HTTP client for the external pipeline simulator.
//!
//! The simulator is an optional sidecar that mimics a managed data-factory
//! control plane. [`SimulatorClient`] speaks its small JSON API: a health
//! probe on `/`, pipeline and copy-activity execution endpoints, and an
//! execution status lookup. Transport failures and non-2xx responses
//! surface as [`HarnessError`]; the connection layer decides whether to
//! fall back to local simulation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use tsunagi_core::config::SimulatorConfig;
use tsunagi_core::types::{ExecutionRecord, ExecutionStatus};

use crate::error::HarnessError;

/// Client for the pipeline simulator's JSON API.
#[derive(Debug, Clone)]
pub struct SimulatorClient {
    base_url: String,
    client: reqwest::Client,
}

impl SimulatorClient {
    /// Build a client from `[simulator]` configuration.
    pub fn new(config: &SimulatorConfig) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the simulator root endpoint.
    pub async fn health(&self) -> Result<(), HarnessError> {
        let url = format!("{}/", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    /// Request a full pipeline run from the simulator.
    pub async fn execute_pipeline(
        &self,
        pipeline_name: &str,
        parameters: &Value,
    ) -> Result<ExecutionRecord, HarnessError> {
        let url = format!("{}/pipeline-execution", self.base_url);
        debug!(pipeline = pipeline_name, url = %url, "requesting pipeline execution");
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "pipeline_name": pipeline_name,
                "parameters": parameters,
            }))
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let execution: SimulatorExecution = response.json().await?;
        execution.into_record()
    }

    /// Request a single copy-activity run from the simulator.
    pub async fn execute_copy_activity(
        &self,
        pipeline_name: &str,
        activity_name: &str,
        source: &str,
        sink: &str,
    ) -> Result<ExecutionRecord, HarnessError> {
        let url = format!("{}/copy-activity", self.base_url);
        debug!(
            pipeline = pipeline_name,
            activity = activity_name,
            url = %url,
            "requesting copy activity"
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "pipeline_name": pipeline_name,
                "activity_name": activity_name,
                "source": source,
                "sink": sink,
            }))
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let execution: SimulatorExecution = response.json().await?;
        execution.into_record()
    }

    /// Look up the status of a previously started execution.
    pub async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionRecord, HarnessError> {
        let url = format!("{}/execution-status/{execution_id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = self.check_status(response).await?;
        let execution: SimulatorExecution = response.json().await?;
        execution.into_record()
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, HarnessError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarnessError::SimulatorStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Wire shape of a simulator execution response.
#[derive(Debug, Deserialize)]
struct SimulatorExecution {
    execution_id: String,
    status: String,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "rows_copied")]
    rows_processed: u64,
    #[serde(default)]
    error_message: Option<String>,
}

impl SimulatorExecution {
    fn into_record(self) -> Result<ExecutionRecord, HarnessError> {
        let status =
            ExecutionStatus::from_str_loose(&self.status).ok_or_else(|| HarnessError::Decode {
                reason: format!("unknown execution status '{}'", self.status),
            })?;
        Ok(ExecutionRecord {
            execution_id: self.execution_id,
            status,
            start_time: self.start_time.unwrap_or_else(Utc::now),
            end_time: self.end_time.unwrap_or_else(Utc::now),
            rows_processed: self.rows_processed,
            error_message: self.error_message,
        })
    }
}
