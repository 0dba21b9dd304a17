//! HTTP client for the Dune execution API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use slippage_models::SlippageRow;
use slippage_telemetry::Metrics;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::DuneConfig;
use crate::error::{DuneError, DuneResult};
use crate::executor::QueryExecutor;
use crate::types::{
    api_error_message, DuneQuery, ExecuteRequest, ExecutionState, ExecutionStatus,
    ResultsResponse,
};

const API_KEY_HEADER: &str = "X-Dune-Api-Key";

/// Dune API client wrapper.
pub struct DuneClient {
    client: Client,
    config: DuneConfig,
    metrics: Metrics,
}

impl DuneClient {
    /// Create a new Dune client.
    ///
    /// # Arguments
    /// * `config` - Endpoint, API key and polling settings
    /// * `metrics` - Metrics collector
    pub fn new(config: DuneConfig, metrics: Metrics) -> DuneResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(DuneError::Config("Dune API key is not set".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;
        info!("Initialized Dune client for {}", config.base_url);

        Ok(Self {
            client,
            config,
            metrics,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> DuneResult<T> {
        let start = Instant::now();
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        self.metrics
            .observe_query_latency(operation, start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DuneError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        Ok(response.json().await?)
    }

    /// Submit a query for execution.
    pub async fn submit(&self, query: &DuneQuery) -> DuneResult<ExecutionStatus> {
        let body = ExecuteRequest {
            sql: query.sql.as_str(),
            performance: &self.config.performance,
            network: query.network,
        };
        let request = self.client.post(self.url("sql/execute")).json(&body);
        let status: ExecutionStatus = self.send("execute", request).await?;
        debug!("Submitted execution {} on {}", status.execution_id, query.network);
        Ok(status)
    }

    /// Get the current state of an execution.
    pub async fn status(&self, execution_id: &str) -> DuneResult<ExecutionStatus> {
        let request = self
            .client
            .get(self.url(&format!("execution/{execution_id}/status")));
        self.send("status", request).await
    }

    /// Poll until the execution reaches a terminal state.
    pub async fn wait_for_completion(&self, execution_id: &str) -> DuneResult<ExecutionStatus> {
        loop {
            let status = self.status(execution_id).await?;
            if status.state.is_terminal() {
                return ensure_succeeded(status);
            }
            debug!("Execution {} is {}", execution_id, status.state);
            sleep(self.config.poll_interval).await;
        }
    }

    /// Fetch the rows of a completed execution.
    pub async fn results<T: DeserializeOwned>(&self, execution_id: &str) -> DuneResult<Vec<T>> {
        let request = self
            .client
            .get(self.url(&format!("execution/{execution_id}/results")));
        let response: ResultsResponse<T> = self.send("results", request).await?;
        if response.state == ExecutionState::CompletedPartial {
            warn!("Execution {} returned a partial result set", response.execution_id);
        }

        response
            .result
            .map(|result| result.rows)
            .ok_or(DuneError::MissingResult(response.execution_id))
    }

    /// Execute a query and return its rows.
    pub async fn fetch<T: DeserializeOwned>(&self, query: &DuneQuery) -> DuneResult<Vec<T>> {
        self.metrics.inc_queries_executed();
        let outcome = async {
            let submitted = self.submit(query).await?;
            let completed = if submitted.state.is_terminal() {
                ensure_succeeded(submitted)?
            } else {
                self.wait_for_completion(&submitted.execution_id).await?
            };
            self.results(&completed.execution_id).await
        }
        .await;

        match outcome {
            Ok(rows) => {
                self.metrics.inc_observations_fetched(rows.len() as u64);
                info!("Fetched {} rows", rows.len());
                Ok(rows)
            }
            Err(e) => {
                self.metrics.inc_query_errors();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for DuneClient {
    async fn fetch_rows(&self, query: &DuneQuery) -> DuneResult<Vec<SlippageRow>> {
        self.fetch(query).await
    }
}

/// Turn a terminal failure state into [`DuneError::ExecutionFailed`].
fn ensure_succeeded(status: ExecutionStatus) -> DuneResult<ExecutionStatus> {
    if status.state.is_success() {
        return Ok(status);
    }

    let message = status
        .error
        .map(|error| error.message)
        .unwrap_or_else(|| "no error details".to_string());
    Err(DuneError::ExecutionFailed {
        execution_id: status.execution_id,
        state: status.state,
        message,
    })
}
