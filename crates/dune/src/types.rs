//! Request and response payloads of the Dune execution API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slippage_query::QueryText;

/// Chain whose tables the query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Gnosis,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Gnosis => "gnosis",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "ethereum" => Ok(Network::Mainnet),
            "gnosis" | "xdai" => Ok(Network::Gnosis),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// A query plus the network it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuneQuery {
    pub sql: QueryText,
    pub network: Network,
}

impl DuneQuery {
    pub fn new(sql: QueryText, network: Network) -> Self {
        Self { sql, network }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecuteRequest<'a> {
    pub sql: &'a str,
    pub performance: &'a str,
    pub network: Network,
}

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ExecutionState {
    #[serde(rename = "QUERY_STATE_PENDING")]
    Pending,
    #[serde(rename = "QUERY_STATE_EXECUTING")]
    Executing,
    #[serde(rename = "QUERY_STATE_COMPLETED")]
    Completed,
    #[serde(rename = "QUERY_STATE_COMPLETED_PARTIAL")]
    CompletedPartial,
    #[serde(rename = "QUERY_STATE_FAILED")]
    Failed,
    #[serde(rename = "QUERY_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "QUERY_STATE_EXPIRED")]
    Expired,
    #[serde(other)]
    Unknown,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Pending | ExecutionState::Executing)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionState::Completed | ExecutionState::CompletedPartial)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Executing => "executing",
            ExecutionState::Completed => "completed",
            ExecutionState::CompletedPartial => "completed_partial",
            ExecutionState::Failed => "failed",
            ExecutionState::Cancelled => "cancelled",
            ExecutionState::Expired => "expired",
            ExecutionState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionError {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub message: String,
}

/// Response of the execute and status endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStatus {
    pub execution_id: String,
    pub state: ExecutionState,
    #[serde(default)]
    pub error: Option<ExecutionError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultsResponse<T> {
    pub execution_id: String,
    pub state: ExecutionState,
    pub result: Option<ResultSet<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultSet<T> {
    pub rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Extract the message from an error body, falling back to the raw text.
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slippage_models::SlippageRow;

    #[test]
    fn test_network_parsing() {
        assert_eq!("mainnet".parse::<Network>(), Ok(Network::Mainnet));
        assert_eq!("Ethereum".parse::<Network>(), Ok(Network::Mainnet));
        assert_eq!("gnosis".parse::<Network>(), Ok(Network::Gnosis));
        assert!("polygon".parse::<Network>().is_err());
    }

    #[test]
    fn test_status_with_error() {
        let status: ExecutionStatus = serde_json::from_str(
            r#"{
                "execution_id": "01HKZJ2683PHF9Q9PHHQ8FW4Q1",
                "query_id": 0,
                "state": "QUERY_STATE_FAILED",
                "error": {"type": "FAILED_TYPE_EXECUTION_FAILED", "message": "column \"dex_swaps\" does not exist"}
            }"#,
        )
        .unwrap();

        assert_eq!(status.state, ExecutionState::Failed);
        assert!(status.state.is_terminal());
        assert!(!status.state.is_success());
        assert_eq!(
            status.error.unwrap().message,
            "column \"dex_swaps\" does not exist"
        );
    }

    #[test]
    fn test_unknown_state_is_terminal() {
        let status: ExecutionStatus = serde_json::from_str(
            r#"{"execution_id": "x", "state": "QUERY_STATE_SOMETHING_NEW"}"#,
        )
        .unwrap();
        assert_eq!(status.state, ExecutionState::Unknown);
        assert!(status.state.is_terminal());
    }

    #[test]
    fn test_results_rows() {
        let response: ResultsResponse<SlippageRow> = serde_json::from_str(
            r#"{
                "execution_id": "01HKZJ2683PHF9Q9PHHQ8FW4Q1",
                "state": "QUERY_STATE_COMPLETED",
                "result": {
                    "rows": [
                        {"time": "2022-03-01 10:15:42", "solver": "Gnosis_0x", "slippage": -12.5},
                        {"time": "2022-03-01 11:02:07", "solver": "Gnosis_ParaSwap", "slippage": 0.75}
                    ],
                    "metadata": {"column_names": ["time", "solver", "slippage"]}
                }
            }"#,
        )
        .unwrap();

        let rows = response.result.unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].solver.as_deref(), Some("Gnosis_0x"));
        assert_eq!(rows[1].slippage, 0.75);
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(api_error_message(r#"{"error": "invalid API Key"}"#), "invalid API Key");
        assert_eq!(api_error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_execute_request_body() {
        let body = serde_json::to_value(ExecuteRequest {
            sql: "SELECT 1",
            performance: "medium",
            network: Network::Mainnet,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"sql": "SELECT 1", "performance": "medium", "network": "mainnet"})
        );
    }
}
