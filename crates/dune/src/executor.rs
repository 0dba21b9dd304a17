//! Seam between query construction and the execution service.

use async_trait::async_trait;
use slippage_models::SlippageRow;
use slippage_query::SlippageQuery;
use slippage_telemetry::traced;

use crate::error::DuneResult;
use crate::types::{DuneQuery, Network};

/// Anything that can run a slippage query and return its rows.
///
/// Errors are returned unmodified so callers see the service's own failure.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, query: &DuneQuery) -> DuneResult<Vec<SlippageRow>>;
}

/// Build the slippage query and run it, timing the call.
pub async fn get_slippage<E>(
    executor: &E,
    query: &SlippageQuery,
    network: Network,
) -> DuneResult<Vec<SlippageRow>>
where
    E: QueryExecutor + ?Sized,
{
    let query = DuneQuery::new(query.render(), network);
    traced(
        "Getting solvers slippage through Dune.",
        executor.fetch_rows(&query),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DuneError;
    use std::sync::Mutex;

    struct FakeExecutor {
        rows: Vec<SlippageRow>,
        fail_with: Option<u16>,
        seen: Mutex<Vec<DuneQuery>>,
    }

    impl FakeExecutor {
        fn returning(rows: Vec<SlippageRow>) -> Self {
            Self {
                rows,
                fail_with: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeExecutor {
        async fn fetch_rows(&self, query: &DuneQuery) -> DuneResult<Vec<SlippageRow>> {
            self.seen.lock().unwrap().push(query.clone());
            match self.fail_with {
                Some(status) => Err(DuneError::Api {
                    status,
                    message: "invalid API Key".to_string(),
                }),
                None => Ok(self.rows.clone()),
            }
        }
    }

    fn row(solver: &str, slippage: f64) -> SlippageRow {
        SlippageRow {
            time: "2022-03-01 10:15:42".to_string(),
            solver: Some(solver.to_string()),
            slippage,
        }
    }

    #[tokio::test]
    async fn test_get_slippage_sends_rendered_query() {
        let executor = FakeExecutor::returning(vec![row("Gnosis_0x", -0.4)]);
        let query = SlippageQuery::new("2022-03-01 00:00", "2022-03-08 00:00");

        let rows = get_slippage(&executor, &query, Network::Mainnet).await.unwrap();

        assert_eq!(rows, vec![row("Gnosis_0x", -0.4)]);
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sql, query.render());
        assert_eq!(seen[0].network, Network::Mainnet);
    }

    #[tokio::test]
    async fn test_get_slippage_propagates_errors_unchanged() {
        let executor = FakeExecutor {
            fail_with: Some(401),
            ..FakeExecutor::returning(vec![])
        };
        let query = SlippageQuery::new("2022-03-01 00:00", "2022-03-08 00:00");

        let err = get_slippage(&executor, &query, Network::Mainnet)
            .await
            .unwrap_err();

        match err {
            DuneError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid API Key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_slippage_through_trait_object() {
        let executor: Box<dyn QueryExecutor> = Box::new(FakeExecutor::returning(vec![]));
        let query = SlippageQuery::new("2022-03-01 00:00", "2022-03-08 00:00");

        let rows = get_slippage(executor.as_ref(), &query, Network::Gnosis).await.unwrap();
        assert!(rows.is_empty());
    }
}
