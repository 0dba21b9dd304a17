//! SQL template for per-settlement solver slippage.

use std::fmt;

use alloy::primitives::Address;

use crate::contracts::{SettlementConfig, NATIVE_DECIMALS, NATIVE_SYMBOL};

/// Rendered SQL ready to hand to the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryText(String);

impl QueryText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for QueryText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of the slippage query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlippageQuery {
    /// Inclusive lower bound, passed through as written (`yyyy-mm-dd HH:MM`).
    pub start_time: String,
    /// Inclusive upper bound.
    pub end_time: String,
    /// Restrict to a single solver; `None` matches every solver.
    pub solver: Option<Address>,
    pub config: SettlementConfig,
}

impl SlippageQuery {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            solver: None,
            config: SettlementConfig::default(),
        }
    }

    pub fn with_solver(mut self, solver: Option<Address>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_config(mut self, config: SettlementConfig) -> Self {
        self.config = config;
        self
    }

    /// Render the query. Pure: identical parameters give identical text.
    pub fn render(&self) -> QueryText {
        let config = &self.config;
        let start = text_literal(&self.start_time);
        let end = text_literal(&self.end_time);
        let solver_filter = match &self.solver {
            Some(solver) => format!("AND solver_address = {}", bytea_literal(solver)),
            None => String::new(),
        };
        let settlement_contracts = config
            .settlement_contracts
            .iter()
            .map(bytea_literal)
            .collect::<Vec<_>>()
            .join(", ");
        let native = bytea_literal(&config.native_token);
        let wrapped_native = bytea_literal(&config.wrapped_native_token);
        let burn = bytea_literal(&config.burn_address);

        QueryText(format!(
            r#"
WITH
filtered_batches AS (
    SELECT * FROM gnosis_protocol_v2."batches"
    WHERE dex_swaps > 0 -- excludes purely internal settlements
    {solver_filter}
    AND block_time BETWEEN {start} AND {end}
),

regular_transfers AS (
    SELECT
        block_time,
        tx_hash,
        solver_address,
        solver_name,
        "from" AS sender,
        "to" AS receiver,
        t.contract_address AS token,
        value AS amount_wei
    FROM filtered_batches
    INNER JOIN erc20."ERC20_evt_Transfer" t
        ON tx_hash = evt_tx_hash
),

unwraps AS (
    SELECT
        block_time,
        tx_hash,
        solver_address,
        solver_name,
        src AS sender,
        {burn}::bytea AS receiver,
        contract_address AS token,
        wad AS amount_wei
    FROM filtered_batches
    INNER JOIN zeroex."WETH9_evt_Withdrawal" w
        ON tx_hash = evt_tx_hash
    UNION ALL
    SELECT
        block_time,
        tx_hash,
        solver_address,
        solver_name,
        {burn}::bytea AS sender,
        src AS receiver,
        {native}::bytea AS token,
        wad AS amount_wei
    FROM filtered_batches
    INNER JOIN zeroex."WETH9_evt_Withdrawal" w
        ON tx_hash = evt_tx_hash
),

native_out AS (
    SELECT
        block_time,
        tx_hash,
        solver_address,
        solver_name,
        contract_address AS sender,
        owner AS receiver,
        "buyToken" AS token,
        "buyAmount" AS amount_wei
    FROM filtered_batches
    INNER JOIN gnosis_protocol_v2."GPv2Settlement_evt_Trade"
        ON tx_hash = evt_tx_hash
        AND "buyToken" = {native}
),

batch_transfers AS (
    SELECT * FROM regular_transfers
    UNION ALL -- duplicates are legitimate and must be kept
    SELECT * FROM unwraps
    UNION ALL
    SELECT * FROM native_out
),

fees AS (
    SELECT
        tx_hash,
        block_time,
        solver_address,
        solver_name,
        "sellToken" AS token,
        -1 * "feeAmount" AS amount_wei
    FROM filtered_batches
    INNER JOIN gnosis_protocol_v2."GPv2Settlement_evt_Trade"
        ON tx_hash = evt_tx_hash
),

incoming_and_outgoing AS (
    SELECT
        tx_hash,
        block_time,
        solver_address,
        solver_name,
        token,
        CASE
            WHEN receiver IN ({settlement_contracts}) THEN amount_wei
            WHEN sender IN ({settlement_contracts}) THEN -1 * amount_wei
            -- multi-hop intermediate transfers never touch the settlement contract
            ELSE 0
        END AS amount_wei
    FROM batch_transfers
),

tally AS (
    SELECT * FROM incoming_and_outgoing
    UNION ALL
    SELECT * FROM fees
),

contract_delta AS (
    SELECT
        block_time,
        tx_hash,
        CONCAT('0x', ENCODE(solver_address, 'hex')) AS solver_address,
        solver_name,
        token,
        SUM(amount_wei) AS batch_delta
    FROM tally
    GROUP BY block_time, tx_hash, token, solver_address, solver_name
),

token_breakdown AS (
    SELECT
        block_time,
        tx_hash,
        solver_address,
        solver_name,
        CASE
            WHEN token = {native} THEN '{native_symbol}'
            WHEN t.symbol IS NOT NULL THEN t.symbol
            ELSE TEXT(token)
        END AS symbol,
        batch_delta,
        batch_delta > 0 AS is_positive,
        batch_delta / 10 ^ (CASE WHEN token = {native} THEN {native_decimals} ELSE t.decimals END) * p.price AS usd_value
    FROM contract_delta d
    LEFT OUTER JOIN prices.usd p
        ON p.contract_address = CASE
            WHEN d.token = {native} THEN {wrapped_native}
            ELSE d.token
        END
        AND p.minute = DATE_TRUNC('minute', block_time)
    LEFT OUTER JOIN erc20.tokens t
        ON d.token = t.contract_address
    WHERE batch_delta != 0
    -- collapses duplicate price or token metadata matches
    GROUP BY solver_address, solver_name, block_time, tx_hash, t.decimals, p.price, t.symbol, token, batch_delta
),

results AS (
    SELECT
        block_time,
        solver_address,
        solver_name,
        STRING_AGG(TEXT(symbol), ',' ORDER BY symbol) AS tokens_involved,
        SUM(usd_value) AS usd_delta,
        COUNT(CASE WHEN usd_value IS NULL THEN 1 END) AS num_missing_prices,
        SUM(CASE WHEN is_positive THEN 1 ELSE 0 END) AS num_positive,
        SUM(CASE WHEN NOT is_positive THEN 1 ELSE 0 END) AS num_negative,
        CONCAT('0x', ENCODE(tx_hash, 'hex')) AS tx_hash
    FROM token_breakdown
    GROUP BY solver_address, solver_name, block_time, tx_hash
)

SELECT block_time AS time, solver_name AS solver, usd_delta AS slippage
FROM results
WHERE usd_delta IS NOT NULL
ORDER BY usd_delta
"#,
            native_symbol = NATIVE_SYMBOL,
            native_decimals = NATIVE_DECIMALS,
        ))
    }
}

/// Build the slippage query for every solver between two inclusive bounds.
pub fn build_query(start_time: &str, end_time: &str) -> QueryText {
    SlippageQuery::new(start_time, end_time).render()
}

fn bytea_literal(address: &Address) -> String {
    format!("'\\x{}'", hex::encode(address))
}

fn text_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ALPHA_SETTLEMENT_CONTRACT, BETA_SETTLEMENT_CONTRACT};
    use alloy::primitives::address;

    #[test]
    fn test_build_query_is_deterministic() {
        let first = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        let second = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        assert!(query
            .as_str()
            .contains("block_time BETWEEN '2022-03-01 00:00' AND '2022-03-08 00:00'"));
    }

    #[test]
    fn test_no_solver_predicate_without_filter() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        assert!(!query.as_str().contains("AND solver_address ="));
    }

    #[test]
    fn test_solver_filter_rendered() {
        let solver = address!("b20b86c4e6deeb432a22d773a221898bbbd03036");
        let query = SlippageQuery::new("2022-03-01 00:00", "2022-03-08 00:00")
            .with_solver(Some(solver))
            .render();
        assert!(query
            .as_str()
            .contains(r"AND solver_address = '\xb20b86c4e6deeb432a22d773a221898bbbd03036'"));
    }

    #[test]
    fn test_settlement_contracts_rendered() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        let expected = format!(
            "WHEN receiver IN ({}, {}) THEN amount_wei",
            bytea_literal(&ALPHA_SETTLEMENT_CONTRACT),
            bytea_literal(&BETA_SETTLEMENT_CONTRACT)
        );
        assert!(query.as_str().contains(&expected));
    }

    #[test]
    fn test_custom_settlement_contracts() {
        let contract = address!("1111111111111111111111111111111111111111");
        let config = SettlementConfig {
            settlement_contracts: vec![contract],
            ..SettlementConfig::default()
        };
        let query = SlippageQuery::new("a", "b").with_config(config).render();
        assert!(query
            .as_str()
            .contains(r"WHEN sender IN ('\x1111111111111111111111111111111111111111') THEN -1 * amount_wei"));
        assert!(!query.as_str().contains(&bytea_literal(&BETA_SETTLEMENT_CONTRACT)));
    }

    #[test]
    fn test_token_breakdown_collapses_duplicate_joins() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        let sql = query.as_str();
        let start = sql.find("token_breakdown AS (").unwrap();
        let end = sql.find("results AS (").unwrap();
        let breakdown = &sql[start..end];
        assert!(breakdown.contains(
            "GROUP BY solver_address, solver_name, block_time, tx_hash, t.decimals, p.price, t.symbol, token, batch_delta"
        ));
    }

    #[test]
    fn test_quotes_in_time_are_escaped() {
        let query = build_query("2022-03-01' OR '1'='1", "2022-03-08 00:00");
        assert!(query
            .as_str()
            .contains("BETWEEN '2022-03-01'' OR ''1''=''1' AND"));
    }

    #[test]
    fn test_native_sentinel_priced_via_wrapped_token() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        assert!(query.as_str().contains(
            r"WHEN d.token = '\xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee' THEN '\xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2'"
        ));
    }

    #[test]
    fn test_results_exclude_unpriced_and_order_by_slippage() {
        let query = build_query("2022-03-01 00:00", "2022-03-08 00:00");
        let text = query.as_str().trim_end();
        assert!(text.contains("WHERE usd_delta IS NOT NULL"));
        assert!(text.ends_with("ORDER BY usd_delta"));
    }
}
