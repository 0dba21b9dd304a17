//! In-memory evaluation of the slippage aggregation over decoded events.
//!
//! Mirrors the SQL template stage by stage so the same semantics can be
//! checked offline against hand-built settlements.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use slippage_models::{
    Batch, BatchDelta, Erc20Transfer, Fee, LedgerEntry, PricedDelta, SlippageRow, TokenInfo, Trade,
    TransactionSlippage, Transfer, Withdrawal,
};
use tracing::{debug, warn};

use crate::contracts::{SettlementConfig, NATIVE_DECIMALS, NATIVE_SYMBOL};

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.start <= *time && *time <= self.end
    }
}

/// Which batches take part in the aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFilter {
    pub window: TimeWindow,
    pub solver: Option<Address>,
}

/// Decoded events of the settlement transactions under consideration.
#[derive(Debug, Clone, Default)]
pub struct EventSet {
    pub transfers: Vec<Erc20Transfer>,
    pub withdrawals: Vec<Withdrawal>,
    pub trades: Vec<Trade>,
}

/// USD quotes keyed by token and minute.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    quotes: HashMap<(Address, i64), f64>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the price of `token` for the minute containing `time`.
    pub fn insert(&mut self, token: Address, time: DateTime<Utc>, price: f64) {
        self.quotes.insert((token, minute_of(&time)), price);
    }

    /// Price of `token` quoted at the minute containing `time`.
    pub fn price_at(&self, token: Address, time: &DateTime<Utc>) -> Option<f64> {
        self.quotes.get(&(token, minute_of(time))).copied()
    }
}

fn minute_of(time: &DateTime<Utc>) -> i64 {
    time.timestamp().div_euclid(60)
}

/// Prices and token metadata used to convert raw deltas to USD.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub prices: PriceBook,
    pub tokens: HashMap<Address, TokenInfo>,
}

/// Batches inside the window that touched external liquidity, optionally
/// restricted to one solver.
pub fn filter_batches<'a>(batches: &'a [Batch], filter: &BatchFilter) -> Vec<&'a Batch> {
    batches
        .iter()
        .filter(|batch| batch.dex_swaps > 0)
        .filter(|batch| filter.solver.map_or(true, |solver| batch.solver_address == solver))
        .filter(|batch| filter.window.contains(&batch.block_time))
        .collect()
}

fn transfer(
    batch: &Batch,
    sender: Address,
    receiver: Address,
    token: Address,
    amount: U256,
) -> Transfer {
    Transfer {
        block_time: batch.block_time,
        tx_hash: batch.tx_hash,
        solver_address: batch.solver_address,
        solver_name: batch.solver_name.clone(),
        sender,
        receiver,
        token,
        amount,
    }
}

pub fn regular_transfer(batch: &Batch, event: &Erc20Transfer) -> Transfer {
    transfer(batch, event.from, event.to, event.token, event.value)
}

/// Expand an unwrap into its two offsetting legs: the wrapped token leaving
/// `src` for the burn address, and native currency arriving back at `src`.
pub fn unwrap_legs(batch: &Batch, event: &Withdrawal, config: &SettlementConfig) -> [Transfer; 2] {
    [
        transfer(batch, event.src, config.burn_address, event.token, event.wad),
        transfer(batch, config.burn_address, event.src, config.native_token, event.wad),
    ]
}

/// Native currency paid out of the settlement contract, if the trade bought it.
pub fn native_proceeds(batch: &Batch, trade: &Trade, config: &SettlementConfig) -> Option<Transfer> {
    (trade.buy_token == config.native_token).then(|| {
        transfer(
            batch,
            trade.settlement_contract,
            trade.owner,
            trade.buy_token,
            trade.buy_amount,
        )
    })
}

fn index_batches<'a>(batches: &[&'a Batch]) -> HashMap<B256, &'a Batch> {
    batches.iter().map(|batch| (batch.tx_hash, *batch)).collect()
}

/// Every transfer-like movement of the qualifying batches. Duplicates are kept.
pub fn batch_transfers(
    batches: &[&Batch],
    events: &EventSet,
    config: &SettlementConfig,
) -> Vec<Transfer> {
    let index = index_batches(batches);

    let regular = events
        .transfers
        .iter()
        .filter_map(|event| index.get(&event.tx_hash).map(|batch| regular_transfer(batch, event)));
    let unwraps = events
        .withdrawals
        .iter()
        .filter_map(|event| index.get(&event.tx_hash).map(|batch| unwrap_legs(batch, event, config)))
        .flatten();
    let proceeds = events.trades.iter().filter_map(|trade| {
        index
            .get(&trade.tx_hash)
            .and_then(|batch| native_proceeds(batch, trade, config))
    });

    regular.chain(unwraps).chain(proceeds).collect()
}

/// One non-positive fee per trade, denominated in the sell token.
pub fn fees(batches: &[&Batch], trades: &[Trade]) -> Vec<Fee> {
    let index = index_batches(batches);
    trades
        .iter()
        .filter_map(|trade| {
            let batch = index.get(&trade.tx_hash)?;
            let Ok(amount) = I256::try_from(trade.fee_amount) else {
                warn!("Skipping out of range fee {} in tx {}", trade.fee_amount, trade.tx_hash);
                return None;
            };
            Some(Fee {
                block_time: batch.block_time,
                tx_hash: batch.tx_hash,
                solver_address: batch.solver_address,
                solver_name: batch.solver_name.clone(),
                token: trade.sell_token,
                amount: -amount,
            })
        })
        .collect()
}

/// Signed effect of a transfer on the settlement contracts' balance.
///
/// `None` when the amount does not fit a signed 256-bit integer.
pub fn signed_contribution(transfer: &Transfer, config: &SettlementConfig) -> Option<I256> {
    let amount = I256::try_from(transfer.amount).ok()?;
    if config.is_settlement_contract(&transfer.receiver) {
        Some(amount)
    } else if config.is_settlement_contract(&transfer.sender) {
        Some(-amount)
    } else {
        Some(I256::ZERO)
    }
}

/// Combine signed transfer contributions with fees into one ledger.
pub fn ledger(transfers: &[Transfer], fees: Vec<Fee>, config: &SettlementConfig) -> Vec<LedgerEntry> {
    transfers
        .iter()
        .filter_map(|transfer| {
            let Some(amount) = signed_contribution(transfer, config) else {
                warn!(
                    "Skipping out of range transfer of {} {} in tx {}",
                    transfer.amount, transfer.token, transfer.tx_hash
                );
                return None;
            };
            Some(LedgerEntry {
                block_time: transfer.block_time,
                tx_hash: transfer.tx_hash,
                solver_address: transfer.solver_address,
                solver_name: transfer.solver_name.clone(),
                token: transfer.token,
                amount,
            })
        })
        .chain(fees.into_iter().map(LedgerEntry::from))
        .collect()
}

type DeltaKey = (DateTime<Utc>, B256, Address, Address, String);

/// Net movement per (block time, tx, token, solver), zero deltas dropped.
pub fn batch_deltas(entries: &[LedgerEntry]) -> Vec<BatchDelta> {
    let mut sums: BTreeMap<DeltaKey, I256> = BTreeMap::new();
    for entry in entries {
        let key = (
            entry.block_time,
            entry.tx_hash,
            entry.token,
            entry.solver_address,
            entry.solver_name.clone(),
        );
        let sum = sums.entry(key).or_insert(I256::ZERO);
        *sum = sum.saturating_add(entry.amount);
    }

    sums.into_iter()
        .filter(|(_, delta)| !delta.is_zero())
        .map(|((block_time, tx_hash, token, solver_address, solver_name), delta)| BatchDelta {
            block_time,
            tx_hash,
            solver_address,
            solver_name,
            token,
            delta,
        })
        .collect()
}

/// Convert each delta to USD. Unknown price or decimals yields `None`.
pub fn price_deltas(
    deltas: Vec<BatchDelta>,
    market: &MarketData,
    config: &SettlementConfig,
) -> Vec<PricedDelta> {
    deltas
        .into_iter()
        .map(|delta| {
            let info = market.tokens.get(&delta.token);
            let (symbol, decimals) = if delta.token == config.native_token {
                (NATIVE_SYMBOL.to_string(), Some(NATIVE_DECIMALS))
            } else {
                match info {
                    Some(info) => (info.symbol.clone(), Some(info.decimals)),
                    None => (format!("0x{}", hex::encode(delta.token)), None),
                }
            };
            let price = market
                .prices
                .price_at(config.price_token(delta.token), &delta.block_time);
            let usd_value = match (decimals, price) {
                (Some(decimals), Some(price)) => {
                    Some(raw_to_f64(delta.delta) / 10f64.powi(i32::from(decimals)) * price)
                }
                _ => None,
            };
            PricedDelta {
                delta,
                symbol,
                usd_value,
            }
        })
        .collect()
}

fn raw_to_f64(value: I256) -> f64 {
    value.to_string().parse().unwrap_or(f64::NAN)
}

type SettlementKey = (Address, String, DateTime<Utc>, B256);

/// Sum USD legs per settlement. Known legs are summed even when others are
/// unpriced; the total is `None` only when no leg has a price.
pub fn settle_transactions(priced: Vec<PricedDelta>) -> Vec<TransactionSlippage> {
    let mut groups: BTreeMap<SettlementKey, Vec<PricedDelta>> = BTreeMap::new();
    for leg in priced {
        let key = (
            leg.delta.solver_address,
            leg.delta.solver_name.clone(),
            leg.delta.block_time,
            leg.delta.tx_hash,
        );
        groups.entry(key).or_default().push(leg);
    }

    groups
        .into_iter()
        .map(|((solver_address, solver_name, block_time, tx_hash), legs)| {
            let mut symbols: Vec<&str> = legs.iter().map(|leg| leg.symbol.as_str()).collect();
            symbols.sort_unstable();
            let usd_delta = legs
                .iter()
                .filter_map(|leg| leg.usd_value)
                .fold(None, |acc: Option<f64>, value| Some(acc.unwrap_or(0.0) + value));
            let num_missing_prices = legs.iter().filter(|leg| leg.usd_value.is_none()).count();
            let num_positive = legs.iter().filter(|leg| leg.is_positive()).count();

            TransactionSlippage {
                block_time,
                tx_hash,
                solver_address,
                solver_name,
                tokens_involved: symbols.join(","),
                usd_delta,
                num_missing_prices,
                num_positive,
                num_negative: legs.len() - num_positive,
            }
        })
        .collect()
}

/// Final result rows: priced settlements only, ascending by slippage.
pub fn slippage_rows(settlements: &[TransactionSlippage]) -> Vec<SlippageRow> {
    let mut rows: Vec<SlippageRow> = settlements
        .iter()
        .filter_map(|settlement| {
            settlement.usd_delta.map(|slippage| SlippageRow {
                time: settlement.block_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                solver: Some(settlement.solver_name.clone()),
                slippage,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.slippage.total_cmp(&b.slippage));
    rows
}

/// Run the whole aggregation over decoded events.
pub fn aggregate(
    batches: &[Batch],
    events: &EventSet,
    filter: &BatchFilter,
    market: &MarketData,
    config: &SettlementConfig,
) -> Vec<SlippageRow> {
    let selected = filter_batches(batches, filter);
    let transfers = batch_transfers(&selected, events, config);
    let fees = fees(&selected, &events.trades);
    let entries = ledger(&transfers, fees, config);
    let deltas = batch_deltas(&entries);
    let priced = price_deltas(deltas, market, config);
    let settlements = settle_transactions(priced);

    let missing: usize = settlements.iter().map(|s| s.num_missing_prices).sum();
    debug!(
        "Aggregated {} batches into {} settlements ({} unpriced legs)",
        selected.len(),
        settlements.len(),
        missing
    );

    slippage_rows(&settlements)
}
