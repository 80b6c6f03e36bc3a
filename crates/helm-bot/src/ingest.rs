//! Converts venue data into ledger records.
//!
//! This is where trades get their strategy attribution: the parent order
//! is resolved through the store and its strategy stamped onto the
//! record. Trades with no resolvable parent fall back to `"manual"`
//! inside the ledger.

use tracing::warn;

use helm_core::{ExecutionReport, OrderStatus};
use helm_exchange::{LedgerEntry, LedgerEntryKind, RemoteTrade};
use helm_persistence::Store;
use helm_portfolio::{CashFlowKind, CashFlowRecord, TradeRecord};

/// Build trade records from exchange trade history, attributing each to
/// the strategy of its parent order when the store knows it.
pub fn trades_from_history(store: &dyn Store, trades: &[RemoteTrade]) -> Vec<TradeRecord> {
    trades
        .iter()
        .map(|trade| {
            let parent = match store.get_order_by_remote_id(&trade.order_id) {
                Ok(parent) => parent,
                Err(e) => {
                    warn!(trade = %trade.trade_id, error = %e, "parent lookup failed");
                    None
                }
            };
            TradeRecord {
                trade_id: trade.trade_id.clone(),
                order_ref: Some(trade.order_id.clone()),
                userref: parent.as_ref().and_then(|o| o.userref),
                strategy: parent.map(|o| o.strategy),
                pair: trade.pair.clone(),
                side: trade.side,
                price: trade.price,
                volume: trade.volume,
                fee_quote: trade.fee,
                quote_rate: None,
                executed_at: trade.executed_at,
            }
        })
        .collect()
}

/// Map exchange ledger entries onto cash-flow records.
pub fn flows_from_entries(entries: &[LedgerEntry]) -> Vec<CashFlowRecord> {
    entries
        .iter()
        .map(|entry| CashFlowRecord {
            entry_id: entry.entry_id.clone(),
            kind: match entry.kind {
                LedgerEntryKind::Deposit => CashFlowKind::Deposit,
                LedgerEntryKind::Withdrawal => CashFlowKind::Withdrawal,
                LedgerEntryKind::Adjustment => CashFlowKind::Adjustment,
            },
            asset: entry.asset.clone(),
            amount: entry.amount,
            timestamp: entry.timestamp,
        })
        .collect()
}

/// Build trade records from a plan's paper fills. Fees are zero in the
/// simulation.
pub fn trades_from_report(report: &ExecutionReport) -> Vec<TradeRecord> {
    report
        .orders
        .iter()
        .filter(|o| o.status == OrderStatus::Filled && o.filled_size.is_positive())
        .filter_map(|order| {
            let price = order.avg_fill_price?;
            Some(TradeRecord {
                trade_id: format!("fill_{}", order.local_id),
                order_ref: order.remote_id.clone(),
                userref: order.userref,
                strategy: Some(order.strategy.clone()),
                pair: order.pair.clone(),
                side: order.side,
                price,
                volume: order.filled_size,
                fee_quote: rust_decimal::Decimal::ZERO,
                quote_rate: None,
                executed_at: order.updated_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helm_core::{LocalOrder, OrderSide, OrderType, Pair, Price, Size};
    use helm_persistence::MemoryStore;
    use rust_decimal_macros::dec;

    #[test]
    fn test_history_attribution_via_store() {
        let store = MemoryStore::new();
        let mut parent = LocalOrder::new(
            "plan-1",
            "trend",
            Pair::new("BTC", "USD"),
            OrderSide::Buy,
            OrderType::Market,
            Size::new(dec!(0.5)),
            None,
        );
        parent.remote_id = Some("R-1".to_string());
        parent.userref = Some(42);
        store.save_order(&parent).unwrap();

        let trades = vec![
            RemoteTrade {
                trade_id: "T-1".to_string(),
                order_id: "R-1".to_string(),
                pair: Pair::new("BTC", "USD"),
                side: OrderSide::Buy,
                price: Price::new(dec!(50000)),
                volume: Size::new(dec!(0.5)),
                fee: dec!(5),
                executed_at: Utc::now(),
            },
            RemoteTrade {
                trade_id: "T-2".to_string(),
                order_id: "R-unknown".to_string(),
                pair: Pair::new("BTC", "USD"),
                side: OrderSide::Sell,
                price: Price::new(dec!(51000)),
                volume: Size::new(dec!(0.1)),
                fee: dec!(1),
                executed_at: Utc::now(),
            },
        ];
        let records = trades_from_history(&store, &trades);

        assert_eq!(records[0].strategy.as_deref(), Some("trend"));
        assert_eq!(records[0].userref, Some(42));
        // Unattributable trade stays unstamped; the ledger tags it manual.
        assert!(records[1].strategy.is_none());
    }

    #[test]
    fn test_report_fills_become_trades() {
        let mut order = LocalOrder::new(
            "plan-1",
            "constant_mix",
            Pair::new("BTC", "USD"),
            OrderSide::Buy,
            OrderType::Market,
            Size::new(dec!(0.02)),
            None,
        );
        order.remote_id = Some("paper_000001".to_string());
        order.transition(helm_core::OrderStatus::Open);
        order.record_fill(Size::new(dec!(0.02)), Some(Price::new(dec!(50000))));
        order.transition(helm_core::OrderStatus::Filled);

        let mut rejected = LocalOrder::new(
            "plan-1",
            "constant_mix",
            Pair::new("ETH", "USD"),
            OrderSide::Buy,
            OrderType::Market,
            Size::new(dec!(1)),
            None,
        );
        rejected.reject("nope");

        let mut report = ExecutionReport::begin("plan-1");
        report.orders = vec![order, rejected];
        report.complete();

        let records = trades_from_report(&report);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strategy.as_deref(), Some("constant_mix"));
        assert_eq!(records[0].volume, Size::new(dec!(0.02)));
    }
}
