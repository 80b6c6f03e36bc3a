//! Paper adapter: in-process fill simulation.
//!
//! Market orders fill immediately at the reference price. Limit orders
//! fill at their limit when marketable, otherwise rest in a local book
//! until canceled. Precision and minimum-size rules are enforced exactly
//! like live so paper behavior predicts live behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use helm_core::{LocalOrder, OrderSide, OrderStatus, OrderType, Price};
use helm_exchange::{MarketData, RemoteOrder, RemoteOrderStatus};

use crate::adapter::ExecutionAdapter;
use crate::error::ExecutionResult;

pub struct PaperAdapter {
    market: Arc<dyn MarketData>,
    sequence: AtomicU64,
    /// Resting limit orders by synthetic remote id.
    book: Mutex<HashMap<String, RemoteOrder>>,
    /// Finished orders, reported through `closed_orders`.
    done: Mutex<Vec<RemoteOrder>>,
}

impl PaperAdapter {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            market,
            sequence: AtomicU64::new(1),
            book: Mutex::new(HashMap::new()),
            done: Mutex::new(Vec::new()),
        }
    }

    fn next_remote_id(&self) -> String {
        format!("paper_{:06}", self.sequence.fetch_add(1, Ordering::SeqCst))
    }

    fn fill(&self, order: &mut LocalOrder, remote_id: String, price: Price) {
        order.remote_id = Some(remote_id.clone());
        order.transition(OrderStatus::Open);
        order.record_fill(order.requested_size, Some(price));
        order.transition(OrderStatus::Filled);
        self.done.lock().push(RemoteOrder {
            remote_id,
            userref: order.userref,
            pair: Some(order.pair.clone()),
            status: RemoteOrderStatus::Closed,
            volume: order.requested_size,
            volume_executed: order.requested_size,
            avg_price: Some(price),
        });
        info!(order = %order.local_id, pair = %order.pair, %price, "paper fill");
    }
}

impl ExecutionAdapter for PaperAdapter {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn submit(&self, order: &mut LocalOrder) -> ExecutionResult<()> {
        let metadata = match self.market.pair_metadata(&order.pair) {
            Ok(m) => m,
            Err(e) => {
                order.fail(format!("no pair metadata: {e}"));
                return Err(e.into());
            }
        };

        let volume = metadata.round_size(order.requested_size);
        if !metadata.meets_minimum(volume) {
            order.reject(format!(
                "size {volume} below exchange minimum {}",
                metadata.min_order_size
            ));
            return Ok(());
        }
        order.requested_size = volume;

        let reference = match self.market.latest_price(&order.pair) {
            Ok(p) => p,
            Err(e) => {
                order.fail(format!("no reference price: {e}"));
                return Err(e.into());
            }
        };

        match order.order_type {
            OrderType::Market => {
                self.fill(order, self.next_remote_id(), reference);
            }
            OrderType::Limit => {
                let limit = metadata
                    .round_price(order.requested_price.unwrap_or(reference));
                let marketable = match order.side {
                    OrderSide::Buy => limit >= reference,
                    OrderSide::Sell => limit <= reference,
                };
                if marketable {
                    self.fill(order, self.next_remote_id(), limit);
                } else {
                    let remote_id = self.next_remote_id();
                    order.remote_id = Some(remote_id.clone());
                    order.transition(OrderStatus::Open);
                    self.book.lock().insert(
                        remote_id.clone(),
                        RemoteOrder {
                            remote_id,
                            userref: order.userref,
                            pair: Some(order.pair.clone()),
                            status: RemoteOrderStatus::Open,
                            volume,
                            volume_executed: helm_core::Size::ZERO,
                            avg_price: None,
                        },
                    );
                    debug!(order = %order.local_id, %limit, "paper order resting");
                }
            }
        }
        Ok(())
    }

    fn cancel(&self, order: &LocalOrder) -> ExecutionResult<()> {
        if let Some(remote_id) = &order.remote_id {
            if let Some(mut resting) = self.book.lock().remove(remote_id) {
                resting.status = RemoteOrderStatus::Canceled;
                self.done.lock().push(resting);
            }
        }
        Ok(())
    }

    fn cancel_all(&self) -> ExecutionResult<u32> {
        let mut book = self.book.lock();
        let count = book.len() as u32;
        let mut done = self.done.lock();
        for (_, mut resting) in book.drain() {
            resting.status = RemoteOrderStatus::Canceled;
            done.push(resting);
        }
        Ok(count)
    }

    fn heartbeat(&self) -> ExecutionResult<()> {
        Ok(())
    }

    fn open_orders(&self) -> ExecutionResult<Vec<RemoteOrder>> {
        Ok(self.book.lock().values().cloned().collect())
    }

    fn closed_orders(&self) -> ExecutionResult<Vec<RemoteOrder>> {
        Ok(self.done.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_core::{Pair, PairMetadata, Size};
    use helm_exchange::{Candle, MarketDataResult};
    use rust_decimal_macros::dec;

    struct FixedMarket;

    impl MarketData for FixedMarket {
        fn latest_price(&self, _: &Pair) -> MarketDataResult<Price> {
            Ok(Price::new(dec!(50000)))
        }

        fn ohlc(&self, _: &Pair, _: &str, _: usize) -> MarketDataResult<Vec<Candle>> {
            Ok(Vec::new())
        }

        fn best_bid_ask(&self, _: &Pair) -> MarketDataResult<(Price, Price)> {
            Ok((Price::new(dec!(49999)), Price::new(dec!(50001))))
        }

        fn pair_metadata(&self, _: &Pair) -> MarketDataResult<PairMetadata> {
            Ok(PairMetadata {
                price_decimals: 1,
                volume_decimals: 4,
                min_order_size: Size::new(dec!(0.001)),
            })
        }
    }

    fn adapter() -> PaperAdapter {
        PaperAdapter::new(Arc::new(FixedMarket))
    }

    fn order(order_type: OrderType, side: OrderSide, price: Option<Price>) -> LocalOrder {
        LocalOrder::new(
            "plan-1",
            "trend",
            Pair::new("BTC", "USD"),
            side,
            order_type,
            Size::new(dec!(0.5)),
            price,
        )
    }

    #[test]
    fn test_market_order_fills_at_reference() {
        let adapter = adapter();
        let mut order = order(OrderType::Market, OrderSide::Buy, None);
        adapter.submit(&mut order).unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, Some(Price::new(dec!(50000))));
        assert_eq!(order.filled_size, Size::new(dec!(0.5)));
        assert!(order.remote_id.as_deref().unwrap().starts_with("paper_"));
        assert_eq!(adapter.closed_orders().unwrap().len(), 1);
    }

    #[test]
    fn test_unmarketable_limit_rests_until_cancel() {
        let adapter = adapter();
        let mut order = order(
            OrderType::Limit,
            OrderSide::Buy,
            Some(Price::new(dec!(45000))),
        );
        adapter.submit(&mut order).unwrap();

        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(adapter.open_orders().unwrap().len(), 1);

        adapter.cancel(&order).unwrap();
        assert!(adapter.open_orders().unwrap().is_empty());
        let closed = adapter.closed_orders().unwrap();
        assert_eq!(closed[0].status, RemoteOrderStatus::Canceled);
    }

    #[test]
    fn test_marketable_limit_fills_at_limit() {
        let adapter = adapter();
        let mut order = order(
            OrderType::Limit,
            OrderSide::Sell,
            Some(Price::new(dec!(49000))),
        );
        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, Some(Price::new(dec!(49000))));
    }

    #[test]
    fn test_cancel_all_drains_book() {
        let adapter = adapter();
        for _ in 0..3 {
            let mut o = order(
                OrderType::Limit,
                OrderSide::Buy,
                Some(Price::new(dec!(45000))),
            );
            adapter.submit(&mut o).unwrap();
        }
        assert_eq!(adapter.cancel_all().unwrap(), 3);
        assert!(adapter.open_orders().unwrap().is_empty());
    }
}
