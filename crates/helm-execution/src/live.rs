//! Live adapter: submits through the signed exchange client.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use helm_core::{LocalOrder, OrderSide, OrderStatus, OrderType, Price};
use helm_exchange::{ExchangeClient, ExchangeError, MarketData, OrderRequest, RemoteOrder};

use crate::adapter::ExecutionAdapter;
use crate::config::ExecutionConfig;
use crate::error::{ExecutionError, ExecutionResult};

/// Submits real orders, with precision rounding, slippage-bounded limit
/// prices, a dead-man heartbeat before every live submission, and bounded
/// retries on transient transport errors.
pub struct LiveAdapter {
    client: Arc<dyn ExchangeClient>,
    market: Arc<dyn MarketData>,
    config: ExecutionConfig,
}

impl LiveAdapter {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        market: Arc<dyn MarketData>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            client,
            market,
            config,
        }
    }

    /// Bound a limit price by the slippage tolerance: buys may pay up to
    /// tolerance more, sells accept up to tolerance less, never below
    /// zero.
    fn bounded_price(&self, side: OrderSide, price: Price) -> Price {
        let tolerance = self.config.slippage_tolerance_pct / Decimal::from(100);
        let adjusted = match side {
            OrderSide::Buy => price.inner() * (Decimal::ONE + tolerance),
            OrderSide::Sell => (price.inner() * (Decimal::ONE - tolerance)).max(Decimal::ZERO),
        };
        Price::new(adjusted)
    }

    fn submit_with_retries(&self, request: &OrderRequest) -> Result<helm_exchange::OrderResponse, ExchangeError> {
        let mut attempt = 0u32;
        loop {
            match self.client.submit_order(request) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay_ms * (1u64 << (attempt - 1));
                    warn!(
                        pair = %request.pair,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "transient submission failure, backing off"
                    );
                    thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl ExecutionAdapter for LiveAdapter {
    fn name(&self) -> &'static str {
        "live"
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

        let price = match order.order_type {
            OrderType::Limit => order
                .requested_price
                .map(|p| metadata.round_price(self.bounded_price(order.side, p))),
            OrderType::Market => None,
        };

        let request = OrderRequest {
            pair: order.pair.clone(),
            side: order.side,
            order_type: order.order_type,
            volume,
            price,
            userref: order.userref,
            validate: !self.config.live,
        };
        order.raw_request = serde_json::to_value(&request).ok();

        if self.config.live {
            // Refresh the dead-man switch so a crash after this point
            // leaves nothing resting forever.
            if let Err(e) = self.client.cancel_all_orders_after(self.config.deadman_timeout_secs) {
                order.fail(format!("dead-man heartbeat failed: {e}"));
                return Err(e.into());
            }
        }

        let response = match self.submit_with_retries(&request) {
            Ok(response) => response,
            Err(ExchangeError::Api(msg)) => {
                // Exchange said no. Terminal, recorded verbatim, not a
                // plan-level failure.
                order.reject(msg);
                return Ok(());
            }
            Err(e) => {
                order.fail(e.to_string());
                return Err(e.into());
            }
        };

        order.raw_response = Some(response.raw.clone());

        if request.validate {
            order.transition(OrderStatus::Validated);
            debug!(order = %order.local_id, pair = %order.pair, "order validated (dry run)");
            return Ok(());
        }

        match response.txid {
            Some(txid) => {
                order.remote_id = Some(txid.clone());
                order.transition(OrderStatus::Open);
                info!(order = %order.local_id, remote = %txid, pair = %order.pair, "order live");
                Ok(())
            }
            None => {
                order.fail("accepted but no transaction id in response");
                Err(ExecutionError::MalformedResponse(
                    "submission response missing transaction id".to_string(),
                ))
            }
        }
    }

    fn cancel(&self, order: &LocalOrder) -> ExecutionResult<()> {
        let remote_id = order
            .remote_id
            .as_deref()
            .ok_or_else(|| ExecutionError::UnknownOrder(order.local_id.to_string()))?;
        self.client.cancel_order(remote_id)?;
        Ok(())
    }

    fn cancel_all(&self) -> ExecutionResult<u32> {
        Ok(self.client.cancel_all()?)
    }

    fn heartbeat(&self) -> ExecutionResult<()> {
        self.client
            .cancel_all_orders_after(self.config.deadman_timeout_secs)?;
        Ok(())
    }

    fn open_orders(&self) -> ExecutionResult<Vec<RemoteOrder>> {
        Ok(self.client.get_open_orders(None)?)
    }

    fn closed_orders(&self) -> ExecutionResult<Vec<RemoteOrder>> {
        Ok(self.client.get_closed_orders()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_core::{Pair, PairMetadata, Size};
    use helm_exchange::{
        Candle, ExchangeResult, LedgerEntry, MarketDataResult, OrderResponse, RawBalance,
        RemoteTrade,
    };
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeClient {
        requests: Mutex<Vec<OrderRequest>>,
        heartbeats: AtomicU32,
        /// Errors returned before the first success.
        fail_with: Mutex<Vec<ExchangeError>>,
        /// Omit the txid from successful responses.
        omit_txid: bool,
    }

    impl ExchangeClient for FakeClient {
        fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
            if let Some(e) = self.fail_with.lock().pop() {
                return Err(e);
            }
            self.requests.lock().push(request.clone());
            Ok(OrderResponse {
                txid: if self.omit_txid || request.validate {
                    None
                } else {
                    Some("R-1".to_string())
                },
                description: None,
                raw: serde_json::json!({"ok": true}),
            })
        }

        fn cancel_order(&self, _: &str) -> ExchangeResult<()> {
            Ok(())
        }

        fn cancel_all(&self) -> ExchangeResult<u32> {
            Ok(0)
        }

        fn cancel_all_orders_after(&self, _: u32) -> ExchangeResult<()> {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn get_open_orders(&self, _: Option<i64>) -> ExchangeResult<Vec<RemoteOrder>> {
            Ok(Vec::new())
        }

        fn get_closed_orders(&self) -> ExchangeResult<Vec<RemoteOrder>> {
            Ok(Vec::new())
        }

        fn get_balances(&self) -> ExchangeResult<Vec<RawBalance>> {
            Ok(Vec::new())
        }

        fn get_trades_history(&self) -> ExchangeResult<Vec<RemoteTrade>> {
            Ok(Vec::new())
        }

        fn get_ledger_entries(&self) -> ExchangeResult<Vec<LedgerEntry>> {
            Ok(Vec::new())
        }
    }

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

    fn adapter(client: Arc<FakeClient>, live: bool) -> LiveAdapter {
        let config = ExecutionConfig {
            live,
            retry_base_delay_ms: 1,
            ..ExecutionConfig::default()
        };
        LiveAdapter::new(client, Arc::new(FixedMarket), config)
    }

    fn order(order_type: OrderType, size: Decimal, price: Option<Decimal>) -> LocalOrder {
        LocalOrder::new(
            "plan-1",
            "trend",
            Pair::new("BTC", "USD"),
            OrderSide::Buy,
            order_type,
            Size::new(size),
            price.map(Price::new),
        )
    }

    #[test]
    fn test_dry_run_sets_validate_flag() {
        let client = Arc::new(FakeClient::default());
        let adapter = adapter(client.clone(), false);
        let mut order = order(OrderType::Market, dec!(0.5), None);

        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Validated);
        assert!(client.requests.lock()[0].validate);
        // No heartbeat when nothing real is placed.
        assert_eq!(client.heartbeats.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_submit_heartbeats_and_opens() {
        let client = Arc::new(FakeClient::default());
        let adapter = adapter(client.clone(), true);
        let mut order = order(OrderType::Market, dec!(0.5), None);

        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.remote_id.as_deref(), Some("R-1"));
        assert_eq!(client.heartbeats.load(Ordering::SeqCst), 1);
        assert!(!client.requests.lock()[0].validate);
    }

    #[test]
    fn test_rounding_and_slippage_on_limit_buy() {
        let client = Arc::new(FakeClient::default());
        let adapter = adapter(client.clone(), false);
        let mut order = order(OrderType::Limit, dec!(0.123456789), Some(dec!(50000)));

        adapter.submit(&mut order).unwrap();
        let request = client.requests.lock()[0].clone();
        // Volume rounded down to 4 decimals.
        assert_eq!(request.volume, Size::new(dec!(0.1234)));
        // Buy limit capped 0.5% up, rounded to 1 decimal.
        assert_eq!(request.price, Some(Price::new(dec!(50250.0))));
    }

    #[test]
    fn test_below_minimum_rejected_without_submission() {
        let client = Arc::new(FakeClient::default());
        let adapter = adapter(client.clone(), false);
        let mut order = order(OrderType::Market, dec!(0.0001), None);

        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(client.requests.lock().is_empty());
    }

    #[test]
    fn test_transient_errors_retried() {
        let client = Arc::new(FakeClient::default());
        *client.fail_with.lock() = vec![
            ExchangeError::RateLimited("slow down".to_string()),
            ExchangeError::ServiceUnavailable("maintenance".to_string()),
        ];
        let adapter = adapter(client.clone(), false);
        let mut order = order(OrderType::Market, dec!(0.5), None);

        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Validated);
    }

    #[test]
    fn test_exchange_rejection_is_terminal_not_error() {
        let client = Arc::new(FakeClient::default());
        *client.fail_with.lock() = vec![ExchangeError::Api("insufficient funds".to_string())];
        let adapter = adapter(client.clone(), false);
        let mut order = order(OrderType::Market, dec!(0.5), None);

        // Rejection is recorded on the order, not surfaced as Err.
        adapter.submit(&mut order).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.last_error.as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn test_missing_txid_is_terminal_error() {
        let client = Arc::new(FakeClient {
            omit_txid: true,
            ..FakeClient::default()
        });
        let adapter = adapter(client, true);
        let mut order = order(OrderType::Market, dec!(0.5), None);

        assert!(adapter.submit(&mut order).is_err());
        assert_eq!(order.status, OrderStatus::Error);
    }

    #[test]
    fn test_sell_slippage_floors_at_zero() {
        let client = Arc::new(FakeClient::default());
        let adapter = adapter(client, false);
        let bounded = adapter.bounded_price(OrderSide::Sell, Price::new(dec!(100)));
        assert_eq!(bounded, Price::new(dec!(99.5)));
        assert_eq!(
            adapter.bounded_price(OrderSide::Sell, Price::ZERO),
            Price::ZERO
        );
    }
}
