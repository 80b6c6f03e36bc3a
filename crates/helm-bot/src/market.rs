//! Config-backed market data for paper trading.

use std::collections::HashMap;

use rust_decimal::Decimal;

use helm_core::{Pair, PairMetadata, Price, Size};
use helm_exchange::{Candle, MarketData, MarketDataError, MarketDataResult};

/// Fixed reference prices from the `[paper.prices]` config table.
///
/// No candle history exists, so ATR auto-sizing is unavailable in paper
/// mode; strategies must size their intents explicitly.
pub struct PaperMarket {
    prices: HashMap<String, Price>,
}

impl PaperMarket {
    pub fn new(prices: &HashMap<String, Decimal>) -> Self {
        Self {
            prices: prices
                .iter()
                .map(|(symbol, price)| (symbol.clone(), Price::new(*price)))
                .collect(),
        }
    }
}

impl MarketData for PaperMarket {
    fn latest_price(&self, pair: &Pair) -> MarketDataResult<Price> {
        self.prices
            .get(&pair.symbol())
            .copied()
            .ok_or_else(|| MarketDataError::UnknownPair(pair.symbol()))
    }

    fn ohlc(&self, pair: &Pair, _: &str, _: usize) -> MarketDataResult<Vec<Candle>> {
        Err(MarketDataError::Unavailable(format!(
            "no candle history in paper mode for {pair}"
        )))
    }

    fn best_bid_ask(&self, pair: &Pair) -> MarketDataResult<(Price, Price)> {
        let price = self.latest_price(pair)?;
        Ok((price, price))
    }

    fn pair_metadata(&self, _: &Pair) -> MarketDataResult<PairMetadata> {
        Ok(PairMetadata {
            price_decimals: 2,
            volume_decimals: 8,
            min_order_size: Size::new(Decimal::new(1, 5)), // 0.00001
        })
    }
}
