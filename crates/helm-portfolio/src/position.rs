//! Weighted-average-cost spot positions and asset balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use helm_core::{Pair, Price, Size};

/// A spot position in one pair.
///
/// `size` is >= 0 by construction: an oversell is clamped at zero rather
/// than flipping short. `avg_entry_price` changes only on buys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPosition {
    pub pair: Pair,
    pub base_asset: String,
    pub quote_asset: String,
    pub size: Size,
    pub avg_entry_price: Price,
    /// Cumulative realized PnL in account base currency.
    pub realized_pnl: Decimal,
    /// Cumulative fees in account base currency.
    pub fees_paid: Decimal,
    /// Strategy that opened the position, when attributable.
    pub strategy: Option<String>,
}

impl SpotPosition {
    #[must_use]
    pub fn new(pair: Pair) -> Self {
        let base_asset = pair.base.clone();
        let quote_asset = pair.quote.clone();
        Self {
            pair,
            base_asset,
            quote_asset,
            size: Size::ZERO,
            avg_entry_price: Price::ZERO,
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            strategy: None,
        }
    }

    /// Apply a buy: fold the trade cost into the weighted-average entry.
    ///
    /// `fee` is already converted into account base currency.
    pub fn apply_buy(&mut self, price: Price, volume: Size, fee: Decimal) {
        let old_qty = self.size.inner();
        let new_qty = old_qty + volume.inner();
        if new_qty.is_zero() {
            return;
        }
        let trade_cost = price.inner() * volume.inner();
        let old_cost = self.avg_entry_price.inner() * old_qty;
        self.avg_entry_price = Price::new((old_cost + trade_cost) / new_qty);
        self.size = Size::new(new_qty);
        self.fees_paid += fee;
    }

    /// Apply a sell: realize PnL against the average entry.
    ///
    /// Returns the realized PnL in account base currency, net of fee.
    /// `rate` converts the pair's quote currency into the account base
    /// currency. Oversells are clamped: the position floors at zero.
    pub fn apply_sell(&mut self, price: Price, volume: Size, fee: Decimal, rate: Decimal) -> Decimal {
        if volume > self.size {
            warn!(
                pair = %self.pair,
                position = %self.size,
                requested = %volume,
                "sell exceeds tracked position, clamping at zero"
            );
        }
        let pnl_quote = (price.inner() - self.avg_entry_price.inner()) * volume.inner();
        let pnl = pnl_quote * rate - fee;
        self.realized_pnl += pnl;
        self.fees_paid += fee;
        let remaining = self.size.inner() - volume.inner();
        self.size = Size::new(remaining.max(Decimal::ZERO));
        pnl
    }

    /// Cost basis of the current holding, in quote currency.
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.avg_entry_price.inner() * self.size.inner()
    }

    /// Unrealized PnL at `current_price`, in quote currency.
    #[must_use]
    pub fn unrealized_pnl(&self, current_price: Price) -> Decimal {
        (current_price.inner() - self.avg_entry_price.inner()) * self.size.inner()
    }

    /// Current value at `current_price`, in quote currency.
    #[must_use]
    pub fn current_value(&self, current_price: Price) -> Decimal {
        current_price.inner() * self.size.inner()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.size.is_positive()
    }
}

/// Balance of one asset.
///
/// Always rebuilt wholesale from the exchange's balance snapshot, never
/// incrementally patched by trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub reserved: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_usd() -> Pair {
        Pair::new("BTC", "USD")
    }

    #[test]
    fn test_wac_round_trip() {
        // Buy 1.0 @ 50_000 (fee 0), sell 0.5 @ 60_000 (fee 10):
        // avg entry stays 50_000, realized = (60000-50000)*0.5 - 10 = 4990.
        let mut pos = SpotPosition::new(btc_usd());
        pos.apply_buy(Price::new(dec!(50000)), Size::new(dec!(1.0)), dec!(0));
        assert_eq!(pos.avg_entry_price, Price::new(dec!(50000)));

        let pnl = pos.apply_sell(
            Price::new(dec!(60000)),
            Size::new(dec!(0.5)),
            dec!(10),
            dec!(1),
        );
        assert_eq!(pnl, dec!(4990.0));
        assert_eq!(pos.avg_entry_price, Price::new(dec!(50000)));
        assert_eq!(pos.size, Size::new(dec!(0.5)));
        assert_eq!(pos.realized_pnl, dec!(4990.0));
    }

    #[test]
    fn test_wac_blends_on_buy() {
        let mut pos = SpotPosition::new(btc_usd());
        pos.apply_buy(Price::new(dec!(100)), Size::new(dec!(1)), dec!(0));
        pos.apply_buy(Price::new(dec!(200)), Size::new(dec!(1)), dec!(0));
        assert_eq!(pos.avg_entry_price, Price::new(dec!(150)));
        assert_eq!(pos.size, Size::new(dec!(2)));
    }

    #[test]
    fn test_sell_does_not_move_entry() {
        let mut pos = SpotPosition::new(btc_usd());
        pos.apply_buy(Price::new(dec!(100)), Size::new(dec!(2)), dec!(0));
        pos.apply_sell(Price::new(dec!(90)), Size::new(dec!(1)), dec!(0), dec!(1));
        assert_eq!(pos.avg_entry_price, Price::new(dec!(100)));
        assert_eq!(pos.realized_pnl, dec!(-10));
    }

    #[test]
    fn test_oversell_clamps_at_zero() {
        let mut pos = SpotPosition::new(btc_usd());
        pos.apply_buy(Price::new(dec!(100)), Size::new(dec!(1)), dec!(0));
        pos.apply_sell(Price::new(dec!(110)), Size::new(dec!(1.5)), dec!(0), dec!(1));
        assert_eq!(pos.size, Size::ZERO);
        assert!(!pos.is_open());
    }

    #[test]
    fn test_quote_rate_conversion() {
        let mut pos = SpotPosition::new(Pair::new("BTC", "EUR"));
        pos.apply_buy(Price::new(dec!(100)), Size::new(dec!(1)), dec!(0));
        // 10 EUR gain at 1.10 EUR->USD, minus 1 USD fee.
        let pnl = pos.apply_sell(Price::new(dec!(110)), Size::new(dec!(1)), dec!(1), dec!(1.10));
        assert_eq!(pnl, dec!(10.0));
    }
}
