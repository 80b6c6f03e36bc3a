//! Trading pair identity and per-pair exchange metadata.

use crate::{CoreError, Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading pair, identified by its base and quote assets.
///
/// Format: `{base}/{quote}` (e.g. "BTC/USD"). The canonical string is the
/// primary key for positions, orders, and market-data lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Parse a `BASE/QUOTE` string.
    pub fn parse(s: &str) -> Option<Self> {
        let (base, quote) = s.split_once('/')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self::new(base, quote))
    }

    /// Canonical string representation.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::InvalidPair(s.to_string()))
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Per-pair precision and minimum-size rules from the exchange.
///
/// Orders must be rounded to these precisions before submission; a size
/// below `min_order_size` will be rejected exchange-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMetadata {
    /// Decimal places allowed in prices.
    pub price_decimals: u32,
    /// Decimal places allowed in volumes.
    pub volume_decimals: u32,
    /// Minimum order size in base asset.
    pub min_order_size: Size,
}

impl PairMetadata {
    /// Round a price to the pair's quoted precision.
    pub fn round_price(&self, price: Price) -> Price {
        price.round_dp(self.price_decimals)
    }

    /// Round a size down to the pair's volume precision.
    pub fn round_size(&self, size: Size) -> Size {
        size.round_dp_down(self.volume_decimals)
    }

    /// Whether a rounded size meets the exchange minimum.
    pub fn meets_minimum(&self, size: Size) -> bool {
        size >= self.min_order_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_parse() {
        let pair = Pair::parse("BTC/USD").unwrap();
        assert_eq!(pair.base, "BTC");
        assert_eq!(pair.quote, "USD");
        assert_eq!(pair.symbol(), "BTC/USD");

        assert!(Pair::parse("BTCUSD").is_none());
        assert!(Pair::parse("/USD").is_none());
    }

    #[test]
    fn test_pair_from_str_reports_input() {
        assert_eq!("ETH/USD".parse::<Pair>().unwrap(), Pair::new("ETH", "USD"));
        let err = "ETHUSD".parse::<Pair>().unwrap_err();
        assert!(err.to_string().contains("ETHUSD"));
    }

    #[test]
    fn test_metadata_rounding() {
        let meta = PairMetadata {
            price_decimals: 1,
            volume_decimals: 4,
            min_order_size: Size::new(dec!(0.0001)),
        };
        assert_eq!(
            meta.round_price(Price::new(dec!(50000.26))),
            Price::new(dec!(50000.3))
        );
        // Sizes round toward zero so we never submit more than sized.
        assert_eq!(
            meta.round_size(Size::new(dec!(0.12349))),
            Size::new(dec!(0.1234))
        );
        assert!(meta.meets_minimum(Size::new(dec!(0.0001))));
        assert!(!meta.meets_minimum(Size::new(dec!(0.00009))));
    }
}
