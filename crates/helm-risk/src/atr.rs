//! Average true range over OHLC bars.

use rust_decimal::Decimal;

use helm_exchange::Candle;

/// ATR over the most recent `lookback` bars, oldest-first input.
///
/// True range per bar is the greatest of high-low, |high - prev close|,
/// |low - prev close|. Returns zero with fewer than two bars; callers
/// treat a zero ATR as "cannot size" rather than dividing by it.
#[must_use]
pub fn average_true_range(candles: &[Candle], lookback: usize) -> Decimal {
    if candles.len() < 2 || lookback == 0 {
        return Decimal::ZERO;
    }

    let start = candles.len().saturating_sub(lookback + 1);
    let window = &candles[start..];

    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for pair in window.windows(2) {
        let prev_close = pair[0].close.inner();
        let bar = &pair[1];
        let hl = bar.high.inner() - bar.low.inner();
        let hc = (bar.high.inner() - prev_close).abs();
        let lc = (bar.low.inner() - prev_close).abs();
        sum += hl.max(hc).max(lc);
        count += 1;
    }

    if count == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helm_core::{Price, Size};
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            start: Utc::now(),
            open: Price::new(close),
            high: Price::new(high),
            low: Price::new(low),
            close: Price::new(close),
            volume: Size::new(dec!(1)),
        }
    }

    #[test]
    fn test_empty_and_single_bar() {
        assert_eq!(average_true_range(&[], 14), dec!(0));
        assert_eq!(
            average_true_range(&[candle(dec!(10), dec!(9), dec!(9.5))], 14),
            dec!(0)
        );
    }

    #[test]
    fn test_simple_ranges() {
        let candles = vec![
            candle(dec!(105), dec!(95), dec!(100)),
            candle(dec!(110), dec!(100), dec!(105)),
            candle(dec!(108), dec!(102), dec!(104)),
        ];
        // TR2 = max(10, |110-100|, |100-100|) = 10
        // TR3 = max(6, |108-105|, |102-105|) = 6
        assert_eq!(average_true_range(&candles, 14), dec!(8));
    }

    #[test]
    fn test_gap_counts_against_prev_close() {
        let candles = vec![
            candle(dec!(100), dec!(99), dec!(100)),
            // Gapped down: range vs prev close dominates high-low.
            candle(dec!(90), dec!(88), dec!(89)),
        ];
        assert_eq!(average_true_range(&candles, 14), dec!(12));
    }
}
