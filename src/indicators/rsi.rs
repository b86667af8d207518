use crate::market::PriceWindow;

/// Number of samples the momentum index looks at
pub const RSI_PERIOD: usize = 14;

/// Value reported while the window is still filling up
pub const NEUTRAL_RSI: f64 = 50.0;

/// Calculate Relative Strength Index (RSI)
///
/// Sums every positive delta between consecutive samples (gains) and every
/// negative delta as an absolute value (losses). A window without losses
/// divides by 1 instead of 0, so a strictly rising window reads
/// `100 - 100 / (1 + gains)` rather than a flat 100.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 35: Oversold (entry trigger)
///
/// Returns `None` when fewer than `period` samples are available.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for pair in prices.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let denominator = if losses == 0.0 { 1.0 } else { losses };
    let rs = gains / denominator;

    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// RSI-14 over the current price window, neutral until the window is full
pub fn momentum_index(window: &PriceWindow) -> f64 {
    calculate_rsi(&window.prices(), RSI_PERIOD).unwrap_or(NEUTRAL_RSI)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC_FIXTURE: [f64; 14] = [
        44.0, 44.25, 44.5, 43.75, 44.5, 44.8, 45.35, 45.1, 44.9, 45.4, 45.7, 45.6, 45.1, 45.4,
    ];

    #[test]
    fn test_rsi_classic_fixture() {
        // gains = 3.2, losses = 1.8
        let rsi = calculate_rsi(&CLASSIC_FIXTURE, RSI_PERIOD).unwrap();
        let expected = 100.0 - 100.0 / (1.0 + 3.2 / 1.8);

        assert!((rsi - expected).abs() < 1e-9);
        assert!((rsi - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        assert!(calculate_rsi(&prices, RSI_PERIOD).is_none());
    }

    #[test]
    fn test_rsi_all_gains_uses_unit_denominator() {
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64 * 0.1).collect();
        let rsi = calculate_rsi(&prices, RSI_PERIOD).unwrap();

        // gains = 1.3, losses treated as 1
        let expected = 100.0 - 100.0 / 2.3;
        assert!((rsi - expected).abs() < 1e-9);
        assert!(rsi < 100.0);
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices: Vec<f64> = (0..14).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&prices, RSI_PERIOD).unwrap();

        assert_eq!(rsi, 0.0);
    }

    #[test]
    fn test_momentum_index_neutral_until_full() {
        let mut window = PriceWindow::new();
        for price in &CLASSIC_FIXTURE[..13] {
            window.push(*price);
            assert_eq!(momentum_index(&window), NEUTRAL_RSI);
        }

        window.push(CLASSIC_FIXTURE[13]);
        assert!((momentum_index(&window) - 64.0).abs() < 1e-9);
    }
}
