use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic tick generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb with noise (+0.05% per tick on average)
    Uptrend,
    /// Steady slide with noise (-0.05% per tick on average)
    Downtrend,
    /// Mean-reverting chop around the starting price
    Sideways,
    /// Large swings (±1% per tick)
    Volatile,
    /// Flat first half, then a sharp sell-off
    FlashCrash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::FlashCrash,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "Uptrend",
            MarketScenario::Downtrend => "Downtrend",
            MarketScenario::Sideways => "Sideways",
            MarketScenario::Volatile => "Volatile",
            MarketScenario::FlashCrash => "Flash crash",
        }
    }
}

/// One synthetic ticker print
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Generates synthetic ticker prints for offline replay
pub struct SyntheticPriceGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticPriceGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self::with_base_price(seed, 100_000.0)
    }

    pub fn with_base_price(seed: u64, base_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price,
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_ticks` prints spaced `interval_secs` apart, ending now
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_ticks: usize,
        interval_secs: i64,
    ) -> Vec<PriceTick> {
        let start_time = Utc::now() - Duration::seconds(num_ticks as i64 * interval_secs);
        let floor = self.base_price * 0.2;

        let mut ticks = Vec::with_capacity(num_ticks);
        let mut price = self.base_price;

        for i in 0..num_ticks {
            price += self.step(scenario, price, i, num_ticks);
            // Keep prices strictly positive
            price = price.max(floor);

            ticks.push(PriceTick {
                timestamp: start_time + Duration::seconds(i as i64 * interval_secs),
                price,
            });
        }

        ticks
    }

    fn step(&mut self, scenario: MarketScenario, price: f64, i: usize, num_ticks: usize) -> f64 {
        match scenario {
            MarketScenario::Uptrend => price * (0.0005 + self.rng.gen_range(-0.001..0.001)),
            MarketScenario::Downtrend => price * (-0.0005 + self.rng.gen_range(-0.001..0.001)),
            MarketScenario::Sideways => {
                // 10% pull back to the mean plus ±0.3% noise
                let reversion = (self.base_price - price) * 0.1;
                reversion + price * self.rng.gen_range(-0.003..0.003)
            }
            MarketScenario::Volatile => price * self.rng.gen_range(-0.01..0.01),
            MarketScenario::FlashCrash => {
                if i < num_ticks / 2 {
                    price * self.rng.gen_range(-0.001..0.001)
                } else {
                    // -30% spread over the second half
                    let drop_rate = -0.3 / (num_ticks as f64 / 2.0);
                    price * (drop_rate + self.rng.gen_range(-0.001..0.001))
                }
            }
        }
    }
}
