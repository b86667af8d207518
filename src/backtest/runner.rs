use crate::backtest::metrics::{BacktestMetrics, TradeRecord};
use crate::backtest::synthetic::PriceTick;
use crate::execution::{EntryReason, PositionManager, RandomSource, StdRandom, Transition};
use crate::indicators::momentum_index;
use crate::market::PriceWindow;
use crate::Result;
use chrono::{DateTime, Utc};

struct OpenTrade {
    entry_time: DateTime<Utc>,
    entry_reason: EntryReason,
    entry_fee: f64,
}

/// Replays a price series through the live decision path
///
/// Each tick goes through the same price window, momentum index and
/// position manager the streaming session uses, with trading armed from
/// the first tick.
pub struct BacktestRunner {
    initial_balance: f64,
    seed: u64,
}

impl BacktestRunner {
    pub fn new(initial_balance: f64, seed: u64) -> Self {
        Self {
            initial_balance,
            seed,
        }
    }

    /// Run with a seeded random source
    pub fn run(&self, ticks: &[PriceTick]) -> Result<BacktestMetrics> {
        self.run_with(ticks, Box::new(StdRandom::seeded(self.seed)))
    }

    /// Run with an explicit random source
    pub fn run_with(
        &self,
        ticks: &[PriceTick],
        random: Box<dyn RandomSource>,
    ) -> Result<BacktestMetrics> {
        let last_price = match ticks.last() {
            Some(tick) => tick.price,
            None => return Err("Not enough ticks for replay: got 0".into()),
        };

        tracing::info!(ticks = ticks.len(), seed = self.seed, "Starting replay");

        let mut window = PriceWindow::new();
        let mut manager = PositionManager::new(self.initial_balance, random);
        manager.set_armed(true);

        let mut trades = Vec::new();
        let mut open: Option<OpenTrade> = None;

        for tick in ticks {
            window.push(tick.price);
            let indicator = momentum_index(&window);

            match manager.on_price(tick.price, indicator) {
                Some(Transition::Bought { fee, reason, .. }) => {
                    open = Some(OpenTrade {
                        entry_time: tick.timestamp,
                        entry_reason: reason,
                        entry_fee: fee,
                    });
                }
                Some(Transition::Sold {
                    price,
                    holdings,
                    entry_price,
                    fee,
                    realized_pnl,
                    reason,
                    ..
                }) => {
                    let Some(entry) = open.take() else {
                        tracing::warn!("Sell without a recorded entry, skipping");
                        continue;
                    };

                    tracing::debug!(
                        entry_price = %entry_price,
                        exit_price = %price,
                        realized_pnl = %realized_pnl,
                        "Round trip closed"
                    );

                    trades.push(TradeRecord {
                        entry_time: entry.entry_time,
                        exit_time: tick.timestamp,
                        entry_price,
                        exit_price: price,
                        holdings,
                        entry_reason: entry.entry_reason,
                        exit_reason: reason,
                        realized_pnl,
                        entry_fee: entry.entry_fee,
                        fees: entry.entry_fee + fee,
                        holding_period_secs: (tick.timestamp - entry.entry_time).num_seconds(),
                    });
                }
                None => {}
            }
        }

        let wallet = manager.wallet(Some(last_price));
        let metrics = BacktestMetrics::from_trades(
            trades,
            self.initial_balance,
            wallet.balance,
            wallet.equity,
            manager.position().is_long(),
        );

        tracing::info!(
            trades = metrics.total_trades,
            return_pct = %format!("{:.3}", metrics.total_return_pct),
            "Replay complete"
        );

        Ok(metrics)
    }

    /// Run and print the report
    pub fn run_and_report(&self, ticks: &[PriceTick], scenario_name: &str) -> Result<BacktestMetrics> {
        println!("\nReplaying: {}", scenario_name);
        println!("   Ticks: {}", ticks.len());
        println!("   Initial Balance: {:.0}", self.initial_balance);

        let metrics = self.run(ticks)?;
        metrics.print_report();

        Ok(metrics)
    }
}
