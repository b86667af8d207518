use crate::execution::{EntryReason, ExitReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of a single round trip for analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub holdings: f64,
    pub entry_reason: EntryReason,
    pub exit_reason: ExitReason,
    /// Net of the exit fee, as booked by the position manager
    pub realized_pnl: f64,
    /// Debited from the balance at entry, outside `realized_pnl`
    pub entry_fee: f64,
    /// Entry plus exit fee
    pub fees: f64,
    pub holding_period_secs: i64,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }

    /// Net move of the quote balance across the round trip
    pub fn balance_change(&self) -> f64 {
        self.realized_pnl - self.entry_fee
    }

    pub fn price_change_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.exit_price - self.entry_price) / self.entry_price * 100.0
    }
}

/// Replay performance summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Balances
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Balance plus any still-open holdings marked at the last price
    pub final_equity: f64,
    pub total_return_pct: f64,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub max_drawdown_pct: f64,

    // Exit Breakdown
    pub take_profit_exits: usize,
    pub stop_loss_exits: usize,
    pub random_exits: usize,

    pub open_at_end: bool,
    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    pub fn from_trades(
        trades: Vec<TradeRecord>,
        initial_balance: f64,
        final_balance: f64,
        final_equity: f64,
        open_at_end: bool,
    ) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_win()).count();
        let losing_trades = total_trades - winning_trades;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let total_return_pct = if initial_balance > 0.0 {
            (final_equity - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        let largest_win = trades
            .iter()
            .map(|t| t.realized_pnl)
            .filter(|pnl| *pnl > 0.0)
            .fold(0.0, f64::max);
        let largest_loss = trades
            .iter()
            .map(|t| t.realized_pnl)
            .filter(|pnl| *pnl <= 0.0)
            .fold(0.0, f64::min);

        let count_exits =
            |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count();

        Self {
            initial_balance,
            final_balance,
            final_equity,
            total_return_pct,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            largest_win,
            largest_loss,
            total_fees: trades.iter().map(|t| t.fees).sum(),
            max_drawdown_pct: Self::calculate_drawdown_pct(&trades, initial_balance),
            take_profit_exits: count_exits(ExitReason::TakeProfit),
            stop_loss_exits: count_exits(ExitReason::StopLoss),
            random_exits: count_exits(ExitReason::RandomExit),
            open_at_end,
            trades,
        }
    }

    /// Largest peak-to-trough fall of the realized balance, in percent
    fn calculate_drawdown_pct(trades: &[TradeRecord], initial_balance: f64) -> f64 {
        let mut peak = initial_balance;
        let mut current = initial_balance;
        let mut max_dd_pct: f64 = 0.0;

        for trade in trades {
            current += trade.balance_change();
            peak = peak.max(current);

            if peak > 0.0 {
                max_dd_pct = max_dd_pct.max((peak - current) / peak * 100.0);
            }
        }

        max_dd_pct
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n=== REPLAY PERFORMANCE REPORT ===\n");

        println!("BALANCE");
        println!("  Initial Balance:       {:.0}", self.initial_balance);
        println!("  Final Balance:         {:.0}", self.final_balance);
        println!(
            "  Final Equity:          {:.0} ({:+.3}%)",
            self.final_equity, self.total_return_pct
        );
        println!("  Fees Paid:             {:.0}", self.total_fees);

        println!("\nTRADES");
        println!("  Round Trips:           {}", self.total_trades);
        println!(
            "  Wins / Losses:         {} / {} ({:.1}% win rate)",
            self.winning_trades, self.losing_trades, self.win_rate
        );

        if self.total_trades > 0 {
            println!("  Largest Win:           {:.0}", self.largest_win);
            println!("  Largest Loss:          {:.0}", self.largest_loss);
            println!("  Max Drawdown:          {:.3}%", self.max_drawdown_pct);
            println!(
                "  Exits (TP / SL / RND): {} / {} / {}",
                self.take_profit_exits, self.stop_loss_exits, self.random_exits
            );
        }

        if self.open_at_end {
            println!("  Position still open at end of replay");
        }
        println!();
    }
}
