use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::{Ledger, WalletSnapshot};
use super::random::RandomSource;
use crate::models::{TradeLogEntry, TradeLogKind};

/// Momentum index below which a flat book buys
pub const OVERSOLD_THRESHOLD: f64 = 35.0;
/// Draw above which a flat book buys regardless of momentum
pub const RANDOM_ENTRY_THRESHOLD: f64 = 0.98;
/// Draw above which an open position is closed regardless of P&L
pub const RANDOM_EXIT_THRESHOLD: f64 = 0.99;
/// Close once the position is up more than 0.5%
pub const TAKE_PROFIT_RATE: f64 = 0.005;
/// Close once the position is down more than 0.5%
pub const STOP_LOSS_RATE: f64 = -0.005;
/// Share of the balance committed on entry
pub const ALLOCATION_PCT: f64 = 0.99;
/// Fee charged on entry notional and on exit revenue
pub const FEE_RATE: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    Flat,
    Long {
        holdings: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
    },
}

impl Position {
    pub fn is_long(&self) -> bool {
        matches!(self, Position::Long { .. })
    }

    pub fn holdings(&self) -> f64 {
        match self {
            Position::Long { holdings, .. } => *holdings,
            Position::Flat => 0.0,
        }
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            Position::Long { entry_price, .. } => Some(*entry_price),
            Position::Flat => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    Oversold,
    RandomEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    RandomExit,
}

/// Result of a fired buy or sell
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Bought {
        price: f64,
        holdings: f64,
        notional: f64,
        fee: f64,
        reason: EntryReason,
    },
    Sold {
        price: f64,
        holdings: f64,
        entry_price: f64,
        net_revenue: f64,
        fee: f64,
        realized_pnl: f64,
        reason: ExitReason,
    },
}

/// Single-position trading state machine
///
/// Flat -> Long on oversold momentum or a random entry draw; Long -> Flat on
/// take-profit, stop-loss or a random exit draw. Owns the ledger and the
/// trade log; nothing else writes to either.
pub struct PositionManager {
    position: Position,
    ledger: Ledger,
    armed: bool,
    random: Box<dyn RandomSource>,
    trade_log: Vec<TradeLogEntry>,
}

impl PositionManager {
    pub fn new(initial_balance: f64, random: Box<dyn RandomSource>) -> Self {
        Self {
            position: Position::Flat,
            ledger: Ledger::new(initial_balance),
            armed: false,
            random,
            trade_log: Vec::new(),
        }
    }

    /// Evaluate one price update
    ///
    /// Does nothing while disarmed. Otherwise takes exactly one draw from the
    /// random source and fires at most one transition.
    pub fn on_price(&mut self, price: f64, indicator: f64) -> Option<Transition> {
        if !self.armed || !price.is_finite() || price <= 0.0 {
            return None;
        }

        let draw = self.random.next_unit();

        match self.position {
            Position::Flat => {
                let reason = Self::should_enter(indicator, draw)?;
                Some(self.buy(price, reason))
            }
            Position::Long { entry_price, .. } => {
                let reason = Self::should_exit(entry_price, price, draw)?;
                Some(self.sell(price, reason))
            }
        }
    }

    /// Entry rule for a flat book
    pub fn should_enter(indicator: f64, draw: f64) -> Option<EntryReason> {
        if indicator < OVERSOLD_THRESHOLD {
            Some(EntryReason::Oversold)
        } else if draw > RANDOM_ENTRY_THRESHOLD {
            Some(EntryReason::RandomEntry)
        } else {
            None
        }
    }

    /// Exit rule for an open position
    pub fn should_exit(entry_price: f64, price: f64, draw: f64) -> Option<ExitReason> {
        let pnl_rate = (price - entry_price) / entry_price;

        if pnl_rate > TAKE_PROFIT_RATE {
            Some(ExitReason::TakeProfit)
        } else if pnl_rate < STOP_LOSS_RATE {
            Some(ExitReason::StopLoss)
        } else if draw > RANDOM_EXIT_THRESHOLD {
            Some(ExitReason::RandomExit)
        } else {
            None
        }
    }

    fn buy(&mut self, price: f64, reason: EntryReason) -> Transition {
        let notional = self.ledger.balance() * ALLOCATION_PCT;
        let holdings = notional / price;
        let fee = notional * FEE_RATE;

        self.ledger.debit(notional);
        self.ledger.debit(fee);
        self.position = Position::Long {
            holdings,
            entry_price: price,
            entry_time: Utc::now(),
        };

        tracing::info!(
            price = %price,
            holdings = %holdings,
            notional = %notional,
            ?reason,
            "Opened position"
        );
        self.log(
            format!("BUY EXECUTED @ {:.2} ({:?})", price, reason),
            TradeLogKind::Buy,
        );

        Transition::Bought {
            price,
            holdings,
            notional,
            fee,
            reason,
        }
    }

    fn sell(&mut self, price: f64, reason: ExitReason) -> Transition {
        let holdings = self.position.holdings();
        let entry_price = self.position.entry_price().unwrap_or(price);

        let revenue = holdings * price;
        let fee = revenue * FEE_RATE;
        let net_revenue = revenue - fee;
        let realized_pnl = net_revenue - holdings * entry_price;

        self.ledger.credit(net_revenue);
        self.position = Position::Flat;

        tracing::info!(
            price = %price,
            entry_price = %entry_price,
            realized_pnl = %realized_pnl,
            ?reason,
            "Closed position"
        );

        let kind = if realized_pnl > 0.0 {
            TradeLogKind::ProfitSell
        } else {
            TradeLogKind::LossSell
        };
        self.log(
            format!(
                "SELL EXECUTED @ {:.2} (PnL: {:.0}, {:?})",
                price,
                realized_pnl.floor(),
                reason
            ),
            kind,
        );

        Transition::Sold {
            price,
            holdings,
            entry_price,
            net_revenue,
            fee,
            realized_pnl,
            reason,
        }
    }

    /// Arm or disarm the decision loop. Returns true if the flag changed.
    ///
    /// Disarming keeps any open position.
    pub fn set_armed(&mut self, armed: bool) -> bool {
        if self.armed == armed {
            return false;
        }
        self.armed = armed;

        if armed {
            tracing::info!("Auto-trading armed");
            self.log("AUTO-TRADING SYSTEM ACTIVATED", TradeLogKind::System);
        } else {
            tracing::info!(long = self.position.is_long(), "Auto-trading disarmed");
            self.log("SYSTEM HALTED", TradeLogKind::System);
        }
        true
    }

    /// Flip the armed flag, returning the new value
    pub fn toggle_armed(&mut self) -> bool {
        self.set_armed(!self.armed);
        self.armed
    }

    pub fn log_system(&mut self, message: impl Into<String>) {
        self.log(message, TradeLogKind::System);
    }

    fn log(&mut self, message: impl Into<String>, kind: TradeLogKind) {
        self.trade_log.push(TradeLogEntry::new(message, kind));
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn trade_log(&self) -> &[TradeLogEntry] {
        &self.trade_log
    }

    /// Mark-to-market P&L of the open position (before exit fees)
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.position {
            Position::Long {
                holdings,
                entry_price,
                ..
            } => (price - entry_price) * holdings,
            Position::Flat => 0.0,
        }
    }

    pub fn wallet(&self, last_price: Option<f64>) -> WalletSnapshot {
        self.ledger.snapshot(self.position.holdings(), last_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::random::ScriptedRandom;

    const BALANCE: f64 = 50_000_000.0;
    const NEUTRAL: f64 = 50.0;

    fn armed_manager(draws: Vec<f64>) -> PositionManager {
        let mut pm = PositionManager::new(BALANCE, Box::new(ScriptedRandom::new(draws)));
        pm.set_armed(true);
        pm
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_buy_math() {
        let mut pm = armed_manager(vec![]);
        let price = 95_000_000.0;

        let transition = pm.on_price(price, 20.0).unwrap();
        assert!(matches!(
            transition,
            Transition::Bought {
                reason: EntryReason::Oversold,
                ..
            }
        ));

        assert_close(pm.position().holdings(), 0.99 * BALANCE / price);
        assert_eq!(pm.position().entry_price(), Some(price));
        assert_close(
            pm.ledger().balance(),
            BALANCE - 0.99 * BALANCE - 0.0005 * 0.99 * BALANCE,
        );
        assert_eq!(pm.trade_log().last().unwrap().kind, TradeLogKind::Buy);
    }

    #[test]
    fn test_sell_math() {
        let mut pm = armed_manager(vec![]);
        pm.on_price(100.0, 20.0).unwrap();

        let holdings = pm.position().holdings();
        let balance_before = pm.ledger().balance();

        // +1% triggers take profit
        let transition = pm.on_price(101.0, NEUTRAL).unwrap();
        let Transition::Sold {
            realized_pnl,
            reason,
            ..
        } = transition
        else {
            panic!("Expected sell");
        };

        assert_eq!(reason, ExitReason::TakeProfit);
        assert_close(realized_pnl, holdings * 101.0 * 0.9995 - holdings * 100.0);
        assert_close(pm.ledger().balance() - balance_before, holdings * 101.0 * 0.9995);
        assert_eq!(*pm.position(), Position::Flat);
        assert_eq!(pm.trade_log().last().unwrap().kind, TradeLogKind::ProfitSell);
    }

    #[test]
    fn test_stop_loss() {
        let mut pm = armed_manager(vec![]);
        pm.on_price(100.0, 20.0).unwrap();

        assert!(pm.on_price(99.6, NEUTRAL).is_none());

        let transition = pm.on_price(99.4, NEUTRAL).unwrap();
        assert!(matches!(
            transition,
            Transition::Sold {
                reason: ExitReason::StopLoss,
                ..
            }
        ));
        assert_eq!(pm.trade_log().last().unwrap().kind, TradeLogKind::LossSell);
    }

    #[test]
    fn test_hold_inside_band() {
        let mut pm = armed_manager(vec![]);
        pm.on_price(100.0, 20.0).unwrap();

        assert!(pm.on_price(100.4, NEUTRAL).is_none());
        assert!(pm.on_price(99.6, 10.0).is_none());
        assert!(pm.position().is_long());
    }

    #[test]
    fn test_random_entry_threshold_is_strict() {
        // 0.98 does not cross, 0.985 does
        let mut pm = armed_manager(vec![0.98, 0.985]);

        assert!(pm.on_price(100.0, NEUTRAL).is_none());
        let transition = pm.on_price(100.0, NEUTRAL).unwrap();
        assert!(matches!(
            transition,
            Transition::Bought {
                reason: EntryReason::RandomEntry,
                ..
            }
        ));
    }

    #[test]
    fn test_random_exit_classified_by_pnl_sign() {
        // Buy on the first draw, then exit randomly with price barely up
        let mut pm = armed_manager(vec![0.99, 0.995]);
        pm.on_price(100.0, NEUTRAL).unwrap();

        let transition = pm.on_price(100.04, NEUTRAL).unwrap();
        let Transition::Sold {
            realized_pnl,
            reason,
            ..
        } = transition
        else {
            panic!("Expected sell");
        };

        // Fees outweigh the 0.04% move
        assert_eq!(reason, ExitReason::RandomExit);
        assert!(realized_pnl < 0.0);
        assert_eq!(pm.trade_log().last().unwrap().kind, TradeLogKind::LossSell);
    }

    #[test]
    fn test_no_transition_while_disarmed() {
        let mut pm = PositionManager::new(BALANCE, Box::new(ScriptedRandom::new(vec![0.999])));

        assert!(pm.on_price(100.0, 5.0).is_none());
        assert_eq!(*pm.position(), Position::Flat);
        assert_eq!(pm.ledger().balance(), BALANCE);
        assert!(pm.trade_log().is_empty());
    }

    #[test]
    fn test_disarm_keeps_position() {
        let mut pm = armed_manager(vec![]);
        pm.on_price(100.0, 20.0).unwrap();

        assert!(pm.set_armed(false));
        assert!(pm.on_price(150.0, NEUTRAL).is_none());
        assert!(pm.position().is_long());

        // Re-arming resumes exit checks
        assert!(pm.toggle_armed());
        assert!(pm.on_price(150.0, NEUTRAL).is_some());
    }

    #[test]
    fn test_armed_toggle_logs() {
        let mut pm = PositionManager::new(BALANCE, Box::new(ScriptedRandom::quiet()));

        assert!(pm.toggle_armed());
        assert!(!pm.set_armed(true));
        assert!(!pm.toggle_armed());

        let kinds: Vec<TradeLogKind> = pm.trade_log().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TradeLogKind::System, TradeLogKind::System]);
    }

    #[test]
    fn test_ignores_non_positive_price() {
        let mut pm = armed_manager(vec![0.999]);

        assert!(pm.on_price(0.0, 5.0).is_none());
        assert!(pm.on_price(f64::NAN, 5.0).is_none());
        assert!(!pm.position().is_long());
    }

    #[test]
    fn test_unrealized_and_wallet() {
        let mut pm = armed_manager(vec![]);
        pm.on_price(100.0, 20.0).unwrap();
        let holdings = pm.position().holdings();

        assert_close(pm.unrealized_pnl(100.3), holdings * 0.3);

        let wallet = pm.wallet(Some(100.3));
        assert_close(wallet.holdings_value, holdings * 100.3);
        assert_close(wallet.equity, pm.ledger().balance() + holdings * 100.3);
    }
}
