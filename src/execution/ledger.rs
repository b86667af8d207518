use serde::{Deserialize, Serialize};

/// Quote balance every session starts from unless configured otherwise
pub const DEFAULT_INITIAL_BALANCE: f64 = 50_000_000.0;

/// Quote-currency bookkeeping for the simulated account
///
/// Only the position manager's buy and sell transitions move money.
#[derive(Debug, Clone)]
pub struct Ledger {
    initial_balance: f64,
    quote_balance: f64,
}

/// Wallet figures handed to presentation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WalletSnapshot {
    pub balance: f64,
    pub holdings: f64,
    pub holdings_value: f64,
    pub equity: f64,
    pub realized_pnl: f64,
    pub pnl_pct: f64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BALANCE)
    }
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            quote_balance: initial_balance,
        }
    }

    pub fn balance(&self) -> f64 {
        self.quote_balance
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Balance change since the session started
    pub fn realized_pnl(&self) -> f64 {
        self.quote_balance - self.initial_balance
    }

    /// Realized P&L as a percentage of the initial balance
    pub fn pnl_pct(&self) -> f64 {
        if self.initial_balance == 0.0 {
            return 0.0;
        }
        self.realized_pnl() / self.initial_balance * 100.0
    }

    /// Value of `holdings` at `last_price`
    pub fn holdings_value(&self, holdings: f64, last_price: f64) -> f64 {
        holdings * last_price
    }

    /// Cash plus holdings valued at `last_price`
    pub fn equity(&self, holdings: f64, last_price: f64) -> f64 {
        self.quote_balance + self.holdings_value(holdings, last_price)
    }

    pub fn snapshot(&self, holdings: f64, last_price: Option<f64>) -> WalletSnapshot {
        let holdings_value = last_price
            .map(|price| self.holdings_value(holdings, price))
            .unwrap_or(0.0);

        WalletSnapshot {
            balance: self.quote_balance,
            holdings,
            holdings_value,
            equity: self.quote_balance + holdings_value,
            realized_pnl: self.realized_pnl(),
            pnl_pct: self.pnl_pct(),
        }
    }

    pub(crate) fn debit(&mut self, amount: f64) {
        self.quote_balance -= amount;
    }

    pub(crate) fn credit(&mut self, amount: f64) {
        self.quote_balance += amount;
    }
}
