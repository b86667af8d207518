// Simulated execution: position state machine and its ledger
pub mod ledger;
pub mod position_manager;
pub mod random;

pub use ledger::{Ledger, WalletSnapshot, DEFAULT_INITIAL_BALANCE};
pub use position_manager::{EntryReason, ExitReason, Position, PositionManager, Transition};
pub use random::{RandomSource, ScriptedRandom, StdRandom};
