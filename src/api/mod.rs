pub mod coingecko;

pub use coingecko::{coin_id_for, CoinGeckoClient};
