use clap::Parser;
use std::sync::Arc;
use tickpilot::config::Settings;
use tickpilot::execution::StdRandom;
use tickpilot::feed::WsConnector;
use tickpilot::session::{SessionHandle, SessionSnapshot, TradingSession};
use tickpilot::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

const STATUS_INTERVAL_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "tickpilot", about = "Live market monitor with a simulated auto-trader")]
struct Cli {
    /// Market to stream, e.g. KRW-BTC
    #[arg(long)]
    symbol: Option<String>,

    /// Start with auto-trading armed
    #[arg(long)]
    armed: bool,

    /// Settings file (TOML, extension optional)
    #[arg(long)]
    config: Option<String>,
}

// ============================================================================
// Operator Commands
// ============================================================================

#[derive(Debug, PartialEq)]
enum Command {
    Arm,
    Disarm,
    Toggle,
    Switch(String),
    Status,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()?.to_ascii_lowercase().as_str() {
        "arm" | "start" => Command::Arm,
        "disarm" | "stop" => Command::Disarm,
        "toggle" => Command::Toggle,
        "switch" => Command::Switch(parts.next()?.to_string()),
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(symbol) = cli.symbol {
        settings.symbol = symbol;
        settings.validate()?;
    }

    setup_logging(&settings.log_filter);

    tracing::info!("🚀 tickpilot starting");
    tracing::info!("  Market: {}", settings.symbol);
    tracing::info!("  Feed: {}", settings.feed_url);
    tracing::info!("  Initial Balance: {:.0}", settings.initial_balance);
    tracing::info!(
        "  Coin Metadata: {}",
        if settings.metadata_enabled { "on" } else { "off" }
    );

    let session = TradingSession::from_settings(
        &settings,
        Arc::new(WsConnector),
        Box::new(StdRandom::from_entropy()),
    )?;
    let handle = session.start().await;

    if cli.armed {
        handle.set_armed(true).await?;
    }

    tracing::info!("Commands: arm | disarm | toggle | switch <MARKET> | status | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status_ticker = interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = status_ticker.tick() => log_status(&handle.snapshot()),
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&handle, &line).await {
                        break;
                    }
                }
                // stdin closed: keep streaming until Ctrl+C
                Ok(None) => {
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    let final_snapshot = handle.snapshot();
    handle.stop().await?;
    print_status(&final_snapshot);

    tracing::info!("👋 tickpilot stopped");
    Ok(())
}

/// Apply one operator line. Returns false when the operator asked to quit.
async fn handle_line(handle: &SessionHandle, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    let Some(command) = parse_command(line) else {
        println!("Unknown command: {}", line.trim());
        return true;
    };

    let result = match command {
        Command::Arm => handle.set_armed(true).await.map(report_armed),
        Command::Disarm => handle.set_armed(false).await.map(report_armed),
        Command::Toggle => handle.toggle_armed().await.map(report_armed),
        Command::Switch(code) => handle.switch_symbol(&code).await,
        Command::Status => {
            print_status(&handle.snapshot());
            Ok(())
        }
        Command::Quit => return false,
    };

    if let Err(e) = result {
        tracing::warn!("Command failed: {}", e);
    }
    true
}

fn report_armed(armed: bool) {
    println!("Auto-trading {}", if armed { "ARMED" } else { "DISARMED" });
}

fn setup_logging(filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn log_status(snapshot: &SessionSnapshot) {
    tracing::info!(
        symbol = %snapshot.symbol,
        connection = ?snapshot.connection,
        price = ?snapshot.last_price(),
        rsi = %format!("{:.2}", snapshot.indicator),
        armed = snapshot.armed,
        long = snapshot.position.is_long(),
        equity = %format!("{:.0}", snapshot.wallet.equity),
        "Session status"
    );
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("\n=== {} ({:?}) ===", snapshot.symbol, snapshot.connection);

    match &snapshot.ticker {
        Some(ticker) => println!(
            "  Price:     {:.2} ({:+.2}%, {:?})  H {:.2} / L {:.2}  Vol24h {:.2}",
            ticker.price,
            ticker.percent_change,
            ticker.direction,
            ticker.high,
            ticker.low,
            ticker.volume_24h
        ),
        None => println!("  Price:     waiting for data"),
    }

    if let Some(book) = &snapshot.order_book {
        println!(
            "  Book:      bid {:.1}% / ask {:.1}%",
            book.bid_ratio(),
            book.ask_ratio()
        );
    }
    if let Some(trade) = snapshot.trades.first() {
        println!(
            "  Last Fill: {:?} {:.4} @ {:.2}",
            trade.side, trade.size, trade.price
        );
    }

    println!(
        "  RSI(14):   {:.2} ({} / 14 samples)",
        snapshot.indicator, snapshot.window_len
    );
    println!(
        "  Trading:   {}  position {}",
        if snapshot.armed { "ARMED" } else { "idle" },
        match snapshot.position.entry_price() {
            Some(entry) => format!("LONG {:.6} @ {:.2}", snapshot.position.holdings(), entry),
            None => "FLAT".to_string(),
        }
    );
    println!(
        "  Wallet:    balance {:.0}  equity {:.0}  PnL {:+.0} ({:+.3}%)",
        snapshot.wallet.balance,
        snapshot.wallet.equity,
        snapshot.wallet.realized_pnl,
        snapshot.wallet.pnl_pct
    );
    if let Some(image) = &snapshot.coin_image {
        println!("  Logo:      {}", image);
    }

    for entry in snapshot.trade_log.iter().rev().take(5) {
        println!(
            "  [{}] {:?}: {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.kind,
            entry.message
        );
    }
    println!();
}
