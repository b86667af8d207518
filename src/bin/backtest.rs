use clap::Parser;
use tickpilot::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticPriceGenerator};
use tickpilot::execution::DEFAULT_INITIAL_BALANCE;
use tickpilot::Result;

#[derive(Parser, Debug)]
#[command(name = "backtest", about = "Replay synthetic markets through the auto-trader")]
struct Args {
    /// Ticks per scenario
    #[arg(long, default_value_t = 2_000)]
    ticks: usize,

    /// Seed for both price generation and trading draws
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting quote balance
    #[arg(long, default_value_t = DEFAULT_INITIAL_BALANCE)]
    balance: f64,

    /// Print the full report for every scenario
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tickpilot=info")
        .init();

    let args = Args::parse();

    println!("\n=== TICKPILOT REPLAY SUITE ===");

    let runner = BacktestRunner::new(args.balance, args.seed);
    let mut all_metrics = Vec::new();

    for scenario in MarketScenario::ALL {
        let ticks = SyntheticPriceGenerator::new(args.seed).generate(scenario, args.ticks, 1);

        let result = if args.verbose {
            runner.run_and_report(&ticks, scenario.label())
        } else {
            runner.run(&ticks)
        };

        match result {
            Ok(metrics) => all_metrics.push((scenario.label(), metrics)),
            Err(e) => eprintln!("Replay failed for {}: {}", scenario.label(), e),
        }
    }

    print_summary_comparison(&all_metrics);

    Ok(())
}

fn print_summary_comparison(results: &[(&str, BacktestMetrics)]) {
    println!("\n=== SCENARIO COMPARISON ===\n");

    println!(
        "{:<14} {:>16} {:>10} {:>8} {:>8} {:>12}",
        "Scenario", "Final equity", "Return%", "Trades", "Win%", "TP/SL/RND"
    );
    println!("{}", "-".repeat(74));

    for (name, metrics) in results {
        println!(
            "{:<14} {:>16.0} {:>10.3} {:>8} {:>8.1} {:>12}",
            name,
            metrics.final_equity,
            metrics.total_return_pct,
            metrics.total_trades,
            metrics.win_rate,
            format!(
                "{}/{}/{}",
                metrics.take_profit_exits, metrics.stop_loss_exits, metrics.random_exits
            )
        );
    }

    if let Some((best_name, best)) = results
        .iter()
        .max_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!("\nBest scenario:  {} ({:+.3}%)", best_name, best.total_return_pct);
    }

    if let Some((worst_name, worst)) = results
        .iter()
        .min_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!("Worst scenario: {} ({:+.3}%)", worst_name, worst.total_return_pct);
    }

    let total_trades: usize = results.iter().map(|(_, m)| m.total_trades).sum();
    let total_fees: f64 = results.iter().map(|(_, m)| m.total_fees).sum();
    println!("\nTotal round trips: {}", total_trades);
    println!("Total fees paid:   {:.0}\n", total_fees);
}
