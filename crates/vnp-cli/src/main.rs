use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vnp")]
#[command(about = "Vietnamese equity portfolio allocation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn one weight vector into whole-share counts
    Allocate {
        /// JSON object: ticker -> weight
        #[arg(long)]
        weights: String,

        /// JSON object: ticker -> latest price
        #[arg(long)]
        prices: String,

        /// Capital to invest, in VND
        #[arg(long)]
        budget: f64,

        /// integer | greedy
        #[arg(long, default_value = "integer")]
        allocator: String,

        #[command(flatten)]
        config: commands::ConfigArgs,

        /// Print JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Allocate every strategy in a bundle, then compare and recommend
    Run {
        /// JSON bundle: { "budget"?, "prices"?, "strategies": [...] }
        #[arg(long)]
        input: String,

        /// Overrides the bundle's budget
        #[arg(long)]
        budget: Option<f64>,

        /// Price-history CSV; its last closes replace the bundle's prices
        #[arg(long)]
        history: Option<String>,

        #[command(flatten)]
        config: commands::ConfigArgs,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Backtest target weights over a price history
    Backtest {
        /// Wide CSV: date,<TICKER>,...
        #[arg(long)]
        history: String,

        /// JSON object: ticker -> weight
        #[arg(long)]
        weights: String,

        /// Also allocate this budget at the last close and value the holdings
        #[arg(long)]
        budget: Option<f64>,

        /// integer | greedy (with --budget)
        #[arg(long, default_value = "integer")]
        allocator: String,

        #[command(flatten)]
        config: commands::ConfigArgs,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Allocate {
            weights,
            prices,
            budget,
            allocator,
            config,
            json,
        } => commands::allocate::allocate(commands::allocate::AllocateArgs {
            weights_path: weights,
            prices_path: prices,
            budget,
            allocator,
            config,
            json,
        }),

        Commands::Run {
            input,
            budget,
            history,
            config,
            json,
        } => commands::run::run(commands::run::RunArgs {
            input_path: input,
            budget,
            history_path: history,
            config,
            json,
        }),

        Commands::Backtest {
            history,
            weights,
            budget,
            allocator,
            config,
            json,
        } => commands::backtest::backtest(commands::backtest::BacktestArgs {
            history_path: history,
            weights_path: weights,
            budget,
            allocator,
            config,
            json,
        }),

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = vnp_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
