//! block-manager: run the two-phase block protocol once and print the final stack.
//!
//! # Usage
//!
//! ```bash
//! block-manager
//! block-manager --order descending --jitter-seed 42 --jitter-max-us 500
//! RUST_LOG=debug block-manager --json
//! ```
//!
//! Progress is logged to stderr; the final report goes to stdout.
//! Exits with status 1 if any worker faults.

use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use pb_core::TurnOrder;
use pb_manager::{BlockManager, ManagerConfig, Phase1Jitter};

/// Default upper bound on the seeded phase-1 delay (microseconds).
const JITTER_MAX_US_DEFAULT: u64 = 1_000;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Ascending,
    Descending,
}

impl From<OrderArg> for TurnOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Ascending => TurnOrder::Ascending,
            OrderArg::Descending => TurnOrder::Descending,
        }
    }
}

/// Run the Acquirer/Releaser/Observer population against the shared stack.
#[derive(Parser, Debug)]
#[command(name = "block-manager")]
#[command(about = "Two-phase block manager over a semaphore-guarded stack")]
struct Cli {
    /// Order in which workers take their phase-2 turns.
    #[arg(long, value_enum, default_value = "ascending")]
    order: OrderArg,

    /// Seed for random phase-1 delays (no delays if not set).
    #[arg(long)]
    jitter_seed: Option<u64>,

    /// Longest phase-1 delay in microseconds.
    #[arg(long, default_value_t = JITTER_MAX_US_DEFAULT)]
    jitter_max_us: u64,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = ManagerConfig {
        turn_order: cli.order.into(),
        phase1_jitter: cli.jitter_seed.map(|seed| Phase1Jitter {
            seed,
            max_delay: Duration::from_micros(cli.jitter_max_us),
        }),
        ..ManagerConfig::default()
    };

    let manager = match BlockManager::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let report = match manager.run() {
        Ok(r) => r,
        Err(e) if e.is_fault() => {
            eprintln!("Fault: {e}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to encode report: {e}");
                process::exit(1);
            }
        }
    } else {
        print!("{report}");
    }
}
