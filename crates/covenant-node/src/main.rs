//! Local operations CLI: boots a `Platform` against a data directory and
//! runs one of the scripted end-to-end scenarios against it. No network
//! transport — every "device" and "requester" in a scenario is a plain
//! function call against the same process.

use anyhow::Context;
use clap::{Parser, Subcommand};
use covenant_core::CovenantConfig;
use covenant_node::platform::Platform;
use covenant_node::scenario;

#[derive(Parser)]
#[command(name = "covenant-node", about = "Covenant data-sovereignty platform node")]
struct Args {
    /// Directory the embedded store is opened at.
    #[arg(long, default_value = "./data/covenant")]
    data_dir: String,

    /// Skip the startup gate that requires a configured policy signing
    /// key. Intended for local scenario runs only.
    #[arg(long)]
    allow_unconfigured_policy_key: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the store and seed built-in policy rules, then exit.
    Bootstrap,
    /// Print store-level counters (rule count, receipt count).
    Status,
    /// Run the straight-through settlement scenario (S1): screen,
    /// consent, escrow, dispatch a query plan, produce a Time Capsule,
    /// and settle.
    RunStraightThrough,
    /// Run the YC non-transferability scenario (S5): a rejected transfer
    /// still produces an audit receipt.
    RunYcTransferDenied,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = CovenantConfig::default();
    config.data_dir = args.data_dir;
    if args.allow_unconfigured_policy_key {
        config.require_configured_policy_key = false;
    }
    config.require_configured_key().context("policy signing key not configured")?;

    let platform = Platform::open(&config).context("failed to open platform")?;

    match args.command {
        Command::Bootstrap => {
            println!("bootstrap complete: {} policy rules seeded", platform.db.iter_policy_rules()?.len());
        }
        Command::Status => {
            println!("policy rules: {}", platform.db.iter_policy_rules()?.len());
            println!("audit receipts: {}", platform.db.receipt_count());
        }
        Command::RunStraightThrough => {
            let result = scenario::run_straight_through_settlement(&platform)?;
            println!("request:        {}", result.request_id);
            println!("consent:        {}", result.contract_id);
            println!("capsule:        {}", result.capsule_id);
            println!("ds pending:     {}", result.ds_balance_pending);
            println!("yc balance:     {}", result.yc_balance);
            println!("audit receipts: {}", result.audit_receipt_count);
        }
        Command::RunYcTransferDenied => {
            scenario::run_yc_non_transferability(&platform)?;
            println!("transfer correctly rejected and recorded");
        }
    }

    Ok(())
}
