use clap::{ArgAction, Parser, Subcommand};
use mass_sender::application::engine::{CreateJob, DisbursementEngine, EngineConfig};
use mass_sender::domain::accounting::FeePolicy;
use mass_sender::domain::address::Address;
use mass_sender::domain::coins::Coins;
use mass_sender::domain::job::{ActivationReport, JobId};
use mass_sender::domain::ports::JobStoreBox;
use mass_sender::domain::transfer::OutboundAction;
use mass_sender::error::DisbursementError;
use mass_sender::infrastructure::in_memory::InMemoryJobStore;
use mass_sender::interfaces::csv::action_writer::ActionWriter;
use mass_sender::interfaces::transfer_list::read_transfer_file;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Cost of one outbound action, in whole units.
    #[arg(long, global = true, default_value = "0.1")]
    overhead_fee: Decimal,

    /// Charge one fee unit per transfer only, without the per-chunk share.
    #[arg(long, global = true)]
    per_transfer_fees: bool,

    /// Log at debug level instead of info. RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Print the value needed to fund a transfer list
    Quote {
        /// Transfer list: `.csv` rows, a `.json` object or `.txt` lines
        input: PathBuf,
    },
    /// Create a job from a transfer list and run its first step
    Create {
        /// Transfer list: `.csv` rows, a `.json` object or `.txt` lines
        input: PathBuf,
        /// Caller of the creating activation
        #[arg(long)]
        initiator: Address,
        /// Identity allowed to continue the job
        #[arg(long)]
        controller: Option<Address>,
        /// Value attached to the activation, in whole units
        #[arg(long)]
        value: Decimal,
        /// Creation timestamp (unix seconds). Defaults to now.
        #[arg(long)]
        created_at: Option<u64>,
    },
    /// Run the next step of an existing job
    Continue {
        job_id: JobId,
        #[arg(long)]
        caller: Address,
        /// Value attached to the activation, in whole units
        #[arg(long)]
        value: Decimal,
    },
    /// Show the stored state of a job
    Status { job_id: JobId },
}

fn init_logging(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<JobStoreBox> {
    use mass_sender::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening persistent job store");
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(InMemoryJobStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<JobStoreBox> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryJobStore::new()))
}

fn fee_policy(cli: &Cli) -> Result<FeePolicy> {
    let fee = Coins::from_decimal(cli.overhead_fee).into_diagnostic()?;
    Ok(if cli.per_transfer_fees {
        FeePolicy::per_transfer(fee)
    } else {
        FeePolicy::per_chunk(fee)
    })
}

fn now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .into_diagnostic()?
        .as_secs())
}

fn print_report(report: &ActivationReport) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "job: {}", report.job_id).into_diagnostic()?;
    writeln!(out, "finished: {}", report.finished).into_diagnostic()?;
    writeln!(out, "disbursed: {}", report.disbursed).into_diagnostic()?;
    writeln!(out, "fees: {}", report.fees).into_diagnostic()?;
    writeln!(out, "refund: {}", report.refund).into_diagnostic()?;
    writeln!(out, "retained: {}", report.retained).into_diagnostic()?;
    writeln!(out, "remaining: {}", report.remaining_transfers).into_diagnostic()?;
    writeln!(out).into_diagnostic()?;
    ActionWriter::new(&mut out)
        .write_actions(&report.actions)
        .into_diagnostic()?;
    Ok(())
}

/// An aborted activation still owes the attached value back to its caller.
fn bounce(err: DisbursementError, caller: Address) -> miette::Report {
    if let Some(amount) = err.refund().filter(|amount| !amount.is_zero()) {
        warn!(to = %caller, %amount, "returning attached value");
        let refund = OutboundAction::Refund { to: caller, amount };
        if let Err(write_err) = ActionWriter::new(io::stdout().lock()).write_actions([&refund]) {
            warn!(error = %write_err, "failed to write refund action");
        }
    }
    miette::Report::from_err(err)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = EngineConfig {
        fee_policy: fee_policy(&cli)?,
    };
    let store = open_store(cli.db_path.clone())?;
    let engine = DisbursementEngine::new(store, config);

    match cli.command {
        Command::Quote { input } => {
            let transfers = read_transfer_file(&input).into_diagnostic()?;
            let quote = engine.quote(&transfers).into_diagnostic()?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "transfers: {}", quote.transfers).into_diagnostic()?;
            writeln!(out, "steps: {}", quote.steps).into_diagnostic()?;
            writeln!(out, "total_amount: {}", quote.total_amount).into_diagnostic()?;
            writeln!(out, "overhead: {}", quote.overhead).into_diagnostic()?;
            writeln!(out, "total_required: {}", quote.total_required).into_diagnostic()?;
            writeln!(out, "first_step_required: {}", quote.first_step_required)
                .into_diagnostic()?;
        }
        Command::Create {
            input,
            initiator,
            controller,
            value,
            created_at,
        } => {
            let supplied = Coins::from_decimal(value).into_diagnostic()?;
            let transfers = read_transfer_file(&input)
                .map_err(|e| bounce(e.aborting(supplied), initiator))?;
            let created_at = match created_at {
                Some(ts) => ts,
                None => now()?,
            };

            let report = engine
                .create(CreateJob {
                    transfers,
                    controller,
                    initiator,
                    supplied,
                    created_at,
                })
                .await
                .map_err(|e| bounce(e, initiator))?;
            print_report(&report)?;
        }
        Command::Continue {
            job_id,
            caller,
            value,
        } => {
            let supplied = Coins::from_decimal(value).into_diagnostic()?;
            let report = engine
                .continue_job(&job_id, caller, supplied)
                .await
                .map_err(|e| bounce(e, caller))?;
            print_report(&report)?;
        }
        Command::Status { job_id } => {
            let job = engine.job(&job_id).await.into_diagnostic()?;
            let next = job.next_step_required(&engine.config().fee_policy).into_diagnostic()?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "job: {}", job.id).into_diagnostic()?;
            writeln!(out, "finished: {}", job.finished).into_diagnostic()?;
            writeln!(out, "activations: {}", job.activations).into_diagnostic()?;
            writeln!(out, "total_amount: {}", job.total_amount).into_diagnostic()?;
            writeln!(out, "total_required: {}", job.total_required).into_diagnostic()?;
            writeln!(out, "disbursed: {}", job.disbursed_so_far).into_diagnostic()?;
            writeln!(out, "fees: {}", job.fees_charged).into_diagnostic()?;
            writeln!(out, "balance: {}", job.balance).into_diagnostic()?;
            writeln!(out, "remaining: {}", job.pending().transfer_count()).into_diagnostic()?;
            if let Some(required) = next {
                writeln!(out, "next_step_required: {}", required).into_diagnostic()?;
            }
        }
    }

    Ok(())
}
