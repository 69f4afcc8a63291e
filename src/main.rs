use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nick_avail::batch::{Batch, RecordState, ResultRecord, RunOutcome, Tally};
use nick_avail::config::Config;
use nick_avail::parse_handles;
use nick_avail::resolve::Resolver;
use nick_avail::transport::Client;

/// Raised by SIGINT; the batch checks it between handles.
static STOP: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(
    name = "nick-avail",
    version,
    about = "Check whether Minecraft handles are available",
    after_help = "Each handle is looked up against the Mojang profile API, falling back \
                  to a chain of HTTP relays when the API is unreachable or rate limited. \
                  Handles are checked one at a time with a pause in between; press \
                  Ctrl-C to stop after the current handle."
)]
struct Cli {
    /// Handles to check (also reads from stdin)
    handles: Vec<String>,

    /// Suppress output, exit code only
    #[arg(short, long)]
    quiet: bool,

    /// Only print available handles
    #[arg(short, long)]
    available_only: bool,

    /// Print a JSON report instead of rows
    #[arg(long, conflicts_with_all = ["quiet", "available_only"])]
    json: bool,

    /// Read settings from a TOML file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pause between handles, in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Per-request timeout, in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Override the identity API base URL
    #[arg(long, value_name = "URL")]
    primary: Option<String>,

    /// Query the identity API only, without relays
    #[arg(long)]
    direct_only: bool,

    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Report<'a> {
    results: Vec<&'a ResultRecord>,
    tally: Tally,
    available: Vec<&'a str>,
    interrupted: bool,
}

fn main() -> ExitCode {
    install_signal_handlers();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut handles: Vec<String> = cli.handles.clone();

    // Read from stdin if not a terminal
    if !io::stdin().is_terminal() {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) => handles.extend(parse_handles(&l)),
                Err(e) => {
                    eprintln!("error: reading stdin: {e}");
                    return ExitCode::from(2);
                }
            }
        }
    }
    handles.retain(|h| !h.trim().is_empty());

    if handles.is_empty() {
        eprintln!("error: no handles provided");
        eprintln!("usage: nick-avail [OPTIONS] [HANDLES...]");
        return ExitCode::from(2);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    debug!(?config, "effective settings");

    let resolver = Resolver::with_transport(Client::with_timeout(config.timeout()), config.chain());
    let mut batch = Batch::new();
    batch.begin(handles.iter().map(|h| h.trim()));

    let print_rows = !cli.quiet && !cli.json;
    let outcome = batch.run(&resolver, &STOP, config.delay(), |record| {
        if !print_rows {
            return;
        }
        if cli.available_only && record.state != RecordState::Available {
            return;
        }
        println!("{}", row(record));
    });
    let interrupted = outcome == RunOutcome::Stopped;
    let tally = batch.tally();

    if cli.json {
        let report = Report {
            results: batch.records().collect(),
            tally,
            available: batch.available_handles(),
            interrupted,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: encoding report: {e}");
                return ExitCode::from(2);
            }
        }
    } else if !cli.quiet {
        eprintln!(
            "{} checked: {} available, {} taken, {} errors",
            tally.total - tally.checking,
            tally.available,
            tally.taken,
            tally.errors
        );
        let available = batch.available_handles();
        if !available.is_empty() {
            eprintln!("available: {}", available.join(", "));
        }
        if interrupted {
            eprintln!("interrupted: {} not checked", tally.checking);
        }
    }

    if interrupted {
        ExitCode::from(130)
    } else if tally.available == tally.total {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn row(record: &ResultRecord) -> String {
    let label = match &record.state {
        RecordState::Checking => "checking".to_string(),
        RecordState::Available => "available".to_string(),
        RecordState::Taken => "taken".to_string(),
        RecordState::Error { message } => format!("error: {message}"),
    };
    format!("{}\t{label}", record.handle)
}

fn load_config(cli: &Cli) -> Result<Config, nick_avail::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(ms) = cli.delay_ms {
        config.delay_ms = ms;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(base) = &cli.primary {
        config.primary.base = base.clone();
    }
    if cli.direct_only {
        config.relays.clear();
    }
    Ok(config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("nick_avail={level}"))),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// SIGINT handler. Only async-signal-safe work happens here: a lock-free
/// atomic store and a `signal(2)` call. No allocation, locking or I/O.
#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    STOP.store(true, std::sync::atomic::Ordering::SeqCst);
    // A second Ctrl-C terminates immediately.
    // SAFETY: `signal` is async-signal-safe and SIG_DFL is a valid disposition.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

#[cfg(unix)]
fn install_signal_handlers() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: called once at startup before any other thread exists. Both
    // dispositions are valid: SIG_DFL, and an `extern "C"` handler with the
    // `sighandler_t` signature that only touches a static atomic.
    unsafe {
        // Exit quietly when stdout is a closed pipe (e.g. `| head`).
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}
