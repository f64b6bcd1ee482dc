//! tricks CLI - binary entry point.
//!
//! ```text
//! tricks range <START> <COUNT> [--format TEMPLATE | --json]
//! tricks fetch <URL> [--timeout-ms MS] [--abort-on-timeout] [--body]
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Invalid input or the operation itself failed |
//! | 2 | The fetch timed out |
//!
//! Timeouts get their own code so a wrapping retry loop can tell them apart
//! from hard failures.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serializer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tricks_config::{FETCH_TIMEOUT_ENV, FetchSettings, TricksConfig};
use tricks_race::{
    FetchError, FetchRequest, LoserPolicy, RaceError, build_client, fetch_with_timeout,
};
use tricks_types::RangeSpec;

const FAILURE_EXIT_STATUS: u8 = 1;
const TIMEOUT_EXIT_STATUS: u8 = 2;

#[derive(Parser)]
#[command(name = "tricks")]
#[command(about = "Lazy integer ranges and fetches raced against a timeout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print COUNT consecutive integers starting at START
    Range {
        #[arg(allow_negative_numbers = true)]
        start: i64,
        #[arg(allow_negative_numbers = true)]
        count: i64,
        /// Line template; `{}` is replaced by each value
        #[arg(long, default_value = "{}")]
        format: String,
        /// Print a single JSON array instead of one line per value
        #[arg(long, conflicts_with = "format")]
        json: bool,
    },
    /// GET a URL, giving up if it does not complete within the timeout
    Fetch {
        url: String,
        /// Timeout in milliseconds (default: config, then 3000)
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Abort the request when the timer wins instead of leaving it in flight
        #[arg(long)]
        abort_on_timeout: bool,
        /// Print the response body after the status line
        #[arg(long)]
        body: bool,
    },
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries program output; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_err) = match TricksConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (TricksConfig::default(), Some(err)),
    };
    init_tracing(config.log_filter());
    if let Some(err) = config_err {
        tracing::warn!(path = %err.path().display(), "Using default config: {err}");
    }

    let result = match cli.command {
        Commands::Range {
            start,
            count,
            format,
            json,
        } => run_range(start, count, &format, json),
        Commands::Fetch {
            url,
            timeout_ms,
            abort_on_timeout,
            body,
        } => {
            let options = FetchOptions {
                timeout_ms,
                abort_on_timeout,
                print_body: body,
            };
            run_fetch(&url, &options, &config).await
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_range(start: i64, count: i64, format: &str, json: bool) -> Result<ExitCode> {
    let spec = match RangeSpec::new(start, count) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("invalid range: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut out = io::stdout().lock();
    let written = if json {
        write_json(&mut out, spec)
    } else {
        write_lines(&mut out, spec, format)
    };

    match written {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // `tricks range 0 1000000 | head` closes the pipe early.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(ExitCode::SUCCESS),
        Err(err) => Err(err).context("writing range output"),
    }
}

fn write_lines(out: &mut impl Write, spec: RangeSpec, template: &str) -> io::Result<()> {
    for value in spec {
        writeln!(out, "{}", render(template, value))?;
    }
    out.flush()
}

/// Stream `spec` as one JSON array without materializing it.
fn write_json(out: &mut impl Write, spec: RangeSpec) -> io::Result<()> {
    let mut ser = serde_json::Serializer::new(&mut *out);
    ser.collect_seq(spec).map_err(io::Error::from)?;
    writeln!(out)?;
    out.flush()
}

fn render(template: &str, value: i64) -> String {
    template.replace("{}", &value.to_string())
}

struct FetchOptions {
    timeout_ms: Option<u64>,
    abort_on_timeout: bool,
    print_body: bool,
}

/// Apply command-line overrides on top of env and config settings.
fn resolve_fetch_settings(
    config: &TricksConfig,
    env_timeout: Option<&str>,
    options: &FetchOptions,
) -> FetchSettings {
    let mut settings = config.fetch_settings(env_timeout);
    if let Some(ms) = options.timeout_ms {
        settings.timeout = Duration::from_millis(ms);
    }
    if options.abort_on_timeout {
        settings.on_timeout = LoserPolicy::Abort;
    }
    settings
}

async fn run_fetch(url: &str, options: &FetchOptions, config: &TricksConfig) -> Result<ExitCode> {
    let env_timeout = std::env::var(FETCH_TIMEOUT_ENV).ok();
    let settings = resolve_fetch_settings(config, env_timeout.as_deref(), options);

    let request = match FetchRequest::new(url) {
        Ok(request) => request.with_timeout(settings.timeout),
        Err(err) => {
            eprintln!("request error: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = build_client(&settings.user_agent, settings.use_system_proxy)
        .context("building HTTP client")?;

    match fetch_with_timeout(&client, request, settings.on_timeout).await {
        Ok(response) => {
            println!(
                "successful response {} {}",
                response.status, response.final_url
            );
            if options.print_body {
                println!("{}", response.body);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("request error: {err}");
            Ok(ExitCode::from(exit_status_for(&err)))
        }
    }
}

fn exit_status_for(err: &RaceError<FetchError>) -> u8 {
    if err.is_timeout() {
        TIMEOUT_EXIT_STATUS
    } else {
        FAILURE_EXIT_STATUS
    }
}
