//! ff-supervisor - run ffmpeg jobs with live progress.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ff_supervisor::config::{ConfigLoader, FfConfig};
use ff_supervisor::display;
use ff_supervisor::job::{presets, FfRunner, ProgressTransport, RunError, RunOptions};
use ff_supervisor::probe::Summary;

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Pipe,
    Listener,
}

impl From<TransportArg> for ProgressTransport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Pipe => ProgressTransport::Pipe,
            TransportArg::Listener => ProgressTransport::Listener,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "ff-supervisor",
    about = "Supervised ffmpeg jobs with live progress",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe an input with ffprobe.
    Probe {
        /// Input path or URL.
        input: String,
        /// Print the raw ffprobe JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Run ffmpeg on an input, reporting progress.
    Run {
        /// Input path or URL.
        input: String,
        /// Output path.
        output: String,
        /// Output argument preset, used when no arguments follow `--`.
        #[arg(long, default_value = "default")]
        preset: String,
        /// Progress transport. Defaults to the configured one.
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,
        /// Cancel the job after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
        /// Argument placed before the input (repeatable).
        #[arg(long = "input-arg", allow_hyphen_values = true)]
        input_args: Vec<String>,
        /// Output arguments, overriding the preset.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List output argument presets.
    Presets,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Cancel `cancel` on Ctrl-C or once `timeout` elapsed.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling job");
            token.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    tracing::info!(timeout_secs = timeout.as_secs(), "Timeout reached, cancelling job");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        });
    }
}

fn exit_code(err: &RunError) -> ExitCode {
    if err.is_invalid_input() {
        ExitCode::from(EXIT_INVALID_INPUT)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}

async fn probe(config: &FfConfig, input: &str, json: bool) -> Result<(), RunError> {
    let runner = FfRunner::new(config);
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, None);

    let probe = runner
        .probe(input, &cancel)
        .await
        .map_err(RunError::Probe)?;

    if json {
        println!("{}", String::from_utf8_lossy(&probe.raw));
    } else {
        let summary = Summary::from_probe(&probe).map_err(RunError::Summary)?;
        display::print_summary(input, &summary);
    }
    Ok(())
}

fn resolve_args(preset: &str, args: Vec<String>) -> Option<Vec<String>> {
    if !args.is_empty() {
        return Some(args);
    }
    presets::find(preset).map(|preset| preset.args)
}

fn print_presets() {
    for preset in presets::all() {
        println!("{:<10} {}", preset.name, preset.args.join(" "));
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let result = match cli.command {
        Commands::Probe { input, json } => probe(&config, &input, json).await,
        Commands::Run {
            input,
            output,
            preset,
            transport,
            timeout,
            input_args,
            args,
        } => {
            let Some(args) = resolve_args(&preset, args) else {
                eprintln!("Error: unknown preset {preset:?}");
                return ExitCode::from(EXIT_FAILURE);
            };

            let runner = FfRunner::new(&config);
            let cancel = CancellationToken::new();
            spawn_cancel_triggers(&cancel, timeout.map(Duration::from_secs));

            let options = RunOptions::new(input, output.clone())
                .args(args)
                .input_args(input_args)
                .progress_period(config.progress_period())
                .transport(transport.map_or(config.transport, Into::into))
                .on_progress(|progress| display::print_progress(&progress));

            runner.run(options, &cancel).await.map(|()| {
                display::print_success(&output);
            })
        }
        Commands::Presets => {
            print_presets();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_failure(&e);
            exit_code(&e)
        }
    }
}
