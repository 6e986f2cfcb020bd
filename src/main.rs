use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covgate::cli::{cmd_check, cmd_decode, cmd_tree, Style};
use covgate::config::{AdapterConfig, GateConfig, ThresholdConfig};

/// covgate: merge code coverage reports and gate the build on thresholds.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug, -vvv trace). RUST_LOG
    /// takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and merge reports, evaluate thresholds, exit 1 if the gate fails.
    Check {
        /// JSON gate configuration. Flags below add to it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report to include, as PATH or FORMAT=PATH (java, cobertura, lcov, auto).
        #[arg(long = "report", value_name = "REPORT")]
        reports: Vec<AdapterConfig>,

        /// Threshold as KIND:UNHEALTHY:UNSTABLE, e.g. line:40:60.
        #[arg(long = "threshold", value_name = "THRESHOLD")]
        thresholds: Vec<ThresholdConfig>,

        #[arg(long)]
        fail_unhealthy: bool,

        #[arg(long)]
        fail_unstable: bool,

        /// Fail when there is no coverage data to evaluate.
        #[arg(long)]
        fail_no_reports: bool,

        /// Skip reports that fail to parse instead of aborting.
        #[arg(long)]
        skip_malformed: bool,

        #[arg(long, value_enum, default_value_t = Style::Text)]
        style: Style,

        /// Levels of the coverage tree to include in the output.
        #[arg(long, default_value_t = 0)]
        depth: usize,
    },

    /// Print the merged coverage tree of one or more reports.
    Tree {
        /// Report to include, as PATH or FORMAT=PATH.
        #[arg(required = true)]
        reports: Vec<AdapterConfig>,

        #[arg(long, default_value_t = 4)]
        depth: usize,

        #[arg(long)]
        skip_malformed: bool,
    },

    /// Decode a JVM method descriptor into a readable signature.
    Decode {
        /// Method name, e.g. "run".
        name: String,

        /// Descriptor, e.g. "(ILjava/lang/String;)V".
        signature: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Check {
            config,
            reports,
            thresholds,
            fail_unhealthy,
            fail_unstable,
            fail_no_reports,
            skip_malformed,
            style,
            depth,
        } => {
            let mut gate = match config {
                Some(path) => GateConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => GateConfig::default(),
            };
            gate.adapters.extend(reports);
            gate.thresholds.extend(thresholds);
            gate.fail_unhealthy |= fail_unhealthy;
            gate.fail_unstable |= fail_unstable;
            gate.fail_no_reports |= fail_no_reports;
            gate.skip_malformed |= skip_malformed;

            let out = cmd_check(&gate, style, depth)?;
            print!("{}", out.text);
            Ok(i32::from(out.failed))
        }
        Commands::Tree {
            reports,
            depth,
            skip_malformed,
        } => {
            print!("{}", cmd_tree(&reports, depth, skip_malformed)?);
            Ok(0)
        }
        Commands::Decode { name, signature } => {
            print!("{}", cmd_decode(&name, &signature));
            Ok(0)
        }
    }
}
