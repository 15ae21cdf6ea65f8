#![forbid(unsafe_code)]

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use build_logging::capture::Verbosity;
use build_logging::core::BuildKind;
use build_logging::replay_cmd::{self, ReplayOptions};

#[derive(Parser, Debug)]
#[command(name = "build-logging")]
#[command(about = "Capture per-build logs from a build event stream and search them", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set BUILD_LOGGING_LOG)
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Evaluation,
    Build,
    DesignTime,
}

impl From<KindArg> for BuildKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Evaluation => BuildKind::Evaluation,
            KindArg::Build => BuildKind::Build,
            KindArg::DesignTime => BuildKind::DesignTimeBuild,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded event stream into per-build logs and list the builds
    Replay {
        /// Path to the recorded event stream (JSONL)
        #[arg(long)]
        events: std::path::PathBuf,
        /// Capture configuration (TOML)
        #[arg(long)]
        config: Option<std::path::PathBuf>,
        /// Kind of unit the stream's start/finish events describe
        #[arg(long, value_enum, default_value_t = KindArg::Evaluation)]
        kind: KindArg,
        /// Sink verbosity (overrides the config file)
        #[arg(long, value_enum)]
        verbosity: Option<Verbosity>,
        /// Search text; every word must match a visible column
        #[arg(long)]
        query: Option<String>,
        /// Comma-separated visible columns (e.g. projectname,status,targets)
        #[arg(long)]
        columns: Option<String>,
        /// Also write the matching rows to this CSV file
        #[arg(long)]
        csv: Option<std::path::PathBuf>,
        /// Leave build logs on disk after listing
        #[arg(long)]
        keep_artifacts: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("BUILD_LOGGING_LOG").unwrap_or_else(|_| {
        if verbose { "build_logging=debug".to_string() } else { "build_logging=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Replay { events, config, kind, verbosity, query, columns, csv, keep_artifacts } => {
            columns
                .as_deref()
                .map(replay_cmd::parse_columns)
                .transpose()
                .and_then(|columns| {
                    let opts = ReplayOptions {
                        events,
                        config,
                        kind: kind.into(),
                        verbosity,
                        query,
                        columns: columns.unwrap_or_default(),
                        csv,
                        keep_artifacts,
                    };
                    replay_cmd::run(&opts, &mut std::io::stdout().lock())
                })
                .map(|summary| {
                    for path in &summary.kept_artifacts {
                        eprintln!("kept {}", path.display());
                    }
                })
        }
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
