use clap::Parser;
use sauros::{
    config::Config,
    runtime::{Environment, Interpreter},
    tools::{repl::run_repl, runner::run_file},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sauros")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run sauros scripts, or start an interactive session", long_about = None)]
struct Cli {
    /// Script to run. Starts the REPL when omitted.
    file: Option<PathBuf>,

    /// Directory searched for imports (overrides SAUROS_HOME)
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Additional import search directory
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Log filter directive (overrides SAUROS_LOG)
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let config = Config::from_flags_or_env(cli.home, cli.include, cli.log);

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|err| {
        eprintln!("Ignoring invalid log filter `{}`: {}", config.log_filter, err);
        EnvFilter::new(sauros::config::DEFAULT_LOG_FILTER)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let interp = Interpreter::with_loader(Arc::new(config.loader()));
    let env = Environment::new();

    let status = match cli.file {
        Some(path) => run_file(&interp, &env, &path),
        None => match run_repl(interp, env) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("REPL failed: {err}");
                1
            }
        },
    };
    std::process::exit(status);
}
