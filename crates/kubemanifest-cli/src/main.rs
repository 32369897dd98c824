//! kubemanifest CLI - reconcile single Kubernetes manifests

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use display::OutputFormat;
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "kubemanifest")]
#[command(author = "kubemanifest Contributors")]
#[command(version)]
#[command(about = "Create, update and delete single Kubernetes objects and wait for them", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Wait configuration file (defaults to ~/.config/kubemanifest/config.yaml when present)
    #[arg(long, global = true, env = "KUBEMANIFEST_CONFIG")]
    config: Option<PathBuf>,

    /// Override every wait deadline (e.g. 90s, 10m)
    #[arg(long, global = true, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an object and wait until it is ready; prints its tracking key
    Create {
        /// Manifest file (`-` for stdin)
        file: PathBuf,

        /// Namespace for manifests that name none
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Print the live state of an object
    Read {
        /// Tracking key (namespace::groupVersion::kind::name)
        key: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },

    /// Patch an object from its previous manifest to a new one and wait until it is ready
    Update {
        /// Tracking key (namespace::groupVersion::kind::name)
        key: String,

        /// Manifest file to apply (`-` for stdin)
        file: PathBuf,

        /// Manifest previously applied
        #[arg(long)]
        from: PathBuf,

        /// Namespace for manifests that name none (defaults to the key's)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Delete an object and wait until it is gone
    Delete {
        /// Tracking key (namespace::groupVersion::kind::name)
        key: String,

        /// Delete dependents in the foreground before the object
        #[arg(long)]
        cascade: bool,
    },

    /// Adopt an existing object by tracking key
    Import {
        /// Tracking key (namespace::groupVersion::kind::name)
        key: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },

    /// Show the patch an update would send, without sending it
    Diff {
        /// Tracking key (namespace::groupVersion::kind::name)
        key: String,

        /// Manifest file to compare (`-` for stdin)
        file: PathBuf,

        /// Manifest previously applied
        #[arg(long)]
        from: PathBuf,

        /// Namespace for manifests that name none (defaults to the key's)
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("kubemanifest=debug,kubemanifest_kube=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = util::load_config(cli.config.as_deref(), cli.timeout)?;

    match cli.command {
        Commands::Create { file, namespace } => {
            commands::create::run(&file, namespace.as_deref(), config).await
        }

        Commands::Read { key, output } => commands::read::run(&key, output, config).await,

        Commands::Update {
            key,
            file,
            from,
            namespace,
        } => commands::update::run(&key, &from, &file, namespace.as_deref(), config).await,

        Commands::Delete { key, cascade } => commands::delete::run(&key, cascade, config).await,

        Commands::Import { key, output } => commands::import::run(&key, output, config).await,

        Commands::Diff {
            key,
            file,
            from,
            namespace,
        } => commands::diff::run(&key, &from, &file, namespace.as_deref(), config).await,
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Internal {
            message: format!("failed to build tokio runtime: {e}"),
        })
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
