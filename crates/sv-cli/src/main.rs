use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sv")]
#[command(about = "Blob container -> bucket sync validator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one validation and print the JSON result. Exits non-zero when fatal.
    Validate {
        #[command(flatten)]
        request: RequestArgs,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Named environment overriding `environment` in config
        #[arg(long)]
        environment: Option<String>,

        /// Skip the alert chain
        #[arg(long, default_value_t = false)]
        no_alert: bool,

        /// Keep the report local; do not upload it to the bucket
        #[arg(long, default_value_t = false)]
        no_upload: bool,
    },

    /// Print the resolved expectations without touching any store
    Resolve {
        #[command(flatten)]
        request: RequestArgs,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overlay ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

/// Request fields shared by `validate` and `resolve`. Flags override the
/// event file.
#[derive(Args, Debug, Default)]
pub struct RequestArgs {
    /// daily | weekly
    #[arg(long)]
    pub mode: Option<String>,

    /// Lookback window in days
    #[arg(long)]
    pub days: Option<u32>,

    /// Prefix template (repeatable); `{YYYYMMDD}` / `{YYYY-MM-DD}` are filled from the date
    #[arg(long = "prefix")]
    pub prefixes: Vec<String>,

    /// Exact object name (repeatable)
    #[arg(long = "expected-file")]
    pub expected_file: Vec<String>,

    /// Comma-separated exact object names
    #[arg(long = "expected-files", value_delimiter = ',')]
    pub expected_files: Vec<String>,

    /// JSON invocation request (same shape as the daemon body)
    #[arg(long = "event")]
    pub event: Option<String>,

    /// Reference date (YYYY-MM-DD), default today UTC
    #[arg(long)]
    pub date: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Validate {
            request,
            config_paths,
            environment,
            no_alert,
            no_upload,
        } => {
            commands::validate::run(commands::validate::ValidateArgs {
                request,
                config_paths,
                environment,
                no_alert,
                no_upload,
            })
            .await?;
        }

        Commands::Resolve {
            request,
            config_paths,
        } => {
            commands::resolve::run(&request, &config_paths)?;
        }

        Commands::ConfigHash { paths } => {
            let loaded = sv_config::load_layered_yaml(paths.as_slice())?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// stdout carries the machine-readable result only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
