mod handlers;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kvstore_core::StoreConfig;

#[derive(Parser)]
#[command(
    name = "kvstore",
    about = "kvstore — inspect and edit key-value coordination stores",
    version
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Backend identifier: "memory" or "sqlite"
    #[arg(long, global = true, default_value = "sqlite", env = "KVSTORE_BACKEND")]
    backend: String,

    /// Backend address (database path for sqlite); comma-separated or repeated
    #[arg(long = "addr", global = true, env = "KVSTORE_ADDR", value_delimiter = ',')]
    addrs: Vec<String>,

    /// Namespace inside the backend
    #[arg(long, global = true, env = "KVSTORE_BUCKET")]
    bucket: Option<String>,

    /// Connection timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Keep the backend connection open between operations
    #[arg(long, global = true)]
    persistent: bool,
}

impl StoreArgs {
    fn to_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new().with_persistent_connection(self.persistent);
        if let Some(bucket) = &self.bucket {
            config = config.with_bucket(bucket.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_connection_timeout(Duration::from_millis(ms));
        }
        config
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Store a value, overwriting any existing one
    Put { key: String, value: String },

    /// Print the pair stored at a key
    Get { key: String },

    /// Report whether a key holds a value
    Exists { key: String },

    /// List every pair under a prefix
    List {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Delete a key regardless of its version
    Delete { key: String },

    /// Create a key, or replace it if it is still at --previous-index
    AtomicPut {
        key: String,
        value: String,
        #[arg(long)]
        previous_index: Option<u64>,
    },

    /// Delete a key only if it is still at --previous-index
    AtomicDelete {
        key: String,
        #[arg(long)]
        previous_index: Option<u64>,
    },

    /// List the registered backends
    Backends,

    /// Print version information
    Version,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("kvstore {}", env!("CARGO_PKG_VERSION"));
            println!("Pluggable key-value coordination store");
            ExitCode::SUCCESS
        }
        Commands::Backends => {
            for backend in kvstore_core::registry::default_registry().backends() {
                println!("{}", backend);
            }
            ExitCode::SUCCESS
        }
        command => {
            let config = cli.store.to_config();
            let opened = kvstore_core::new_store(&cli.store.backend, &cli.store.addrs, Some(&config));
            let store = match opened {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!(
                        backend = %cli.store.backend,
                        error = %e,
                        "Failed to open store"
                    );
                    return ExitCode::FAILURE;
                }
            };

            let result = handlers::execute(store.as_ref(), command);
            store.close();

            let (code, response) = match result {
                Ok(data) => (ExitCode::SUCCESS, handlers::CliResponse::ok(data)),
                Err(e) => {
                    tracing::error!(error = %e, "Operation failed");
                    (ExitCode::FAILURE, handlers::CliResponse::err(&e))
                }
            };

            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!(error = %e, "Failed to render response"),
            }
            code
        }
    }
}
