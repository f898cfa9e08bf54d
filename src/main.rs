//! elastic-utils
//!
//! Async search and full-result export for Elasticsearch.
//!
//! # Usage
//!
//! ```bash
//! # Submit, poll and fetch an async search
//! elastic-utils submit -i 'logs-*' -f query.json
//! elastic-utils wait <SEARCH_ID>
//! elastic-utils get <SEARCH_ID> -o hits.jsonl
//!
//! # Export every matching document, one week at a time
//! elastic-utils export -i logs -f query.json -o all.jsonl \
//!     --from-date 2025-01-01 --to-date 2025-02-01 --partition-every 7d
//! ```

use tokio_util::sync::CancellationToken;

use elastic_utils::cli::{CliInterface, handlers};
use elastic_utils::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Run the subcommand
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    // Ctrl+C stops the command at the next page or poll boundary
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                cancel_token_clone.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    });

    let result = handlers::run(&cli, cancel_token).await;
    ctrl_c_handle.abort();
    result
}

/// Initialize logging system based on the effective log level
///
/// Logs go to stderr; stdout is reserved for command output.
///
/// # Arguments
/// * `cli` - CLI interface with the effective configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
