//! Command-line interface for elastic-utils
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and precedence (flags > env > file > defaults)
//! - Dispatch to the command handlers
//! - Shell completion generation

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::executor::export::HitsFormat;
use crate::utils::time::parse_duration;

pub mod completion;
pub mod handlers;

/// Elasticsearch async search and full-result export
#[derive(Parser, Debug)]
#[command(
    name = "elastic-utils",
    version,
    about = "Async search and full-result export for Elasticsearch",
    long_about = "Submit, poll, fetch and delete async searches, and export every document
matching a query through point-in-time pagination, even from frozen indices."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Cluster URL (overrides config and ELASTIC_UTILS_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// API key id
    #[arg(long, value_name = "ID", global = true)]
    pub api_key_id: Option<String>,

    /// API key secret
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Quiet mode (errors only, no progress)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Disable progress spinners
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for elastic-utils
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit an async search
    Submit {
        /// Index or alias to search
        #[arg(short = 'i', long)]
        index: String,

        #[command(flatten)]
        query: QueryArgs,

        /// How long the server keeps the search (default from config)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        keep_alive: Option<Duration>,

        /// Server-side wait for early completion; 0s returns immediately
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        wait_for: Option<Duration>,
    },

    /// Show the status of an async search
    Status {
        search_id: String,

        /// Block server-side up to this long for completion
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        wait_for: Option<Duration>,
    },

    /// Poll an async search until it completes
    Wait {
        search_id: String,

        /// Poll interval (default from config)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Give up after this long; the search is left running
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        timeout: Option<Duration>,
    },

    /// Get the results of an async search
    Get {
        search_id: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Delete an async search
    Delete { search_id: String },

    /// Export all matching documents using PIT pagination
    Export(ExportArgs),

    /// Generate shell completion script
    Completion {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// JSON file containing the query; stdin when omitted or `-`
    #[arg(short = 'f', long, value_name = "FILE")]
    pub query_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = HitsFormat::Jsonl)]
    pub format: HitsFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Index or alias to export
    #[arg(short = 'i', long)]
    pub index: String,

    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Results per page (default from config)
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// PIT keep-alive, renewed on every page (default from config)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub keep_alive: Option<Duration>,

    /// Start date, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub from_date: Option<String>,

    /// End date, exclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub to_date: Option<String>,

    /// Split the date range into windows of this length
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub partition_every: Option<Duration>,

    /// Field used for date filters and the default sort
    #[arg(long, value_name = "FIELD")]
    pub timestamp_field: Option<String>,

    /// Run the query as an async search first to warm cold shards
    #[arg(long)]
    pub preflight: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments and environment
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args, |k| std::env::var(k).ok())?;

        Ok(Self { args, config })
    }

    /// Load configuration from file, then layer env and arguments on top
    ///
    /// Validation is left to the commands that need a usable config, so
    /// `config --show` still works on a broken file.
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    /// * `env` - Environment lookup
    ///
    /// # Returns
    /// * `Result<Config>` - Effective configuration or error
    pub fn load_config<F>(args: &CliArgs, env: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env(env)?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Whether progress spinners should be drawn on stderr.
    pub fn progress_enabled(&self) -> bool {
        use std::io::IsTerminal;
        !self.args.no_progress && !self.args.quiet && std::io::stderr().is_terminal()
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_connection_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        if let Some(url) = &args.url {
            config.connection.url = url.clone();
        }
        if let Some(id) = &args.api_key_id {
            config.connection.api_key_id = Some(id.clone());
        }
        if let Some(key) = &args.api_key {
            config.connection.api_key = Some(key.clone());
        }
    }

    /// Get configuration file path (from args or default)
    pub fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }
}
