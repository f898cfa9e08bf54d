//! Command handlers
//!
//! Each handler runs one subcommand against an explicitly constructed
//! [`SearchClient`] and returns the summary text to print. Hits are written
//! by the handlers themselves through the output writers.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::{HttpSearchClient, RetryPolicy, SearchClient};
use crate::config::{Config, MAX_PAGE_SIZE};
use crate::error::{ElasticError, Result};
use crate::executor::export::partition::{parse_date, split};
use crate::executor::export::writers::open_writer;
use crate::executor::export::{
    ExportPipeline, ExportPlan, OutputTarget, ProgressTracker, TimePartition,
};
use crate::executor::{AsyncSearchController, DeleteOutcome, WaitOptions};
use crate::formatter::{format_export_report, format_handle, format_poll};
use crate::query::{QuerySource, prepare_export_query};

use super::{CliInterface, Commands, ExportArgs, OutputArgs, QueryArgs, completion};

/// Everything a handler needs besides its arguments.
pub struct CommandContext {
    pub config: Config,
    pub client: Arc<dyn SearchClient>,
    pub cancel: CancellationToken,
    pub progress: bool,
}

impl CommandContext {
    fn retry(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.retry)
    }

    fn controller(&self) -> AsyncSearchController {
        AsyncSearchController::new(self.client.clone(), self.retry())
    }
}

/// Summary text and the stream it belongs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Main result of the command.
    Stdout(String),
    /// Status around data written to stdout or a file.
    Stderr(String),
    None,
}

/// Run the parsed command line.
///
/// # Arguments
/// * `cli` - Arguments and effective configuration
/// * `cancel` - Cancelled on Ctrl+C
///
/// # Returns
/// * `Result<()>` - Success or the first error
pub async fn run(cli: &CliInterface, cancel: CancellationToken) -> Result<()> {
    let command = &cli.args().command;
    match command {
        Commands::Completion { shell } => completion::generate_completion(*shell),
        Commands::Config { show, validate } => handle_config_command(cli, *show, *validate),
        _ => {
            cli.config().validate()?;
            let client = HttpSearchClient::new(&cli.config().connection)?;
            let ctx = CommandContext {
                config: cli.config().clone(),
                client: Arc::new(client),
                cancel,
                progress: cli.progress_enabled(),
            };
            match execute(&ctx, command).await? {
                Summary::Stdout(text) => println!("{text}"),
                Summary::Stderr(text) => eprintln!("{text}"),
                Summary::None => {}
            }
            Ok(())
        }
    }
}

/// Dispatch one cluster command.
pub async fn execute(ctx: &CommandContext, command: &Commands) -> Result<Summary> {
    match command {
        Commands::Submit {
            index,
            query,
            keep_alive,
            wait_for,
        } => handle_submit(ctx, index, query, *keep_alive, *wait_for).await,
        Commands::Status { search_id, wait_for } => {
            let wait_for = wait_for.filter(|d| !d.is_zero());
            let handle = ctx.controller().status(search_id, wait_for).await?;
            Ok(Summary::Stdout(format_handle("Search status", &handle)))
        }
        Commands::Wait {
            search_id,
            interval,
            timeout,
        } => {
            let options = WaitOptions {
                interval: interval.unwrap_or(ctx.config.search.poll_interval),
                timeout: *timeout,
                cancel: Some(ctx.cancel.clone()),
            };
            let handle = wait_with_spinner(ctx, &ctx.controller(), search_id, &options).await?;
            Ok(Summary::Stdout(format_handle("Search complete!", &handle)))
        }
        Commands::Get { search_id, output } => handle_get(ctx, search_id, output).await,
        Commands::Delete { search_id } => {
            let message = match ctx.controller().delete(search_id).await? {
                DeleteOutcome::Deleted => "Search deleted.",
                DeleteOutcome::AlreadyGone => "Search not found (may have already expired).",
            };
            Ok(Summary::Stdout(message.to_string()))
        }
        Commands::Export(args) => handle_export(ctx, args).await,
        Commands::Completion { .. } | Commands::Config { .. } => Err(ElasticError::Usage(
            "command does not talk to the cluster".into(),
        )),
    }
}

async fn handle_submit(
    ctx: &CommandContext,
    index: &str,
    query: &QueryArgs,
    keep_alive: Option<std::time::Duration>,
    wait_for: Option<std::time::Duration>,
) -> Result<Summary> {
    let body = QuerySource::from_arg(query.query_file.clone()).read().await?;
    let keep_alive = keep_alive.unwrap_or(ctx.config.search.keep_alive);
    let wait_for = wait_for
        .unwrap_or(ctx.config.search.wait_for)
        .min(keep_alive);
    let wait_for = (!wait_for.is_zero()).then_some(wait_for);

    let handle = ctx
        .controller()
        .submit(index, &body, keep_alive, wait_for)
        .await?;
    Ok(Summary::Stdout(format_handle("Search submitted!", &handle)))
}

async fn wait_with_spinner(
    ctx: &CommandContext,
    controller: &AsyncSearchController,
    search_id: &str,
    options: &WaitOptions,
) -> Result<crate::executor::AsyncSearchHandle> {
    let tracker = ProgressTracker::for_wait(ctx.progress);
    let result = controller
        .wait(search_id, options, &mut |handle, _| {
            tracker.set_message(format_poll(handle))
        })
        .await;
    tracker.finish();
    result
}

async fn handle_get(ctx: &CommandContext, search_id: &str, output: &OutputArgs) -> Result<Summary> {
    let target = OutputTarget::from_arg(output.output.as_deref());
    let mut writer = open_writer(&target, output.format).await?;
    let fetched = ctx.controller().get(search_id, writer.as_mut()).await?;

    let mut notes = Vec::new();
    if fetched.handle.is_running {
        notes.push("Search is still running; results are partial.".to_string());
    }
    if let OutputTarget::File(path) = &target {
        notes.push(format!("Wrote {} hits to {}", fetched.documents, path.display()));
    }
    Ok(if notes.is_empty() {
        Summary::None
    } else {
        Summary::Stderr(notes.join("\n"))
    })
}

async fn handle_export(ctx: &CommandContext, args: &ExportArgs) -> Result<Summary> {
    let page_size = args.page_size.unwrap_or(ctx.config.export.page_size);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ElasticError::Usage(format!(
            "--page-size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let keep_alive = args.keep_alive.unwrap_or(ctx.config.export.keep_alive);
    if keep_alive.is_zero() {
        return Err(ElasticError::Usage("--keep-alive must be positive".into()));
    }
    let timestamp_field = args
        .timestamp_field
        .clone()
        .unwrap_or_else(|| ctx.config.export.timestamp_field.clone());

    let from = args.from_date.as_deref().map(parse_date).transpose()?;
    let to = args.to_date.as_deref().map(parse_date).transpose()?;
    let partitions = split(from, to, args.partition_every)?;

    let query = QuerySource::from_arg(args.query.query_file.clone()).read().await?;
    let body = prepare_export_query(&query, &timestamp_field);

    if args.preflight {
        let whole_range = TimePartition { from, to }.apply(&body, &timestamp_field);
        preflight(ctx, &args.index, &whole_range).await?;
    }

    let plan = ExportPlan {
        index: args.index.clone(),
        body,
        partitions,
        page_size,
        keep_alive,
        timestamp_field,
    };

    let target = OutputTarget::from_arg(args.output.output.as_deref());
    let mut writer = open_writer(&target, args.output.format).await?;
    let pipeline = ExportPipeline::new(ctx.client.clone(), ctx.retry())
        .with_progress(ProgressTracker::new(ctx.progress))
        .with_cancellation(ctx.cancel.clone());

    let report = pipeline.run(&plan, writer.as_mut()).await?;
    Ok(Summary::Stderr(format_export_report(&report)))
}

/// Run the export query once as an async search so frozen shards are
/// mounted before any PIT is opened. The job is deleted afterwards.
async fn preflight(ctx: &CommandContext, index: &str, body: &Value) -> Result<()> {
    let mut probe = body.clone();
    if let Some(map) = probe.as_object_mut() {
        map.insert("size".into(), json!(0));
        map.remove("sort");
    }

    let controller = ctx.controller();
    let handle = controller
        .submit(
            index,
            &probe,
            ctx.config.search.keep_alive,
            Some(ctx.config.search.wait_for),
        )
        .await?;

    let outcome = if handle.is_running {
        let options = WaitOptions {
            interval: ctx.config.search.poll_interval,
            timeout: None,
            cancel: Some(ctx.cancel.clone()),
        };
        wait_with_spinner(ctx, &controller, &handle.id, &options)
            .await
            .map(|_| ())
    } else {
        Ok(())
    };

    if let Err(err) = controller.delete(&handle.id).await {
        warn!(search_id = %handle.id, error = %err, "failed to delete preflight search");
    }
    outcome
}

/// Handle the `config` subcommand
///
/// # Arguments
/// * `show` - Whether to show configuration
/// * `validate` - Whether to validate configuration
///
/// # Returns
/// * `Result<()>` - Success or the validation error
fn handle_config_command(cli: &CliInterface, show: bool, validate: bool) -> Result<()> {
    if validate {
        validate_config_file(cli)?;
    }

    if show || !validate {
        show_config(cli)?;
    }

    Ok(())
}

/// Validate configuration file
fn validate_config_file(cli: &CliInterface) -> Result<()> {
    let path = cli.config_path();
    println!("Validating configuration file: {}", path.display());

    if !path.exists() {
        println!("Configuration file does not exist; defaults apply");
    }

    match cli.config().validate() {
        Ok(()) => {
            println!("✅ Configuration is valid");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            Err(e)
        }
    }
}

/// Show effective configuration
fn show_config(cli: &CliInterface) -> Result<()> {
    println!("Configuration file: {}", cli.config_path().display());
    println!();
    println!("=== Effective Configuration ===");
    println!();
    println!("{}", cli.config().to_toml_redacted()?);
    Ok(())
}
