//! # Command Dispatch
//!
//! The CLI is one client of `portalapp`. This module is the only place that:
//! - touches stdin, stdout and stderr
//! - sets up the tracing subscriber
//! - decides the process exit code
//!
//! Each invocation opens the portal (which runs recovery), runs one command,
//! waits for the pending snapshot write to settle, prints the notices raised
//! along the way and shuts down.

use super::render;
use super::setup::{BrowseCommands, Cli, Commands, DataCommands, DocumentCommands};
use clap::Parser;
use portalapp::api::PortalApi;
use portalapp::catalog::{DateWindow, EntryFilter};
use portalapp::commands::update::DocumentUpdate;
use portalapp::commands::upload::UploadRequest;
use portalapp::commands::{CmdMessage, CmdResult};
use portalapp::error::Result;
use portalapp::init::initialize;
use std::io::{BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let failed = runtime.block_on(execute(cli))?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "portal=debug,portalapp=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Runs the command and reports whether it produced error messages.
async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let context = initialize(cli.data, cli.manifest).await?;
    tracing::debug!(data_dir = %context.data_dir.display(), "portal opened");
    let mut api = context.api;

    let outcome = dispatch(&mut api, cli.command).await;

    api.registry().settle().await;
    render::print_notices(&api.notices().drain());
    api.shutdown().await;

    let result = outcome?;
    render::print_result(&result, cli.output)?;
    Ok(result.has_errors())
}

async fn dispatch(api: &mut PortalApi, command: Commands) -> Result<CmdResult> {
    match command {
        Commands::Browse(cmd) => dispatch_browse(api, cmd).await,
        Commands::Document(cmd) => dispatch_document(api, cmd).await,
        Commands::Data(cmd) => dispatch_data(api, cmd).await,
    }
}

async fn dispatch_browse(api: &mut PortalApi, command: BrowseCommands) -> Result<CmdResult> {
    match command {
        BrowseCommands::Chapters => api.chapters(),
        BrowseCommands::List {
            chapter,
            status,
            last_week,
            last_month,
        } => {
            let window = if last_week {
                Some(DateWindow::LastWeek)
            } else if last_month {
                Some(DateWindow::LastMonth)
            } else {
                None
            };
            api.list_chapter(&chapter, &EntryFilter { status, window })
        }
        BrowseCommands::Recent { limit } => api.recent(limit),
        BrowseCommands::Search { query } => api.search(&query.join(" ")),
        BrowseCommands::Stats => api.stats(),
        BrowseCommands::View { id, out } => {
            wait_for_blobs(api).await;
            api.view(&id, &out)
        }
        BrowseCommands::Favorites { id: Some(id) } => api.toggle_favorite(&id),
        BrowseCommands::Favorites { id: None } => api.favorites(),
    }
}

async fn dispatch_document(api: &mut PortalApi, command: DocumentCommands) -> Result<CmdResult> {
    match command {
        DocumentCommands::Upload {
            path,
            title,
            chapter,
            tags,
            status,
        } => {
            let mut request = UploadRequest::new(path, title, chapter).with_tags(tags);
            request.status = status;
            api.upload(request).await
        }
        DocumentCommands::Update { id, title, tags } => {
            api.update_document(&id, DocumentUpdate { title, tags }).await
        }
        DocumentCommands::Delete { ids } => api.delete_documents(&ids).await,
        DocumentCommands::Clear { yes } => {
            let count = api.registry().len();
            if count == 0 || yes || confirm(&format!("Delete all {} uploads?", count))? {
                api.clear_documents().await
            } else {
                let mut result = CmdResult::default();
                result.add_message(CmdMessage::info("Nothing deleted."));
                Ok(result)
            }
        }
    }
}

async fn dispatch_data(api: &mut PortalApi, command: DataCommands) -> Result<CmdResult> {
    match command {
        DataCommands::Capacity => api.capacity().await,
        DataCommands::Doctor => api.doctor().await,
        DataCommands::Export { dest } => {
            wait_for_blobs(api).await;
            api.export(&dest)
        }
        DataCommands::Import { archive } => api.import(&archive).await,
    }
}

/// Blobs still being reconciled in the background are needed for file output.
async fn wait_for_blobs(api: &mut PortalApi) {
    if api.blobs_pending() {
        let patched = api.wait_for_blobs().await;
        tracing::debug!(patched, "waited for blob reconciliation");
    }
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/N] ", question);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
