//! Hostel search command line client
//!
//! Runs a single query given on the command line, or reads one query per line
//! from stdin. Each new line supersedes a search that is still running.

use anyhow::{Context as _, Result};
use clap::Parser;
use hostel_search::{
    config, render::Renderer, HttpClient, RequestToken, SearchController, SearchRequestState,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hostel-search", version, about = "Search hostels from the terminal")]
struct Cli {
    /// Path to a settings.yml file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base URL of the search service
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Deadline for each search, in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print final states as JSON instead of cards
    #[arg(long)]
    json: bool,

    /// Only check that the search service is reachable
    #[arg(long)]
    check: bool,

    /// Query to run; queries are read from stdin when omitted
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        settings.client.api_url = url;
    }
    if let Some(ms) = cli.timeout_ms {
        settings.client.request_timeout_ms = ms;
    }
    settings.validate()?;

    info!(
        "Hostel search v{} using {}",
        hostel_search::VERSION,
        settings.client.api_url
    );

    if cli.check {
        let client = HttpClient::with_settings(&settings.client)?;
        let health = client
            .health_check()
            .await
            .context("search service is not reachable")?;
        let status = if health.status.is_empty() { "ok" } else { health.status.as_str() };
        println!("{status} {}", health.message);
        return Ok(ExitCode::SUCCESS);
    }

    let controller = SearchController::from_settings(&settings)?;
    let renderer = Renderer::new()?;

    if cli.query.is_empty() {
        interactive(&controller, &renderer, cli.json).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let token = controller.submit_query(cli.query.join(" "));
    show(&renderer, &controller.state(), cli.json)?;
    let state = wait_for(&controller, token).await;
    show(&renderer, &state, cli.json)?;

    Ok(match state {
        SearchRequestState::Succeeded { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Read queries from stdin until EOF, printing every state change
async fn interactive(controller: &SearchController, renderer: &Renderer, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = controller.subscribe();
    let mut last = None;
    let mut shown = SearchRequestState::Idle;

    eprintln!("Type a query and press enter. Ctrl-D to quit.");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(query) => last = Some(controller.submit_query(query)),
                None => break,
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                shown = updates.borrow_and_update().clone();
                show(renderer, &shown, json)?;
            }
        }
    }

    if updates.has_changed().unwrap_or(false) {
        shown = updates.borrow_and_update().clone();
        show(renderer, &shown, json)?;
    }
    // The last result may land after the check above; settled() still sees it.
    if let Some(token) = last {
        if shown.token() != Some(token) || !shown.is_terminal() {
            let state = wait_for(controller, token).await;
            show(renderer, &state, json)?;
        }
    }
    Ok(())
}

async fn wait_for(controller: &SearchController, token: RequestToken) -> SearchRequestState {
    match controller.settled(token).await {
        Some(state) => state,
        None => controller.state(),
    }
}

fn show(renderer: &Renderer, state: &SearchRequestState, json: bool) -> Result<()> {
    if state.is_pending() {
        eprintln!("{}", renderer.render_state(state)?);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        let view = renderer.render_state(state)?;
        if !view.is_empty() {
            println!("{view}");
        }
    }
    Ok(())
}
