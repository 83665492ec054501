//! planstream - streaming travel-plan generation client
//!
//! CLI entry point for generating, replaying and inspecting plans.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use planstream::cli::{Cli, Command, OutputFormat, PlansCommand, generate_after_help, get_log_path};
use planstream::config::Config;
use planstream::{
    CloseReason, ConnectionManager, DispatchCounts, Dispatcher, EventEmitter, ItineraryClient, ListQuery, Plan,
    PlanClient, PlanState, PlanStore, SessionEvent, SortOrder, WebSocketTransport, create_event_bus,
    dispatch_frames, read_session_events, recorded_frames, spawn_event_logger,
};

/// How long to wait for the event logger to drain after a session
const LOGGER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows config lookup and log location
    let cmd = Cli::command().after_help(generate_after_help());

    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(ws_url = %config.server.ws_url, api_url = %config.server.api_url, "planstream loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Generate {
            prompt,
            token,
            output,
            format,
            no_log,
        } => cmd_generate(&config, &prompt, token.as_deref(), output.as_deref(), format, no_log).await,
        Command::Replay { file, session, format } => cmd_replay(&config, file.as_deref(), session.as_deref(), format),
        Command::Events { session_id, format } => cmd_events(&config, &session_id, format),
        Command::Plans { command } => cmd_plans(&config, command).await,
        Command::Logs { lines } => cmd_logs(lines),
    }
}

/// Run one generation session to completion or Ctrl-C
async fn cmd_generate(
    config: &Config,
    prompt: &str,
    token: Option<&str>,
    output: Option<&Path>,
    format: OutputFormat,
    no_log: bool,
) -> Result<()> {
    debug!(%prompt, ?output, %format, no_log, "cmd_generate: called");
    let token = config.resolve_token(token)?;

    let bus = create_event_bus();
    let logger = if no_log {
        None
    } else {
        Some(spawn_event_logger(&bus, config.storage.runs_path()))
    };
    let mut events = bus.subscribe();

    let mut transport = WebSocketTransport::new();
    if let Some(timeout) = config.server.connect_timeout() {
        transport = transport.with_connect_timeout(timeout);
    }
    let store = PlanStore::new();
    let client = PlanClient::new(&config.server.ws_url, Arc::new(transport), Arc::new(store.clone()))?
        .with_events(bus.clone());
    let manager = ConnectionManager::new(client);

    let teardown = manager.connect(prompt, &token);
    let session = teardown.session().clone();
    eprintln!("{} {}", "Session".bold(), session.id());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let reason = loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                info!(session_id = %session.id(), "cmd_generate: interrupted, closing session");
                eprintln!("{}", "Interrupted, closing...".yellow());
                interrupted = true;
                session.close();
            }
            event = events.recv() => match event {
                Ok(event) if event.session_id() == session.id() => {
                    print_event(&event);
                    if let SessionEvent::Closed { reason, .. } = event {
                        break reason;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(missed = n, "cmd_generate: event output lagged"),
                Err(RecvError::Closed) => {
                    session.closed().await;
                    break CloseReason::Failed;
                }
            }
        }
    };

    let counts = session.stats().counts();
    teardown.run();
    drop(manager);
    drop(bus);
    if let Some(logger) = logger
        && tokio::time::timeout(LOGGER_DRAIN_TIMEOUT, logger).await.is_err()
    {
        warn!("cmd_generate: event logger did not drain in time");
    }

    let state = store.state();
    if let Some(path) = output {
        write_snapshot(path, &state)?;
        eprintln!("Wrote plan to {}", path.display());
    }

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "session_id": session.id(),
                "reason": reason,
                "complete": state.complete,
                "snapshot": state.snapshot,
                "counts": counts,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print_plan(&state);
            print_counts(&counts);
        }
    }

    match reason {
        CloseReason::Completed | CloseReason::Cancelled => Ok(()),
        CloseReason::RemoteClosed => Err(eyre::eyre!("Server closed the connection before completion")),
        CloseReason::Failed => Err(eyre::eyre!("Session failed; see {}", get_log_path().display())),
    }
}

/// Feed recorded frames through a fresh dispatcher
fn cmd_replay(config: &Config, file: Option<&Path>, session: Option<&str>, format: OutputFormat) -> Result<()> {
    debug!(?file, ?session, %format, "cmd_replay: called");
    let (label, frames) = match (file, session) {
        (Some(path), _) => {
            let content =
                fs::read_to_string(path).context(format!("Failed to read frames from {}", path.display()))?;
            let frames: Vec<String> = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            (path.display().to_string(), frames)
        }
        (None, Some(id)) => {
            let entries = read_session_events(config.storage.runs_path(), id)?;
            if entries.is_empty() {
                return Err(eyre::eyre!("No recorded events for session {}", id));
            }
            (id.to_string(), recorded_frames(&entries))
        }
        (None, None) => return Err(eyre::eyre!("Nothing to replay: pass a FILE or --session")),
    };
    info!(%label, frames = frames.len(), "cmd_replay: replaying");

    let store = PlanStore::new();
    let dispatcher = Dispatcher::new(Arc::new(store.clone()), EventEmitter::detached(format!("replay:{}", label)));
    let outcome = dispatch_frames(&dispatcher, &frames);
    let counts = dispatcher.stats().counts();
    let state = store.state();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "source": label,
                "frames_total": frames.len(),
                "frames_handled": outcome.frames_handled,
                "complete": state.complete,
                "snapshot": state.snapshot,
                "counts": counts,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "Replayed {} of {} frames from {}",
                outcome.frames_handled,
                frames.len(),
                label
            );
            print_plan(&state);
            print_counts(&counts);
        }
    }
    Ok(())
}

/// Print a session's logged events
fn cmd_events(config: &Config, session_id: &str, format: OutputFormat) -> Result<()> {
    debug!(%session_id, %format, "cmd_events: called");
    let entries = read_session_events(config.storage.runs_path(), session_id)?;
    if entries.is_empty() {
        println!("No events recorded for session {}", session_id);
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!(
                    "{}  {:<18} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    entry.event.event_type(),
                    event_detail(&entry.event)
                );
            }
        }
    }
    Ok(())
}

/// Query the REST API
async fn cmd_plans(config: &Config, command: PlansCommand) -> Result<()> {
    debug!(?command, "cmd_plans: called");
    match command {
        PlansCommand::List {
            page,
            limit,
            search,
            sort,
            order,
            token,
            format,
        } => {
            let client = api_client(config, token.as_deref())?;
            let query = ListQuery {
                page,
                limit,
                search,
                sort,
                order,
            };
            let page = client.list_plans(&query).await.context("Failed to list plans")?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
                OutputFormat::Text => {
                    if page.data.is_empty() {
                        println!("No plans found");
                    }
                    for plan in &page.data {
                        println!(
                            "{:<26} {:<40} {}",
                            plan.id.bold(),
                            plan.title.as_deref().unwrap_or("(untitled)"),
                            plan.created_at.as_deref().unwrap_or("").dimmed()
                        );
                    }
                    println!(
                        "\nPage {} of {} ({} total, order {})",
                        page.page,
                        page.page_count().max(1),
                        page.total,
                        query.order.unwrap_or(SortOrder::Desc)
                    );
                }
            }
        }
        PlansCommand::Get { id, token, format } => {
            let client = api_client(config, token.as_deref())?;
            let plan = client
                .get_plan(&id)
                .await
                .context(format!("Failed to fetch plan {}", id))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Text => print!("{}", Plan::from_snapshot(&plan).render_text()),
            }
        }
    }
    Ok(())
}

fn api_client(config: &Config, token: Option<&str>) -> Result<ItineraryClient> {
    let client = ItineraryClient::new(
        &config.server.api_url,
        config.optional_token(token),
        config.server.request_timeout(),
    )?;
    Ok(client)
}

/// Show logs
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        debug!(?log_path, "cmd_logs: log file does not exist");
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}

fn write_snapshot(path: &Path, state: &PlanState) -> Result<()> {
    let Some(snapshot) = &state.snapshot else {
        return Err(eyre::eyre!("No plan was received; nothing written to {}", path.display()));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_plan(state: &PlanState) {
    match &state.snapshot {
        Some(snapshot) => print!("{}", Plan::from_snapshot(snapshot).render_text()),
        None => println!("{}", "(no plan received)".dimmed()),
    }
    let status = if state.complete {
        "complete".green()
    } else {
        "incomplete".yellow()
    };
    println!("Status: {}", status);
}

fn print_counts(counts: &DispatchCounts) {
    println!(
        "Frames: {} (snapshots {}, empty {}, dropped {}, errors {})",
        counts.frames,
        counts.snapshots,
        counts.empty_updates,
        counts.dropped(),
        counts.server_errors
    );
}

/// One live progress line per event, on stderr
fn print_event(event: &SessionEvent) {
    let line = match event {
        SessionEvent::FrameReceived { .. } => return,
        SessionEvent::Connecting { .. } | SessionEvent::PromptSent { .. } => event_detail(event).dimmed(),
        SessionEvent::Opened { .. } | SessionEvent::Completed { .. } => event_detail(event).green(),
        SessionEvent::SnapshotReplaced { .. } => event_detail(event).cyan(),
        SessionEvent::Status { .. } | SessionEvent::Progress { .. } => event_detail(event).normal(),
        SessionEvent::FrameDropped { .. } | SessionEvent::FrameUnrecognized { .. } => event_detail(event).yellow(),
        SessionEvent::ServerError { .. } | SessionEvent::TransportError { .. } => event_detail(event).red(),
        SessionEvent::Closed { reason, .. } => match reason {
            CloseReason::Completed => event_detail(event).green(),
            CloseReason::Cancelled => event_detail(event).yellow(),
            CloseReason::RemoteClosed | CloseReason::Failed => event_detail(event).red(),
        },
    };
    eprintln!("  {}", line);
}

fn event_detail(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Connecting { url, .. } => format!("connecting to {}", url),
        SessionEvent::Opened { .. } => "connected".to_string(),
        SessionEvent::Closed { reason, .. } => format!("closed ({})", reason),
        SessionEvent::PromptSent { prompt, .. } => format!("prompt sent: {}", prompt),
        SessionEvent::FrameReceived { raw, .. } => raw.clone(),
        SessionEvent::SnapshotReplaced { kind, .. } => format!("plan updated ({})", kind),
        SessionEvent::Status { message, .. } => format!("status: {}", message),
        SessionEvent::Progress { message, .. } => format!("progress: {}", message),
        SessionEvent::ServerError { message, .. } => format!("server error: {}", message),
        SessionEvent::FrameDropped { reason, .. } => format!("dropped frame: {}", reason),
        SessionEvent::FrameUnrecognized { kind, .. } => format!("ignored frame type '{}'", kind),
        SessionEvent::Completed { .. } => "generation complete".to_string(),
        SessionEvent::TransportError { message, .. } => format!("transport error: {}", message),
    }
}
