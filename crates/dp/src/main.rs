//! dp - deskpilot CLI
//!
//! Every command prints one JSON envelope on stdout: `{success, data?, error?}`.
//! Logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deskpilot::{AutomationSession, Config, PlanReport};
use deskpilot_core::{Action, Error, ErrorCode, Plan};
use deskpilot_recorder::StopOutcome;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dp")]
#[command(about = "deskpilot - plan, run, record and replay desktop automation")]
#[command(version)]
struct Cli {
    /// Gemini API key; enables planning and AI actions
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "DESKPILOT_MODEL", global = true)]
    model: Option<String>,
    #[arg(long, env = "DESKPILOT_WORKFLOWS_DIR", global = true)]
    workflows_dir: Option<PathBuf>,
    /// Run the controlled browser without a window
    #[arg(long, global = true)]
    headless: bool,
    /// Accept coordinate clicks without checking the screen changed
    #[arg(long, global = true)]
    no_verify: bool,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan an instruction with the model and run it
    Run {
        instruction: String,
    },
    /// Run a plan file (`{"steps": [...]}` or a bare array)
    Exec {
        plan: PathBuf,
    },
    /// Record a workflow (Ctrl+C or Escape to stop)
    Record {
        #[arg(short, long, default_value = "untitled")]
        name: String,
    },
    /// Replay a stored workflow
    Replay {
        id: String,
        #[arg(long, default_value = "1.0")]
        speed: f64,
    },
    /// List stored workflows, newest first
    List,
    /// Show a stored workflow
    Show {
        id: String,
        /// Print every event
        #[arg(long)]
        all: bool,
    },
    /// Delete a stored workflow
    Delete {
        id: String,
    },
    /// Capture the screen to a PNG file
    Screenshot {
        #[arg(short, long, default_value = "screenshot.png")]
        output: String,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    fn with_error(data: T, error: Option<Error>) -> Self {
        Self { success: error.is_none(), data: Some(data), error }
    }
}

impl Output<()> {
    fn err(e: Error) -> Self {
        Self { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to encode output: {}", e),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config_from(&cli);
    let result = match cli.command {
        Commands::Run { instruction } => with_session(config, |s| cmd_run(s, &instruction)),
        Commands::Exec { plan } => with_session(config, |s| cmd_exec(s, &plan)),
        Commands::Record { name } => with_session(config, |s| cmd_record(s, &name)),
        Commands::Replay { id, speed } => with_session(config, |s| cmd_replay(s, &id, speed)),
        Commands::List => with_session(config, cmd_list),
        Commands::Show { id, all } => with_session(config, |s| cmd_show(s, &id, all)),
        Commands::Delete { id } => with_session(config, |s| cmd_delete(s, &id)),
        Commands::Screenshot { output } => with_session(config, |s| cmd_screenshot(s, output)),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(err) => print_json(&Output::err(err.clone())),
                None => print_json(&Output::err(Error::new(ErrorCode::Unknown, e.to_string()))),
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_from(cli: &Cli) -> Config {
    let mut config = Config::from_env().headless(cli.headless).verify_clicks(!cli.no_verify);
    if let Some(key) = cli.api_key.as_deref().filter(|k| !k.is_empty()) {
        config = config.with_api_key(key);
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(dir) = &cli.workflows_dir {
        config = config.with_workflows_dir(dir.clone());
    }
    config
}

/// Build a session, run `f`, and always release the browser and any armed recording.
/// `Ok(false)` means the command printed a failure envelope itself.
fn with_session<F>(config: Config, f: F) -> Result<bool>
where
    F: FnOnce(&AutomationSession) -> Result<bool>,
{
    let session = AutomationSession::new(config)?;
    let result = f(&session);
    if let Err(e) = session.close() {
        warn!("closing session: {}", e);
    }
    result
}

/// Ctrl+C stops the running plan before its next step.
fn stop_on_interrupt(session: &AutomationSession) -> Result<()> {
    let handle = session.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nstopping after the current step...");
        handle.stop();
    })?;
    Ok(())
}

fn print_report(report: &PlanReport) -> bool {
    let error = report
        .halted_at
        .and_then(|i| report.log.iter().find(|r| r.index == i))
        .and_then(|r| r.error.clone());
    info!("{}", report.summary());
    print_json(&Output::with_error(report, error));
    report.succeeded()
}

fn cmd_run(session: &AutomationSession, instruction: &str) -> Result<bool> {
    stop_on_interrupt(session)?;
    let report = session.run_instruction(instruction)?;
    Ok(print_report(&report))
}

fn cmd_exec(session: &AutomationSession, path: &PathBuf) -> Result<bool> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::not_found(format!("plan file {}: {}", path.display(), e)))?;
    let plan = Plan::from_json(&text)?;
    if plan.is_empty() {
        return Err(Error::new(ErrorCode::InvalidAction, "plan has no steps").into());
    }
    stop_on_interrupt(session)?;
    let report = session.execute(&plan);
    Ok(print_report(&report))
}

fn cmd_record(session: &AutomationSession, name: &str) -> Result<bool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    session.start_recording(name)?;
    eprintln!("Recording: {} (Ctrl+C or Escape to stop)", name);

    let mut count = 0;
    loop {
        let status = session.recording_status();
        if !status.recording {
            // Escape ended it from the keyboard thread.
            eprintln!();
            return match (status.last_outcome, status.last_error) {
                (_, Some(e)) => Err(e.into()),
                (Some(outcome), None) => {
                    print_json(&Output::ok(outcome));
                    Ok(true)
                }
                (None, None) => {
                    print_json(&Output::ok(StopOutcome::NotRecording));
                    Ok(true)
                }
            };
        }
        if status.actions_count != count {
            count = status.actions_count;
            eprint!("\r{} events", count);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    eprintln!();

    let outcome = session.stop_recording()?;
    print_json(&Output::ok(outcome));
    Ok(true)
}

fn cmd_replay(session: &AutomationSession, id: &str, speed: f64) -> Result<bool> {
    info!("replaying {} at {}x", id, speed);
    let report = session.replay(id, speed)?;
    print_json(&Output::ok(report));
    Ok(true)
}

fn cmd_list(session: &AutomationSession) -> Result<bool> {
    print_json(&Output::ok(session.list_workflows()?));
    Ok(true)
}

fn cmd_show(session: &AutomationSession, id: &str, all: bool) -> Result<bool> {
    let workflow = session.show_workflow(id)?;
    let mut data = serde_json::json!({
        "id": id,
        "name": workflow.name,
        "created_at": workflow.created_at,
        "duration": workflow.duration,
        "actions_count": workflow.actions_count,
        "summary": workflow.counts(),
    });
    if all {
        data["actions"] = serde_json::to_value(&workflow.actions)?;
    }
    print_json(&Output::ok(data));
    Ok(true)
}

fn cmd_delete(session: &AutomationSession, id: &str) -> Result<bool> {
    session.delete_workflow(id)?;
    print_json(&Output::ok(serde_json::json!({ "deleted": id })));
    Ok(true)
}

fn cmd_screenshot(session: &AutomationSession, output: String) -> Result<bool> {
    let result = session.execute_action(&Action::TakeScreenshot { filename: Some(output) });
    match result.error {
        Some(e) => Err(e.into()),
        None => {
            print_json(&Output::ok(result.payload));
            Ok(true)
        }
    }
}
