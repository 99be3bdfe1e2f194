//! browser-fsm command line
//!
//! Runs state graphs against a Chrome instance, validates graph files, and
//! inspects run checkpoints.

use anyhow::{Context, Result, bail};
use browser_fsm::checkpoint::{CheckpointStore, FileStore};
use browser_fsm::engine::{AutomationContext, LogNotifier, RunOutcome, StateGraph, StateMachine};
use browser_fsm::sites::connections;
use browser_fsm::{BrowserSession, EngineConfig, LaunchOptions, LogHistory, Logger};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "browser-fsm")]
#[command(version)]
#[command(about = "Declarative state-machine browser automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a state graph against a page
    Run(RunArgs),

    /// Check a graph file for undefined states
    Validate {
        #[arg(long, value_name = "FILE")]
        graph: PathBuf,
    },

    /// Print the JSON Schema for graph files
    Schema,

    /// Inspect or delete a run's checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Page to open before the run starts
    #[arg(long, value_name = "URL")]
    url: String,

    /// Graph file (JSON); the built-in connections graph when omitted
    #[arg(long, value_name = "FILE")]
    graph: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Key the run's checkpoints are stored under
    #[arg(long, default_value = "connections")]
    run_key: String,

    #[command(flatten)]
    store: StoreArgs,

    /// Continue from the last checkpoint instead of the initial state
    #[arg(long)]
    resume: bool,

    /// Stop collecting after this many connections
    #[arg(long)]
    limit: Option<u64>,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Write the run's log history to this file as JSON
    #[arg(long, value_name = "FILE")]
    export_logs: Option<PathBuf>,
}

#[derive(clap::Args)]
struct StoreArgs {
    /// Directory checkpoints are written to
    #[arg(long, value_name = "DIR", default_value = ".browser-fsm")]
    state_dir: PathBuf,

    /// Checkpoint namespace (overrides the config file)
    #[arg(long)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the checkpoint as JSON
    Show {
        #[arg(long)]
        run_key: String,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Delete the checkpoint
    Clear {
        #[arg(long)]
        run_key: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

impl StoreArgs {
    fn open(&self, default_namespace: &str, logger: &Logger) -> CheckpointStore {
        let namespace = self.namespace.as_deref().unwrap_or(default_namespace);
        CheckpointStore::new(Arc::new(FileStore::new(&self.state_dir)), logger.scoped("checkpoint"))
            .with_namespace(namespace)
    }
}

fn load_graph(path: &Path) -> Result<StateGraph> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    StateGraph::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Run(args) => run(args).await,
        Command::Validate { graph } => validate(&graph),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&StateGraph::json_schema())?);
            Ok(())
        }
        Command::Checkpoint { action } => checkpoint(action).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let history = LogHistory::shared(config.log_history);
    let logger = Logger::new("browser_fsm", Arc::clone(&history));

    let selectors = connections::ConnectionSelectors::default();
    let graph = match &args.graph {
        Some(path) => load_graph(path)?,
        None => connections::graph(&selectors),
    };

    let mut options = LaunchOptions::new().headless(!args.headed);
    if let Some(dir) = &args.user_data_dir {
        options = options.user_data_dir(dir);
    }
    let session = BrowserSession::launch(options)?;
    session.navigate(&args.url)?;
    session.wait_for_navigation()?;

    let context = AutomationContext::new(logger.clone())
        .with_capabilities(connections::capabilities(&selectors)?)
        .with_notifier(LogNotifier::new(logger.scoped("progress")))
        .with_checkpoints(args.store.open(&config.checkpoint_namespace, &logger));
    let machine = Arc::new(
        StateMachine::new(graph, Arc::new(session.page()?), context)
            .with_run_key(&args.run_key)
            .with_timing(config.timing.clone()),
    );

    let stop = machine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping after the current step");
            stop.stop();
        }
    });

    let resumed = if args.resume { machine.load_checkpoint().await } else { None };
    let result = match resumed {
        Some(checkpoint) => {
            log::info!("Resuming from checkpoint written at {}", checkpoint.timestamp);
            machine.start_from(checkpoint.into_state()).await
        }
        None => {
            if args.resume {
                log::warn!("No checkpoint for run '{}', starting fresh", args.run_key);
            }
            machine.start(connections::initial_context(args.limit)).await
        }
    };

    if let Some(path) = &args.export_logs {
        std::fs::write(path, history.to_json()?).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Err(e) = session.close() {
        log::debug!("Failed to close browser: {}", e);
    }

    let report = result?;
    if report.outcome == RunOutcome::Cancelled {
        eprintln!("Stopped in state '{}'; rerun with --resume to continue", report.state.current);
    }
    println!("{}", serde_json::to_string_pretty(&report.state.context)?);
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let graph = load_graph(path)?;
    let issues = graph.validate();
    if issues.is_empty() {
        println!("{}: {} states, ok", path.display(), graph.states.len());
        return Ok(());
    }

    for issue in &issues {
        eprintln!("{}: {}", path.display(), issue);
    }
    bail!("{} problem(s) found", issues.len())
}

async fn checkpoint(action: CheckpointAction) -> Result<()> {
    let logger = Logger::default();
    let namespace = EngineConfig::default().checkpoint_namespace;

    match action {
        CheckpointAction::Show { run_key, store } => match store.open(&namespace, &logger).load(&run_key).await {
            Some(checkpoint) => println!("{}", serde_json::to_string_pretty(&checkpoint)?),
            None => bail!("no checkpoint for run '{}'", run_key),
        },
        CheckpointAction::Clear { run_key, store } => {
            store.open(&namespace, &logger).clear(&run_key).await;
            eprintln!("Cleared checkpoint for run '{}'", run_key);
        }
    }
    Ok(())
}
