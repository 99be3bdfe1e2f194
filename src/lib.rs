//! # browser-fsm
//!
//! A declarative state-machine engine that drives live web pages through the Chrome DevTools Protocol (CDP).
//!
//! ## Features
//!
//! - **State Graphs**: Automations are plain data (JSON) naming states, targets, actions and transitions
//! - **Layered Element Resolution**: Semantic (role + accessible name), text, then CSS selector fallbacks
//! - **Human-Paced Actions**: Click, type, scroll and wait with randomized, configurable delays
//! - **Checkpointed Runs**: Every iteration is persisted so an interrupted run can be resumed explicitly
//! - **Offline Pages**: An in-memory page backend for developing and testing graphs without a browser
//!
//! ## Running a Graph
//!
//! ```bash
//! # Mine a connection list with the built-in graph
//! cargo run -- run --url https://example.com/connections --limit 200
//!
//! # Validate a graph file
//! cargo run -- validate --graph my-site.json
//! ```
//!
//! ## Library Usage
//!
//! ### Against a Live Browser
//!
//! ```rust,no_run
//! use browser_fsm::{AutomationContext, BrowserSession, LaunchOptions, StateMachine};
//! use browser_fsm::sites::connections;
//! use std::sync::Arc;
//!
//! # async fn run() -> browser_fsm::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! session.navigate("https://example.com/connections")?;
//! session.wait_for_navigation()?;
//!
//! let selectors = connections::ConnectionSelectors::default();
//! let context = AutomationContext::default().with_capabilities(connections::capabilities(&selectors)?);
//! let machine = StateMachine::new(connections::graph(&selectors), Arc::new(session.page()?), context);
//!
//! let report = machine.start(connections::initial_context(Some(100))).await?;
//! println!("Collected {} connections", connections::collected(&report.state.context).len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Against an In-Memory Page
//!
//! ```rust
//! use browser_fsm::{
//!     ActionSpec, AutomationContext, ContextMap, ElementNode, MemoryPage, ResolveSpec, StateDef, StateGraph,
//!     StateMachine, TimingConfig,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> browser_fsm::Result<()> {
//! let page = Arc::new(MemoryPage::new(
//!     ElementNode::new("body").with_child(ElementNode::new("button").with_text("Accept").with_size(80.0, 24.0)),
//! ));
//!
//! let graph = StateGraph::new("accept")
//!     .with_state(
//!         "accept",
//!         StateDef::new()
//!             .with_resolve(ResolveSpec::new().semantic("button", "accept"))
//!             .with_action(ActionSpec::Click)
//!             .with_next("done"),
//!     )
//!     .with_state("done", StateDef::new());
//!
//! let machine = StateMachine::new(graph, page.clone(), AutomationContext::default())
//!     .with_timing(TimingConfig::instant());
//! let report = machine.start(ContextMap::new()).await?;
//!
//! assert_eq!(report.state.current, "done");
//! assert_eq!(page.clicks().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`]: State graphs, the state machine, and caller-supplied capabilities - **Start here**
//! - [`resolver`]: Layered element resolution
//! - [`executor`]: Paced click/type/scroll/sleep primitives
//! - [`checkpoint`]: Run checkpoints over pluggable key/value stores
//! - [`browser`]: The `Page` abstraction with Chrome and in-memory backends
//! - [`dom`]: DOM snapshots, ARIA roles, and a CSS selector subset
//! - [`logging`]: Scoped logger with an in-memory history
//! - [`config`]: TOML engine configuration
//! - [`sites`]: Ready-made graphs
//! - [`error`]: Error types and result aliases

pub mod browser;
pub mod checkpoint;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod resolver;
pub mod sites;

pub use browser::{BrowserSession, ChromePage, ConnectionOptions, ElementHandle, LaunchOptions, MemoryPage, Page};
pub use checkpoint::{Checkpoint, CheckpointStore, FileStore, KeyValueStore, MemoryStore};
pub use config::EngineConfig;
pub use dom::{BoundingBox, DomTree, ElementNode};
pub use engine::{
    ActionSpec, AutomationContext, Capabilities, ContextMap, CustomAction, EngineStatus, Predicate, ProgressNotifier,
    RunOutcome, RunReport, RunState, StateDef, StateGraph, StateMachine, StopHandle,
};
pub use error::{AutomationError, Result};
pub use executor::{DelayRange, Executor, TimingConfig};
pub use logging::{LogHistory, LogRecord, Logger};
pub use resolver::{Matcher, ResolveSpec, Resolution, Resolver};
