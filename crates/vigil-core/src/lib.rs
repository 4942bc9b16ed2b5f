//! Vigil core: the conversational command session engine.
//!
//! This crate holds the domain layer of Vigil, the session engine
//! behind an interactive, chat-style security operations CLI. It turns
//! free-text user input (classified by an external collaborator) into
//! confirmed, executed commands while tracking multi-turn context,
//! guided workflows, and destructive-action confirmation gates.
//!
//! Nothing in here is a process-wide singleton: the store, the
//! confirmation manager, and the orchestrator are injected
//! dependencies, so isolated sessions and tests run without shared
//! mutable global state.

pub mod classifier;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod executor;
pub mod session;
pub mod suggestion;
pub mod workflow;

pub use config::EngineConfig;
pub use error::{Result, VigilError};
