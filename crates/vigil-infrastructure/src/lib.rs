//! Vigil infrastructure: storage, logging, and configuration adapters.
//!
//! - [`memory_context_store::InMemoryContextStore`]: process-local
//!   store, the default for tests and ephemeral runs.
//! - [`toml_context_store::TomlContextStore`]: one TOML document per
//!   session, survives restarts.
//! - [`logging`]: tracing subscriber setup for the CLI.
//! - [`settings`]: engine configuration loading.

pub mod logging;
pub mod memory_context_store;
pub mod settings;
pub mod toml_context_store;

pub use memory_context_store::InMemoryContextStore;
pub use toml_context_store::TomlContextStore;
