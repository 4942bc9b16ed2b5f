//! Vigil application layer.
//!
//! Wires the session state machine to the context store and the
//! external collaborators, one full turn at a time.

pub mod session_usecase;

pub use session_usecase::{SessionSnapshot, SessionUseCase, TurnReport};
