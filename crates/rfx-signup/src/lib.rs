#![forbid(unsafe_code)]

//! Signup form demo.
//!
//! Four text fields, a create button and a status label, kept consistent by
//! reactive bindings: the button is enabled only while the form is valid and
//! no submission is in flight, fields grey out during submission, and the
//! label reports the simulated network's answer.

pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod screen;
pub mod session;
pub mod widgets;

pub use cli::{Cli, run, run_from_env};
pub use config::SignupConfig;
pub use error::{Result, SignupError};
pub use network::SimulatedNetwork;
pub use screen::{ScreenSnapshot, SignupScreen, SignupWidgets};
pub use session::run_session;
