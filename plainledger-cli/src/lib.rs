//! Command-line interface library for plainledger
//!
//! Argument parsing, session configuration and report rendering for the
//! `plainledger` binary.

pub mod cli;
pub mod dispatch;
pub mod session;

pub use cli::Cli;
pub use dispatch::Dispatcher;
pub use session::Session;
