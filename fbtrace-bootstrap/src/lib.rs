// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! # fbtrace-bootstrap
//!
//! The thin front end: CLI parsing, config/logging bootstrap, and
//! signal-driven shutdown. Deliberately does not implement a command
//! language or dispatch of its own (`SPEC_FULL.md` §6/§1) — it exists
//! to exercise `fbtrace`'s control surface end to end, not to be one.

pub mod cli;
pub mod logger;
pub mod shutdown;

pub use cli::{parse_cli, Cli, Command};
pub use shutdown::ShutdownCoordinator;
