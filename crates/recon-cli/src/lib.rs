//! Recon CLI
//!
//! Wires the reconciliation engine to real collaborators (GitHub, the live
//! config backend, a publish directory) and exposes each operation as a
//! subcommand of the `recon` binary. Results are printed as JSON on stdout;
//! logs go to stderr.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod logging;
pub mod wiring;

pub use cli::build_cli;
pub use wiring::Wiring;
