//! Mantle CLI library.
//!
//! Command definitions, logging setup and output helpers behind the
//! `mantle` binary.

pub mod commands;
pub mod logging;
pub mod output;
