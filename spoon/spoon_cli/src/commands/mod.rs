//! Subcommands of the spoon CLI

pub mod config;
pub mod run;
