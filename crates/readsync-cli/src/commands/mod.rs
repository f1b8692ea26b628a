//! CLI command handlers

pub mod auth;
pub mod config;
pub mod reset;
pub mod status;
pub mod sync;
pub mod watch;
