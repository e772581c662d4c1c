//! # Registrar application library
//!
//! The CLI, HTTP API and configuration layers around `registrar-core`.
//! Exposed as a library so integration tests can drive the router and
//! the commands without spawning the binary.

pub mod api;
pub mod cli;
pub mod config;
