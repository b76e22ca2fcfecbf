//! Study Buddy Agent Service
//!
//! Runs the study-buddy tools as an MCP server over stdio for an external
//! voice pipeline. The `study-buddy` binary is a thin wrapper around this
//! library: configuration, prompt loading, session bootstrap, forwarding of
//! display messages and the shutdown sequence all live here.

pub mod config;
pub mod display_sink;
pub mod prompts;
pub mod session;
