//! Warden CLI — the `warden` binary and its decision API.
//!
//! - [`config`]: the configuration file and its environment overrides
//! - [`gateway`]: explicit assembly and lifecycle of all components
//! - [`api`]: the axum decision and health endpoints
//! - [`commands`]: `serve`, `validate` and `health`

#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod logging;

pub use config::WardenConfig;
pub use gateway::Gateway;
