//! Command-line front end for skosnav.
//!
//! # Key Abstractions
//!
//! - [`SkosnavCli`]: application parameterized over a
//!   [`ConfigProvider`](skosnav_core::ConfigProvider)
//! - [`SkosnavConfig`]: file, environment and default configuration
//! - [`handlers`]: one function per browsing command, text or JSON output

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod handlers;

pub use app::SkosnavCli;
pub use cli::{CliArgs, Command, ConfigAction, ConfigCommand};
pub use config::SkosnavConfig;
pub use handlers::Output;
