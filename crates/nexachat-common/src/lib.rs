//! # NexaChat Common
//!
//! Logging configuration shared by the NexaChat worker crates.
//!
//! ## Features
//!
//! - `tracing-subscriber` setup with an `EnvFilter`
//! - Pretty, compact and JSON output formats

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, UnknownLogFormat};
