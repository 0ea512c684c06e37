//! NexaChat Core Library
//!
//! This crate provides the worker configuration and its error type.

pub mod config;
pub mod error;

pub use config::{LoggingSettings, NotificationSettings, WorkerConfig};
pub use error::{CoreError, CoreResult};
