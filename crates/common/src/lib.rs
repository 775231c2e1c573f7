//! Common types and utilities for hook-sync

pub mod config;
pub mod error;
pub mod paths;

pub use config::{BusyPolicy, Config, Secret};
pub use error::{Error, Result};
