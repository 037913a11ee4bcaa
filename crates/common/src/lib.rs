//! Shared configuration and platform helpers for Flow Mail

pub mod config;
pub mod platform;

pub use config::{Config, ConfigError};
