//! Builders for assembling configurations in code.

pub mod config;

pub use config::ConfigBuilder;
