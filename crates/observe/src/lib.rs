//! This crate contains the code that is required to provide observability
//! for the deployment binaries: initialization of the logging subscriber and
//! a panic hook that reports panics through it.
pub mod config;
pub mod tracing;

pub use config::Config;
