//! Configuration for the codescope pipeline.

pub mod config;

pub use config::Config;
