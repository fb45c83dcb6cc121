//! CLI command implementations.

pub mod backends;
pub mod common;
pub mod config;
pub mod jobs;
pub mod programs;
pub mod request;
pub mod version;
pub mod versions;
