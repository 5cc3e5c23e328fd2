//! distpack library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive
//! the pipeline through them with fake container runtimes.

pub mod artifact;
pub mod build;
pub mod clean;
pub mod common;
pub mod config;
pub mod format;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod runtime;
pub mod timing;
pub mod version;
