//! Command-line entry point: argument parsing only.
//!
//! Assembly and validation of the parsed arguments into a runnable
//! [`crate::config::ProviderConfig`] lives in [`crate::config`] so that
//! `main.rs` stays a thin `parse -> build config -> run` pipeline.

mod args;

pub use args::Args;
