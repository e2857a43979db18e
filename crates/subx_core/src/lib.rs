//! SubX Core - subtitle extraction, OCR dispatch and text correction
//!
//! This crate contains all business logic with zero UI dependencies.
//! It is driven by the `subx` CLI but can be embedded in any front end.

pub mod config;
pub mod correction;
pub mod dispatch;
pub mod extraction;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod network;
pub mod orchestrator;
pub mod output;
pub mod selection;

#[cfg(test)]
mod test_support;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
