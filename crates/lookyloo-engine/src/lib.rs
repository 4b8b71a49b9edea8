//! lookyloo-engine — Captures web pages through Splash and stores them on disk.
//! Provides:
//!   - the `CaptureEngine` trait the web layer talks to
//!   - `Lookyloo`, its filesystem + Splash implementation
//!   - HAR parsing and capture-tree construction
//!   - SaneJS and user-agent helpers

pub mod crawl;
pub mod engine;
pub mod har;
pub mod lookyloo;
pub mod reports;
pub mod sanejs;
pub mod splash;
pub mod user_agents;

#[cfg(test)]
mod testing;

pub use engine::CaptureEngine;
pub use lookyloo::Lookyloo;
pub use user_agents::{UserAgents, UserAgentsByOs};
