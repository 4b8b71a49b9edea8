//! lookyloo-web — Web front-end for Lookyloo captures.
//! Provides:
//!   - JSON and form submission of captures
//!   - Index of stored captures
//!   - Capture tree explorer with host / URL details
//!   - Screenshot, URL list and response body downloads

pub mod handlers;
pub mod router;
pub mod session;
pub mod state;
pub mod templates;
