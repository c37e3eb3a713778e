#![deny(unsafe_code)]

//! Shared test utilities for the katex-filter workspace.
//!
//! Provides a stub render server, a recording [`RenderLog`], config
//! builders, and tracing helpers so that crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! katex-filter-test-utils = { workspace = true }
//! ```
//!
//! [`RenderLog`]: katex_filter_core::RenderLog

pub mod config;
pub mod render_log;
pub mod server;
pub mod tracing_setup;

pub use render_log::{LoggedFailure, RecordingRenderLog};
pub use server::{StubRenderServer, unused_port};
