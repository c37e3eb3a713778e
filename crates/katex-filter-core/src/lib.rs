#![deny(unsafe_code)]

//! katex-filter core: talks to an external TeX render server.
//!
//! A render server turns TeX into HTML. This crate speaks its wire protocol
//! ([`protocol`]), runs one exchange per expression ([`client`]), and uses
//! that to pre-render every math element of a Pandoc JSON document
//! ([`filter`]).

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type for async
/// trait methods that are called through `dyn Trait`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Render client and failure log.
pub mod client;
/// Pandoc JSON document filter.
pub mod filter;
/// In-memory `tracing` event capture.
pub mod logging;
/// Request/response framing.
pub mod protocol;

pub use client::{
    ClientError, ConnectResult, MathRenderer, RenderClient, RenderLog, TracingRenderLog, render,
};
pub use filter::{FilterError, FilterReport, run_filter};
pub use logging::{LogCollector, LogReader};
pub use protocol::{MathMode, RenderRequest, RenderResponse, RenderStatus};
