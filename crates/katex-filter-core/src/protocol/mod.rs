//! Byte framing spoken with the render server.
//!
//! One TCP connection carries exactly one exchange. Neither direction has a
//! length prefix: the client half-closes its write side to end the request
//! and the server closes the connection to end the response.
//!
//! ```text
//! request:  ┌──────────┬───────────────────┐
//!           │ mode: u8 │ tex: UTF-8 ...    │  then shutdown(Write)
//!           └──────────┴───────────────────┘
//! response: ┌────────────┬─────────────────┐
//!           │ status: u8 │ payload: UTF-8  │  then close
//!           └────────────┴─────────────────┘
//! ```
//!
//! `mode` is `0x00` for inline math and `0x01` for display math. `status` is
//! `0x00` on success (payload is HTML); any other value is a failure and the
//! payload is the server's error message.

pub mod request;
pub mod response;

pub use request::{MathMode, RenderRequest, decode_request, encode_request};
pub use response::{RenderResponse, RenderStatus, decode_response, encode_response};

/// Errors from decoding a request or response frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty request")]
    EmptyRequest,

    #[error("empty response")]
    EmptyResponse,

    #[error("unknown math mode byte {0:#04x}")]
    UnknownMode(u8),

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
