//! Response frame: one status byte followed by HTML or an error message.

use super::ProtocolError;

/// Outcome reported by the render server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Success,
    /// Any nonzero status byte. The code itself is kept for diagnostics.
    Failure(u8),
}

impl RenderStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Success,
            code => Self::Failure(code),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// A decoded response. `payload` is HTML on success and the server's error
/// message on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResponse {
    pub status: RenderStatus,
    pub payload: String,
}

/// Decode the bytes read from a connection up to end-of-stream.
///
/// An empty buffer means the server hung up without answering and is
/// reported as [`ProtocolError::EmptyResponse`].
pub fn decode_response(bytes: &[u8]) -> Result<RenderResponse, ProtocolError> {
    let (&status, payload) = bytes.split_first().ok_or(ProtocolError::EmptyResponse)?;
    Ok(RenderResponse {
        status: RenderStatus::from_byte(status),
        payload: String::from_utf8(payload.to_vec())?,
    })
}

/// Build a response frame, as a render server would send it.
///
/// A `Failure(0)` status would read back as success; it is written as `1`.
pub fn encode_response(status: RenderStatus, payload: &str) -> Vec<u8> {
    let status = match status {
        RenderStatus::Failure(0) => 1,
        other => other.as_byte(),
    };
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(status);
    buf.extend_from_slice(payload.as_bytes());
    buf
}
