//! Request frame: one mode byte followed by the TeX source.

use super::ProtocolError;

/// How a math expression is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MathMode {
    /// Math set within a line of text.
    Inline = 0x00,
    /// Math set as its own block.
    Display = 0x01,
}

impl MathMode {
    /// Map a display-mode flag to a mode.
    pub fn from_display(display: bool) -> Self {
        if display { Self::Display } else { Self::Inline }
    }

    pub fn is_display(self) -> bool {
        self == Self::Display
    }

    /// The wire byte for this mode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MathMode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Self::Inline),
            0x01 => Ok(Self::Display),
            other => Err(ProtocolError::UnknownMode(other)),
        }
    }
}

/// A single render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub mode: MathMode,
    pub tex: String,
}

impl RenderRequest {
    pub fn new(mode: MathMode, tex: impl Into<String>) -> Self {
        Self {
            mode,
            tex: tex.into(),
        }
    }

    /// Encode this request into its wire form.
    pub fn encode(&self) -> Vec<u8> {
        encode_request(&self.tex, self.mode.is_display())
    }
}

/// Build the wire payload for `tex`: the mode byte, then the UTF-8 bytes.
///
/// The output is always `1 + tex.len()` bytes long.
pub fn encode_request(tex: &str, display: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + tex.len());
    buf.push(MathMode::from_display(display).as_byte());
    buf.extend_from_slice(tex.as_bytes());
    buf
}

/// Parse a request frame as received by a render server.
pub fn decode_request(bytes: &[u8]) -> Result<RenderRequest, ProtocolError> {
    let (&mode, tex) = bytes.split_first().ok_or(ProtocolError::EmptyRequest)?;
    let mode = MathMode::try_from(mode)?;
    let tex = String::from_utf8(tex.to_vec())?;
    Ok(RenderRequest { mode, tex })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_inline() {
        assert_eq!(encode_request("x^2", false), b"\x00x^2".to_vec());
    }

    #[test]
    fn test_encode_display() {
        assert_eq!(encode_request("\\frac{1}{2}", true), b"\x01\\frac{1}{2}".to_vec());
    }

    #[test]
    fn test_encode_empty_tex() {
        assert_eq!(encode_request("", true), vec![0x01]);
    }

    #[test]
    fn test_encoded_length_counts_utf8_bytes() {
        for tex in ["", "a", "x²", "\\alpha + β = γ", "∑_{i=0}^{n} i"] {
            for display in [false, true] {
                assert_eq!(encode_request(tex, display).len(), 1 + tex.len());
            }
        }
    }

    #[test]
    fn test_decode_reverses_encode() {
        for tex in ["", "x^2", "\\sqrt{x²}", "e^{iπ} + 1 = 0"] {
            for display in [false, true] {
                let decoded = decode_request(&encode_request(tex, display)).unwrap();
                assert_eq!(decoded.mode.is_display(), display);
                assert_eq!(decoded.tex, tex);
            }
        }
    }

    #[test]
    fn test_request_encode_matches_free_function() {
        let req = RenderRequest::new(MathMode::Display, "a+b");
        assert_eq!(req.encode(), encode_request("a+b", true));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode_request(&[]), Err(ProtocolError::EmptyRequest)));
    }

    #[test]
    fn test_decode_rejects_unknown_mode() {
        let err = decode_request(b"\x02x").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMode(2)));
        assert_eq!(err.to_string(), "unknown math mode byte 0x02");
    }

    #[test]
    fn test_mode_bytes() {
        assert_eq!(MathMode::Inline.as_byte(), 0x00);
        assert_eq!(MathMode::Display.as_byte(), 0x01);
        assert_eq!(MathMode::from_display(true), MathMode::Display);
        assert_eq!(MathMode::from_display(false), MathMode::Inline);
    }
}
