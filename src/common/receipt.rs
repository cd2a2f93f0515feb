use crate::{AckError, Result};
use std::fmt;
use std::net::SocketAddr;

/// A payload a server accepted and acknowledged
///
/// Its `Display` form is the line the server prints for each message:
///
/// ```
/// use acksrv::Receipt;
///
/// let receipt = Receipt {
///     peer: "127.0.0.1:50000".parse().unwrap(),
///     payload: "ABCDEF".to_string(),
/// };
/// assert_eq!(receipt.to_string(), "[*] Received from 127.0.0.1:50000: ABCDEF");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Address the payload came from
    pub peer: SocketAddr,
    /// Decoded payload
    pub payload: String,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[*] Received from {}: {}", self.peer, self.payload)
    }
}

/// How a server turns received bytes into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoding {
    /// Invalid UTF-8 fails the handler and no reply is sent
    #[default]
    Strict,
    /// Invalid sequences are replaced with U+FFFD
    Lossy,
}

impl Decoding {
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Decoding::Strict => String::from_utf8(bytes.to_vec()).map_err(AckError::Utf8),
            Decoding::Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_rejects_invalid_utf8() {
        assert!(matches!(
            Decoding::Strict.decode(&[0xff, 0xfe]),
            Err(AckError::Utf8(_))
        ));
        assert_eq!(Decoding::Strict.decode(b"ABCDEF").unwrap(), "ABCDEF");
    }

    #[test]
    fn test_lossy_replaces_invalid_utf8() {
        assert_eq!(Decoding::Lossy.decode(b"AB\xffC").unwrap(), "AB\u{fffd}C");
    }
}
