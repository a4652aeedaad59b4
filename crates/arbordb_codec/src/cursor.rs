//! Opaque query cursors.

use crate::decoder::CanonicalDecoder;
use crate::encoder::CanonicalEncoder;
use crate::error::{CodecError, CodecResult};

/// A resumption point within one query's result ordering.
///
/// A cursor is only meaningful against the exact query shape that produced
/// it: `shape` fingerprints the (namespace, kind, ancestor, filters,
/// orders) tuple, and the store rejects a cursor whose fingerprint does
/// not match the query it is presented with. `offset` is the position
/// immediately after the last returned entity within the query's
/// deterministic total ordering.
///
/// The wire form is an opaque, URL-safe hex string; callers should treat
/// it as a black box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorToken {
    /// Fingerprint of the producing query's shape.
    pub shape: [u8; 8],
    /// Position to resume from.
    pub offset: u64,
}

impl CursorToken {
    /// Creates a cursor positioned at the start of a query's results.
    #[must_use]
    pub fn start(shape: [u8; 8]) -> Self {
        Self { shape, offset: 0 }
    }

    /// Encodes this cursor as an opaque, URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut encoder = CanonicalEncoder::new();
        encoder.array_header(2);
        encoder.bytes(&self.shape);
        encoder.uint(self.offset);
        hex::encode(encoder.into_bytes())
    }

    /// Decodes a token produced by [`CursorToken::encode`].
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::InvalidKeyFormat`] if the token is not
    /// valid hex or not a well-formed cursor.
    pub fn decode(token: &str) -> CodecResult<Self> {
        let bytes = hex::decode(token)
            .map_err(|e| CodecError::invalid_key_format(format!("invalid cursor token: {e}")))?;
        Self::from_bytes(&bytes)
            .map_err(|e| CodecError::invalid_key_format(format!("invalid cursor token: {e}")))
    }

    fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut decoder = CanonicalDecoder::new(bytes);
        if decoder.array_len()? != 2 {
            return Err(CodecError::invalid_structure(
                "cursor is not a [shape, offset] pair",
            ));
        }
        let shape_bytes = decoder.bytes()?;
        let shape: [u8; 8] = shape_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::invalid_structure("cursor shape must be 8 bytes"))?;
        let offset = decoder.uint()?;
        if !decoder.is_empty() {
            return Err(CodecError::invalid_structure(
                "trailing bytes after cursor",
            ));
        }
        Ok(Self { shape, offset })
    }
}
