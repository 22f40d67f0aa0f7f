//! Handshake accept-token digest.
//!
//! `base64(SHA-1(key ‖ magic))`, standard alphabet with padding. The key is
//! hashed first, then the protocol magic, both as raw UTF-8 bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::error::BridgeError;

/// Required length of a protocol magic constant, in bytes.
pub const MAGIC_LEN: usize = 36;

/// Compute the accept token for a client-supplied key.
pub fn compute_accept_token(magic: &str, key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(magic.as_bytes());
    STANDARD.encode(sha1.finalize())
}

/// Digest bound to one protocol family's magic.
///
/// Construction validates the magic, so a bad constant fails bridge
/// start-up instead of surfacing as a per-request rejection.
#[derive(Debug, Clone)]
pub struct DigestEngine {
    magic: String,
}

impl DigestEngine {
    pub fn new(protocol: &str, magic: impl Into<String>) -> Result<Self, BridgeError> {
        let magic = magic.into();
        if magic.len() != MAGIC_LEN || !magic.is_ascii() {
            return Err(BridgeError::InvalidMagic {
                protocol: protocol.to_string(),
                len: magic.len(),
            });
        }
        Ok(Self { magic })
    }

    pub fn accept_token(&self, key: &str) -> String {
        compute_accept_token(&self.magic, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    #[test]
    fn standard_upgrade_vector() {
        assert_eq!(
            compute_accept_token(WS_MAGIC, "dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn token_is_deterministic_and_decodes_to_sha1_length() {
        for key in ["", "a", "some-client-key", "ключ"] {
            let first = compute_accept_token(WS_MAGIC, key);
            let second = compute_accept_token(WS_MAGIC, key);
            assert_eq!(first, second);
            assert_eq!(STANDARD.decode(&first).unwrap().len(), 20);
        }
    }

    #[test]
    fn engine_rejects_short_magic() {
        let err = DigestEngine::new("proto", "too-short").unwrap_err();
        assert_eq!(
            err,
            BridgeError::InvalidMagic { protocol: "proto".into(), len: 9 }
        );
    }

    #[test]
    fn engine_matches_free_function() {
        let engine = DigestEngine::new("proto", WS_MAGIC).unwrap();
        assert_eq!(
            engine.accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }
}
