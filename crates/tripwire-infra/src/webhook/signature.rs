//! HMAC-SHA256 webhook signatures.
//!
//! The provider signs the raw request body with the shared secret and sends
//! the digest, hex or base64 encoded, in a configurable header. A `sha256=`
//! prefix on the header value is accepted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tripwire_types::config::SignatureEncoding;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid {0}")]
    Malformed(SignatureEncoding),

    #[error("signature does not match body")]
    Mismatch,

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Verify `provided` against the HMAC of `body`.
///
/// The digest comparison is constant time (`Mac::verify_slice`).
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    provided: &str,
    encoding: SignatureEncoding,
) -> Result<(), SignatureError> {
    let value = provided.trim();
    let value = value.strip_prefix("sha256=").unwrap_or(value);

    let expected = match encoding {
        SignatureEncoding::Hex => hex::decode(value).map_err(|_| SignatureError::Malformed(encoding))?,
        SignatureEncoding::Base64 => BASE64
            .decode(value)
            .map_err(|_| SignatureError::Malformed(encoding))?,
    };

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Compute the encoded signature a sender puts in the signature header for
/// `body`.
pub fn compute_signature(
    secret: &[u8],
    body: &[u8],
    encoding: SignatureEncoding,
) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(match encoding {
        SignatureEncoding::Hex => hex::encode(digest),
        SignatureEncoding::Base64 => BASE64.encode(digest),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"dialect-shared-secret";
    const BODY: &[u8] = br#"{"type":"token_price_change","data":{"token":{"symbol":"SOL"}}}"#;

    #[test]
    fn hex_signature_verifies() {
        let sig = compute_signature(SECRET, BODY, SignatureEncoding::Hex).unwrap();
        assert!(verify_signature(SECRET, BODY, &sig, SignatureEncoding::Hex).is_ok());
        assert!(
            verify_signature(SECRET, BODY, &format!("sha256={sig}"), SignatureEncoding::Hex).is_ok()
        );
    }

    #[test]
    fn base64_signature_verifies() {
        let sig = compute_signature(SECRET, BODY, SignatureEncoding::Base64).unwrap();
        assert!(verify_signature(SECRET, BODY, &sig, SignatureEncoding::Base64).is_ok());
        assert_eq!(
            verify_signature(SECRET, BODY, &sig, SignatureEncoding::Hex),
            Err(SignatureError::Malformed(SignatureEncoding::Hex))
        );
    }

    #[test]
    fn flipped_signature_is_rejected() {
        let sig = compute_signature(SECRET, BODY, SignatureEncoding::Hex).unwrap();
        let mut bytes = hex::decode(&sig).unwrap();
        bytes[0] ^= 0x01;
        let flipped = hex::encode(bytes);

        assert_eq!(
            verify_signature(SECRET, BODY, &flipped, SignatureEncoding::Hex),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_or_body_is_rejected() {
        let sig = compute_signature(SECRET, BODY, SignatureEncoding::Hex).unwrap();
        assert!(verify_signature(b"other", BODY, &sig, SignatureEncoding::Hex).is_err());
        assert!(verify_signature(SECRET, b"{}", &sig, SignatureEncoding::Hex).is_err());
    }

    #[test]
    fn rfc4231_vector_two() {
        let sig = compute_signature(b"Jefe", b"what do ya want for nothing?", SignatureEncoding::Hex)
            .unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
