//! HMAC-SHA256 signing and verification for webhook bodies.
//!
//! Signatures are computed over the exact byte sequence that goes on the
//! wire, never a re-serialization, so key ordering and whitespace cannot
//! cause drift between sender and receiver. Verification fails closed and
//! compares digests in constant time.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Number of random bytes in a freshly minted signing secret.
const SECRET_BYTES: usize = 32;

/// Compute the signature header value for a request body.
///
/// Returns `"sha256=" + hex(HMAC-SHA256(secret, body))`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signature header value against a request body.
///
/// Fails closed: a missing prefix, bad hex, or a digest of the wrong length
/// all return `false`. The digest comparison is constant time.
pub fn verify(secret: &str, body: &[u8], provided: &str) -> bool {
    let Some(provided_hex) = provided.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(provided_bytes) = hex::decode(provided_hex) else {
        return false;
    };

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if provided_bytes.len() != expected.len() {
        return false;
    }
    provided_bytes.ct_eq(&expected).into()
}

/// Mint a fresh signing secret: 32 random bytes, hex-encoded.
///
/// This is the only place secrets are generated; registration calls it and
/// nothing else does.
pub fn generate_signing_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let secret = "super-secret";
        let body = br#"{"event":"agent.completed"}"#;
        let sig = sign(secret, body);
        assert!(sig.starts_with(SIGNATURE_PREFIX));
        assert!(verify(secret, body, &sig));
    }

    #[test]
    fn verify_fails_with_wrong_secret() {
        let body = br#"{"event":"agent.completed"}"#;
        let sig = sign("secret-1", body);
        assert!(!verify("secret-2", body, &sig));
    }

    #[test]
    fn verify_fails_on_tampered_body() {
        let secret = "super-secret";
        let sig = sign(secret, b"original body");
        assert!(!verify(secret, b"original bodY", &sig));
    }

    #[test]
    fn verify_fails_on_single_bit_flip_in_signature() {
        let secret = "super-secret";
        let body = b"payload bytes";
        let sig = sign(secret, body);

        // Change one hex digit at a time and confirm rejection.
        let hex_part = &sig[SIGNATURE_PREFIX.len()..];
        for i in 0..hex_part.len() {
            let mut chars: Vec<char> = hex_part.chars().collect();
            chars[i] = if chars[i] == '0' { '1' } else { '0' };
            let mutated: String = chars.iter().collect();
            assert!(!verify(secret, body, &format!("{}{}", SIGNATURE_PREFIX, mutated)));
        }
    }

    #[test]
    fn verify_never_panics_on_malformed_input() {
        let secret = "super-secret";
        let body = b"payload";
        let garbage = [
            "",
            "sha256=",
            "sha256=zzzz",
            "sha256=abc",
            "md5=deadbeef",
            "sha256",
            "sha256=deadbeef",
            "\u{0000}\u{ffff}",
            "sha256=uFFFD\u{fffd}",
        ];
        for g in garbage {
            assert!(!verify(secret, body, g));
        }
    }

    #[test]
    fn generated_secret_is_64_hex_chars() {
        let secret = generate_signing_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_secrets_are_unique() {
        assert_ne!(generate_signing_secret(), generate_signing_secret());
    }
}
