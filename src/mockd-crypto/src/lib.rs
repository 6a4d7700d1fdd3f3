// src/lib.rs
use base64::{ engine::general_purpose::URL_SAFE_NO_PAD, Engine as _ };
use hmac::digest::{ KeyInit, Output };
use hmac::{ Hmac, Mac };
use sha2::{ Digest, Sha256, Sha512 };

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies exported payloads.
///
/// The signing key is derived from a passphrase through SHA-512, whose
/// 64-byte output is exactly one SHA-256 block, so HMAC takes it as is.
#[derive(Clone)]
pub struct MockdCrypto {
    key: Output<Sha512>,
}

impl MockdCrypto {
    pub fn new(passphrase: &str) -> Self {
        let normalized = passphrase.replace(['-', ' ', '_'], "");
        Self {
            key: Sha512::digest(normalized.as_bytes()),
        }
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as KeyInit>::new(&self.key)
    }

    /// HMAC-SHA256 of `payload`, url-safe base64 without padding.
    pub fn checksum(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of `checksum` against a fresh one.
    pub fn verify(&self, payload: &[u8], checksum: &str) -> bool {
        let Ok(expected) = URL_SAFE_NO_PAD.decode(checksum.trim()) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Plain SHA-256 fingerprint, handy for logging which payload was written.
    pub fn fingerprint(payload: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_and_verifies() {
        let crypto = MockdCrypto::new("mockd-export");
        let a = crypto.checksum(br#"[{"name":"a"}]"#);
        let b = crypto.checksum(br#"[{"name":"a"}]"#);
        assert_eq!(a, b);
        assert!(crypto.verify(br#"[{"name":"a"}]"#, &a));
    }

    #[test]
    fn single_byte_change_fails_verification() {
        let crypto = MockdCrypto::new("mockd-export");
        let sum = crypto.checksum(b"port:3000");
        assert!(!crypto.verify(b"port:3001", &sum));
    }

    #[test]
    fn garbage_checksum_is_rejected() {
        let crypto = MockdCrypto::new("mockd-export");
        assert!(!crypto.verify(b"payload", "not base64 !!"));
        assert!(!crypto.verify(b"payload", ""));
    }

    #[test]
    fn different_passphrases_disagree() {
        let a = MockdCrypto::new("one");
        let b = MockdCrypto::new("two");
        let sum = a.checksum(b"payload");
        assert!(!b.verify(b"payload", &sum));
    }

    #[test]
    fn passphrase_separators_are_ignored() {
        let a = MockdCrypto::new("mockd-export");
        let b = MockdCrypto::new("mockd_export");
        assert_eq!(a.checksum(b"x"), b.checksum(b"x"));
    }
}
