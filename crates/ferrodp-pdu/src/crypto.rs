//! Standard RDP security ([MS-RDPBCGR] 5.3): key derivation, RC4 and FIPS
//! 3DES bulk encryption, MAC generation and the per-session re-keying policy.

use core::fmt;

use num_bigint::BigUint;

pub mod cert;
pub mod context;
pub mod keys;
pub mod rc4;

pub use self::context::SecurityContext;

#[derive(Debug)]
pub enum CryptoError {
    /// The MAC of a received payload did not verify.
    MacMismatch,
    /// The server certificate could not be parsed or carries no RSA key.
    InvalidCertificate(&'static str),
    /// The negotiated encryption method is not usable.
    UnsupportedEncryptionMethod,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacMismatch => write!(f, "MAC signature mismatch"),
            Self::InvalidCertificate(reason) => write!(f, "invalid server certificate: {reason}"),
            Self::UnsupportedEncryptionMethod => write!(f, "unsupported encryption method"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// An RSA public key in the little-endian layout RDP uses on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub modulus: Vec<u8>,
    pub exponent: u32,
}

/// Raw RSA public-key operation over little-endian buffers, as used for the
/// Security Exchange PDU and the licensing premaster secret.
///
/// The output is zero-padded to the modulus length.
pub fn rsa_public_encrypt(data: &[u8], key: &RsaPublicKey) -> Vec<u8> {
    let modulus = BigUint::from_bytes_le(&key.modulus);
    let exponent = BigUint::from(key.exponent);
    let message = BigUint::from_bytes_le(data);

    let mut encrypted = message.modpow(&exponent, &modulus).to_bytes_le();
    encrypted.resize(key.modulus.len(), 0);

    encrypted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_encrypt_identity_with_exponent_one() {
        // With e = 1 the operation reduces to m mod n.
        let key = RsaPublicKey {
            modulus: vec![0xFF, 0xFF, 0xFF, 0x7F],
            exponent: 1,
        };
        let encrypted = rsa_public_encrypt(&[0x42, 0x00, 0x00, 0x00], &key);
        assert_eq!(encrypted, vec![0x42, 0x00, 0x00, 0x00]);
    }
}
