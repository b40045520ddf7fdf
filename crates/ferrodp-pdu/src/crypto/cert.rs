//! Server certificate parsing ([MS-RDPBCGR] 2.2.1.4.3.1): either the RDP
//! proprietary format or an X.509 chain; both yield the RSA public key used
//! for the Security Exchange and licensing premaster encryption.

use ferrodp_core::ReadCursor;
use pkcs1::der::Decode as _;
use x509_cert::der::Decode as _;

use super::{CryptoError, RsaPublicKey};

const CERT_CHAIN_VERSION_1: u32 = 1;
const CERT_CHAIN_VERSION_2: u32 = 2;
const CERT_CHAIN_VERSION_MASK: u32 = 0x7FFF_FFFF;

const SIGNATURE_ALG_RSA: u32 = 0x0000_0001;
const KEY_EXCHANGE_ALG_RSA: u32 = 0x0000_0001;
const PUBLIC_KEY_BLOB: u16 = 0x0006;
const RSA_MAGIC: u32 = 0x3141_5352; // "RSA1"

/// Extracts the RSA public key from a server certificate blob.
pub fn extract_rsa_public_key(server_cert: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    if server_cert.len() < 4 {
        return Err(CryptoError::InvalidCertificate("truncated certificate blob"));
    }

    let mut src = ReadCursor::new(server_cert);
    let version = src.read_u32() & CERT_CHAIN_VERSION_MASK;

    match version {
        CERT_CHAIN_VERSION_1 => parse_proprietary(&mut src),
        CERT_CHAIN_VERSION_2 => parse_x509_chain(&mut src),
        _ => Err(CryptoError::InvalidCertificate("unknown certificate chain version")),
    }
}

/// PROPRIETARYSERVERCERTIFICATE ([MS-RDPBCGR] 2.2.1.4.3.1.1).
fn parse_proprietary(src: &mut ReadCursor<'_>) -> Result<RsaPublicKey, CryptoError> {
    if src.len() < 4 + 4 + 2 + 2 {
        return Err(CryptoError::InvalidCertificate("truncated proprietary certificate"));
    }

    let sig_alg_id = src.read_u32();
    let key_alg_id = src.read_u32();

    if sig_alg_id != SIGNATURE_ALG_RSA || key_alg_id != KEY_EXCHANGE_ALG_RSA {
        return Err(CryptoError::InvalidCertificate("not an RSA certificate"));
    }

    let blob_type = src.read_u16();
    let blob_len = usize::from(src.read_u16());

    if blob_type != PUBLIC_KEY_BLOB || src.len() < blob_len {
        return Err(CryptoError::InvalidCertificate("invalid public key blob"));
    }

    // RSA_PUBLIC_KEY
    if blob_len < 4 * 5 {
        return Err(CryptoError::InvalidCertificate("truncated RSA public key"));
    }

    let magic = src.read_u32();
    let keylen = src.read_u32() as usize;
    let bitlen = src.read_u32() as usize;
    let _datalen = src.read_u32();
    let exponent = src.read_u32();

    if magic != RSA_MAGIC {
        return Err(CryptoError::InvalidCertificate("bad RSA1 magic"));
    }

    let modulus_len = bitlen / 8;
    // keylen includes eight bytes of zero padding after the modulus.
    if keylen < modulus_len || src.len() < keylen {
        return Err(CryptoError::InvalidCertificate("inconsistent RSA key lengths"));
    }

    let modulus = src.read_slice(keylen)[..modulus_len].to_vec();

    Ok(RsaPublicKey { modulus, exponent })
}

/// X509 certificate chain ([MS-RDPBCGR] 2.2.1.4.3.1.2): the leaf (last)
/// certificate carries the key.
fn parse_x509_chain(src: &mut ReadCursor<'_>) -> Result<RsaPublicKey, CryptoError> {
    if src.len() < 4 {
        return Err(CryptoError::InvalidCertificate("truncated X.509 chain"));
    }

    let num_certs = src.read_u32();
    if num_certs == 0 || num_certs > 16 {
        return Err(CryptoError::InvalidCertificate("invalid X.509 chain length"));
    }

    let mut leaf_der: Option<&[u8]> = None;
    for _ in 0..num_certs {
        if src.len() < 4 {
            return Err(CryptoError::InvalidCertificate("truncated X.509 chain"));
        }
        let cert_len = src.read_u32() as usize;
        if src.len() < cert_len {
            return Err(CryptoError::InvalidCertificate("truncated X.509 certificate"));
        }
        leaf_der = Some(src.read_slice(cert_len));
    }

    let leaf_der = leaf_der.ok_or(CryptoError::InvalidCertificate("empty X.509 chain"))?;

    let certificate = x509_cert::Certificate::from_der(leaf_der)
        .map_err(|_| CryptoError::InvalidCertificate("malformed X.509 certificate"))?;

    let spki_bits = certificate
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or(CryptoError::InvalidCertificate("unaligned public key bit string"))?;

    let rsa_key = pkcs1::RsaPublicKey::from_der(spki_bits)
        .map_err(|_| CryptoError::InvalidCertificate("public key is not PKCS#1 RSA"))?;

    // DER integers are big-endian with a possible leading zero; the RDP wire
    // layout wants raw little-endian.
    let mut modulus = rsa_key.modulus.as_bytes().to_vec();
    if modulus.first() == Some(&0) {
        modulus.remove(0);
    }
    modulus.reverse();

    let exponent_bytes = rsa_key.public_exponent.as_bytes();
    if exponent_bytes.len() > 4 {
        return Err(CryptoError::InvalidCertificate("oversized public exponent"));
    }
    let mut exponent = 0u32;
    for &byte in exponent_bytes {
        exponent = (exponent << 8) | u32::from(byte);
    }

    Ok(RsaPublicKey { modulus, exponent })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proprietary_cert(modulus: &[u8], exponent: u32) -> Vec<u8> {
        let keylen = modulus.len() + 8;
        let mut cert = Vec::new();
        cert.extend_from_slice(&CERT_CHAIN_VERSION_1.to_le_bytes());
        cert.extend_from_slice(&SIGNATURE_ALG_RSA.to_le_bytes());
        cert.extend_from_slice(&KEY_EXCHANGE_ALG_RSA.to_le_bytes());
        cert.extend_from_slice(&PUBLIC_KEY_BLOB.to_le_bytes());
        cert.extend_from_slice(&((4 * 5 + keylen) as u16).to_le_bytes());
        cert.extend_from_slice(&RSA_MAGIC.to_le_bytes());
        cert.extend_from_slice(&(keylen as u32).to_le_bytes());
        cert.extend_from_slice(&((modulus.len() * 8) as u32).to_le_bytes());
        cert.extend_from_slice(&((modulus.len() - 1) as u32).to_le_bytes());
        cert.extend_from_slice(&exponent.to_le_bytes());
        cert.extend_from_slice(modulus);
        cert.extend_from_slice(&[0u8; 8]);
        cert
    }

    #[test]
    fn proprietary_certificate_yields_the_key() {
        let modulus = [0xAB; 64];
        let cert = proprietary_cert(&modulus, 0x10001);

        let key = extract_rsa_public_key(&cert).unwrap();
        assert_eq!(key.modulus, modulus);
        assert_eq!(key.exponent, 0x10001);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cert = proprietary_cert(&[0xAB; 64], 0x10001);
        cert[16] = 0; // corrupt the RSA1 magic
        assert!(extract_rsa_public_key(&cert).is_err());
    }
}
