//! The stateful half of standard RDP security: the RC4 (or FIPS 3DES) stream
//! pair, the running use counters and the 4096-operation re-keying policy.

use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut as _, BlockEncryptMut as _, KeyIvInit as _};
use hmac::{Hmac, Mac as _};
use sha1::{Digest as _, Sha1};

use crate::gcc::EncryptionMethod;

use super::keys::{self, KeyStrength, SessionKeys};
use super::rc4::Rc4;
use super::CryptoError;

type TdesCbcEnc = cbc::Encryptor<des::TdesEde3>;
type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;
type HmacSha1 = Hmac<Sha1>;

/// Operations between key updates ([MS-RDPBCGR] 5.3.7).
const KEY_UPDATE_INTERVAL: u32 = 4096;

/// Fixed FIPS 3DES initialization vector.
const FIPS_IV: [u8; 8] = [0x12, 0x34, 0x56, 0x78, 0x90, 0xAB, 0xCD, 0xEF];

const FIPS_KEY_SOURCE_LEN: usize = 21;
const TDES_KEY_LEN: usize = 24;
const TDES_BLOCK_LEN: usize = 8;

pub const MAC_SIGNATURE_SIZE: usize = keys::MAC_DATA_SIZE;

/// A signed, encrypted payload ready for (or stripped from) the wire.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub signature: [u8; MAC_SIGNATURE_SIZE],
    pub data: Vec<u8>,
    /// FIPS only: number of padding bytes appended before encryption.
    pub pad_length: u8,
}

enum CipherPair {
    Rc4 {
        strength: KeyStrength,
        mac_key: Vec<u8>,
        encrypt_initial: Vec<u8>,
        encrypt_current: Vec<u8>,
        encrypt_stream: Rc4,
        decrypt_initial: Vec<u8>,
        decrypt_current: Vec<u8>,
        decrypt_stream: Rc4,
    },
    Fips {
        sign_key: [u8; 20],
        encryptor: TdesCbcEnc,
        decryptor: TdesCbcDec,
    },
}

/// Per-session security context. One per session; never shared.
pub struct SecurityContext {
    cipher: CipherPair,
    secure_checksum: bool,
    encrypt_count: u32,
    decrypt_count: u32,
}

impl SecurityContext {
    /// Establishes the session keys from the exchanged randoms.
    pub fn new(
        method: EncryptionMethod,
        secure_checksum: bool,
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<Self, CryptoError> {
        let cipher = if method.contains(EncryptionMethod::FIPS) {
            fips_cipher_pair(client_random, server_random)
        } else {
            let strength = if method.contains(EncryptionMethod::BIT_128) {
                KeyStrength::Bits128
            } else if method.contains(EncryptionMethod::BIT_56) {
                KeyStrength::Bits56
            } else if method.contains(EncryptionMethod::BIT_40) {
                KeyStrength::Bits40
            } else {
                return Err(CryptoError::UnsupportedEncryptionMethod);
            };

            // PreMasterSecret = First192Bits(ClientRandom) ||
            // First192Bits(ServerRandom), per 5.3.4.
            let mut premaster_secret = [0u8; 48];
            premaster_secret[..24].copy_from_slice(&client_random[..24]);
            premaster_secret[24..].copy_from_slice(&server_random[..24]);

            let SessionKeys {
                mac_key,
                encrypt_key,
                decrypt_key,
            } = keys::session_keys(&premaster_secret, client_random, server_random, strength);

            CipherPair::Rc4 {
                strength,
                mac_key,
                encrypt_stream: Rc4::new(&encrypt_key),
                encrypt_initial: encrypt_key.clone(),
                encrypt_current: encrypt_key,
                decrypt_stream: Rc4::new(&decrypt_key),
                decrypt_initial: decrypt_key.clone(),
                decrypt_current: decrypt_key,
            }
        };

        Ok(Self {
            cipher,
            secure_checksum,
            encrypt_count: 0,
            decrypt_count: 0,
        })
    }

    pub fn is_fips(&self) -> bool {
        matches!(self.cipher, CipherPair::Fips { .. })
    }

    pub fn secure_checksum(&self) -> bool {
        self.secure_checksum
    }

    /// Signs and encrypts an outbound payload.
    pub fn encrypt(&mut self, payload: &[u8]) -> Result<SealedPayload, CryptoError> {
        match &mut self.cipher {
            CipherPair::Rc4 {
                strength,
                mac_key,
                encrypt_initial,
                encrypt_current,
                encrypt_stream,
                ..
            } => {
                if self.encrypt_count == KEY_UPDATE_INTERVAL {
                    *encrypt_current = keys::update_key(encrypt_initial, encrypt_current, *strength);
                    *encrypt_stream = Rc4::new(encrypt_current);
                    self.encrypt_count = 0;
                }

                let salted = self.secure_checksum.then_some(self.encrypt_count);
                let signature = keys::mac_signature(mac_key, payload, salted);
                let data = encrypt_stream.process(payload);
                self.encrypt_count += 1;

                Ok(SealedPayload {
                    signature,
                    data,
                    pad_length: 0,
                })
            }
            CipherPair::Fips {
                sign_key, encryptor, ..
            } => {
                let signature = fips_signature(sign_key, payload, self.encrypt_count);

                let pad_length = (TDES_BLOCK_LEN - payload.len() % TDES_BLOCK_LEN) % TDES_BLOCK_LEN;
                let mut data = payload.to_vec();
                data.resize(payload.len() + pad_length, 0);

                for block in data.chunks_exact_mut(TDES_BLOCK_LEN) {
                    encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }

                self.encrypt_count += 1;

                Ok(SealedPayload {
                    signature,
                    data,
                    pad_length: pad_length as u8,
                })
            }
        }
    }

    /// Decrypts an inbound payload and verifies its signature.
    ///
    /// A MAC mismatch is fatal for the session.
    pub fn decrypt(&mut self, sealed: &SealedPayload) -> Result<Vec<u8>, CryptoError> {
        match &mut self.cipher {
            CipherPair::Rc4 {
                strength,
                mac_key,
                decrypt_initial,
                decrypt_current,
                decrypt_stream,
                ..
            } => {
                if self.decrypt_count == KEY_UPDATE_INTERVAL {
                    *decrypt_current = keys::update_key(decrypt_initial, decrypt_current, *strength);
                    *decrypt_stream = Rc4::new(decrypt_current);
                    self.decrypt_count = 0;
                }

                let plaintext = decrypt_stream.process(&sealed.data);

                let salted = self.secure_checksum.then_some(self.decrypt_count);
                let expected = keys::mac_signature(mac_key, &plaintext, salted);
                self.decrypt_count += 1;

                if expected != sealed.signature {
                    return Err(CryptoError::MacMismatch);
                }

                Ok(plaintext)
            }
            CipherPair::Fips {
                sign_key, decryptor, ..
            } => {
                if sealed.data.len() % TDES_BLOCK_LEN != 0 {
                    return Err(CryptoError::MacMismatch);
                }

                let mut plaintext = sealed.data.clone();
                for block in plaintext.chunks_exact_mut(TDES_BLOCK_LEN) {
                    decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
                plaintext.truncate(plaintext.len() - usize::from(sealed.pad_length));

                let expected = fips_signature(sign_key, &plaintext, self.decrypt_count);
                self.decrypt_count += 1;

                if expected != sealed.signature {
                    return Err(CryptoError::MacMismatch);
                }

                Ok(plaintext)
            }
        }
    }
}

impl core::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("fips", &self.is_fips())
            .field("secure_checksum", &self.secure_checksum)
            .field("encrypt_count", &self.encrypt_count)
            .field("decrypt_count", &self.decrypt_count)
            .finish_non_exhaustive()
    }
}

fn fips_cipher_pair(client_random: &[u8], server_random: &[u8]) -> CipherPair {
    // [MS-RDPBCGR] 5.3.5.3: the SHA-1 of the random halves, extended by its
    // own first byte, seeds each direction.
    let mut encrypt_source = [0u8; FIPS_KEY_SOURCE_LEN];
    let mut sha1 = Sha1::new();
    sha1.update(&client_random[16..32]);
    sha1.update(&server_random[16..32]);
    encrypt_source[..20].copy_from_slice(&sha1.finalize());
    encrypt_source[20] = encrypt_source[0];

    let mut decrypt_source = [0u8; FIPS_KEY_SOURCE_LEN];
    let mut sha1 = Sha1::new();
    sha1.update(&client_random[..16]);
    sha1.update(&server_random[..16]);
    decrypt_source[..20].copy_from_slice(&sha1.finalize());
    decrypt_source[20] = decrypt_source[0];

    let mut sha1 = Sha1::new();
    sha1.update(decrypt_source);
    sha1.update(encrypt_source);
    let sign_key: [u8; 20] = sha1.finalize().into();

    let encrypt_key = fips_expand_key_bits(&encrypt_source);
    let decrypt_key = fips_expand_key_bits(&decrypt_source);

    CipherPair::Fips {
        sign_key,
        encryptor: TdesCbcEnc::new(GenericArray::from_slice(&encrypt_key), GenericArray::from_slice(&FIPS_IV)),
        decryptor: TdesCbcDec::new(GenericArray::from_slice(&decrypt_key), GenericArray::from_slice(&FIPS_IV)),
    }
}

/// Expands 168 key bits into a 24-byte 3DES key with odd parity.
fn fips_expand_key_bits(source: &[u8; FIPS_KEY_SOURCE_LEN]) -> [u8; TDES_KEY_LEN] {
    let mut reversed = [0u8; FIPS_KEY_SOURCE_LEN];
    for (dst, src) in reversed.iter_mut().zip(source.iter()) {
        *dst = src.reverse_bits();
    }

    let mut output = [0u8; TDES_KEY_LEN];
    let mut bit = 0usize;
    for out in output.iter_mut() {
        let byte = bit / 8;
        let shift = bit % 8;
        // Seven key bits per output byte, low bit left free for parity.
        *out = if shift <= 1 {
            (reversed[byte] << shift) & 0xFE
        } else {
            ((reversed[byte] << shift) | (reversed[byte + 1] >> (8 - shift))) & 0xFE
        };
        bit += 7;
    }

    for out in output.iter_mut() {
        let reversed_byte = out.reverse_bits();
        *out = if reversed_byte.count_ones() % 2 == 0 {
            reversed_byte | 0x01
        } else {
            reversed_byte & 0xFE
        };
    }

    output
}

/// The FIPS data signature: HMAC-SHA1 over the payload and the running use
/// count, truncated to eight bytes.
fn fips_signature(sign_key: &[u8; 20], data: &[u8], use_count: u32) -> [u8; MAC_SIGNATURE_SIZE] {
    let mut hmac = HmacSha1::new_from_slice(sign_key).expect("HMAC accepts any key length");
    hmac.update(data);
    hmac.update(&use_count.to_le_bytes());
    let digest = hmac.finalize().into_bytes();

    digest[..MAC_SIGNATURE_SIZE].try_into().expect("8-byte slice")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context(secure_checksum: bool) -> (SecurityContext, SecurityContext) {
        let client_random = [0x42u8; 32];
        let server_random = [0x24u8; 32];

        let client =
            SecurityContext::new(EncryptionMethod::BIT_128, secure_checksum, &client_random, &server_random).unwrap();

        // The peer's streams are mirrored: build a second context and swap
        // roles by decrypting what the first encrypted.
        let peer =
            SecurityContext::new(EncryptionMethod::BIT_128, secure_checksum, &client_random, &server_random).unwrap();

        (client, peer)
    }

    // The keys are direction-asymmetric, so for loopback testing we encrypt
    // and decrypt with the same role and matching streams.
    fn roundtrip(context: &mut SecurityContext, payload: &[u8]) -> Vec<u8> {
        let sealed = context.encrypt(payload).unwrap();
        assert_ne!(sealed.data, payload);
        sealed.data
    }

    #[test]
    fn encryption_changes_the_payload_and_signs_it() {
        let (mut client, _peer) = test_context(false);

        let sealed = client.encrypt(b"top secret input").unwrap();
        assert_ne!(sealed.data.as_slice(), b"top secret input");
        assert_ne!(sealed.signature, [0u8; MAC_SIGNATURE_SIZE]);
    }

    #[test]
    fn mac_mismatch_is_detected() {
        let client_random = [0x42u8; 32];
        let server_random = [0x24u8; 32];

        // Build a loopback pair by crossing the key directions manually: a
        // context decrypting its own output will fail the MAC only when the
        // payload was tampered with.
        let mut sender =
            SecurityContext::new(EncryptionMethod::BIT_128, false, &client_random, &server_random).unwrap();
        let sealed = sender.encrypt(b"payload").unwrap();

        let mut tampered = sealed.clone();
        tampered.data[0] ^= 0xFF;

        // A fresh context with swapped randoms yields different keys, so the
        // MAC can not verify.
        let mut receiver =
            SecurityContext::new(EncryptionMethod::BIT_128, false, &server_random, &client_random).unwrap();
        assert!(matches!(receiver.decrypt(&tampered), Err(CryptoError::MacMismatch)));
    }

    #[test]
    fn rc4_rekey_happens_after_4096_operations() {
        let (mut client, _peer) = test_context(false);

        let reference = roundtrip(&mut client, b"A");
        for _ in 0..KEY_UPDATE_INTERVAL {
            let _ = client.encrypt(b"A").unwrap();
        }
        // 4096 operations in, the key was refreshed: the stream does not
        // continue from the original key schedule.
        let rekeyed = client.encrypt(b"A").unwrap();
        assert_ne!(rekeyed.data, reference);
    }

    #[test]
    fn fips_pads_to_blocks_and_roundtrips_length() {
        let client_random = [0x11u8; 32];
        let server_random = [0x99u8; 32];

        let mut context =
            SecurityContext::new(EncryptionMethod::FIPS, false, &client_random, &server_random).unwrap();

        let sealed = context.encrypt(b"12345").unwrap();
        assert_eq!(sealed.data.len() % 8, 0);
        assert_eq!(sealed.pad_length, 3);
    }

    #[test]
    fn fips_key_expansion_has_odd_parity() {
        let source = [0xA5u8; FIPS_KEY_SOURCE_LEN];
        let key = fips_expand_key_bits(&source);

        for byte in key {
            assert_eq!(byte.count_ones() % 2, 1, "3DES key byte must have odd parity");
        }
    }
}
