//! Key derivation and MAC generation for standard RDP security
//! ([MS-RDPBCGR] 5.3.4, 5.3.5, 5.3.6, 5.3.7).

use md5::{Digest as _, Md5};
use sha1::Sha1;

use super::rc4::Rc4;

pub const RANDOM_SIZE: usize = 32;
pub const PREMASTER_SECRET_SIZE: usize = 48;
pub const SESSION_KEY_BLOB_SIZE: usize = 48;
pub const MAC_SIZE: usize = 16;
pub const MAC_DATA_SIZE: usize = 8;

const PAD1: [u8; 40] = [0x36; 40];
const PAD2: [u8; 48] = [0x5C; 48];

/// Salt bytes overwriting the head of reduced-strength keys.
const SALT_40BIT: [u8; 3] = [0xD1, 0x26, 0x9E];
const SALT_56BIT: [u8; 1] = [0xD1];

/// `SaltedHash(S, I) = MD5(S || SHA1(I || S || ClientRandom || ServerRandom))`
fn salted_hash(salt: &[u8], input: &[u8], client_random: &[u8], server_random: &[u8]) -> [u8; 16] {
    let mut sha1 = Sha1::new();
    sha1.update(input);
    sha1.update(salt);
    sha1.update(client_random);
    sha1.update(server_random);
    let sha1_digest = sha1.finalize();

    let mut md5 = Md5::new();
    md5.update(salt);
    md5.update(sha1_digest);
    md5.finalize().into()
}

/// `MasterSecret = PreMasterHash("A") || PreMasterHash("BB") || PreMasterHash("CCC")`
pub fn master_secret(premaster_secret: &[u8], client_random: &[u8], server_random: &[u8]) -> [u8; 48] {
    let mut output = [0u8; 48];
    output[0..16].copy_from_slice(&salted_hash(premaster_secret, b"A", client_random, server_random));
    output[16..32].copy_from_slice(&salted_hash(premaster_secret, b"BB", client_random, server_random));
    output[32..48].copy_from_slice(&salted_hash(premaster_secret, b"CCC", client_random, server_random));
    output
}

/// `SessionKeyBlob = MasterHash("A") || MasterHash("BB") || MasterHash("CCC")`
pub fn session_key_blob(master_secret: &[u8], client_random: &[u8], server_random: &[u8]) -> [u8; 48] {
    let mut output = [0u8; 48];
    output[0..16].copy_from_slice(&salted_hash(master_secret, b"A", client_random, server_random));
    output[16..32].copy_from_slice(&salted_hash(master_secret, b"BB", client_random, server_random));
    output[32..48].copy_from_slice(&salted_hash(master_secret, b"CCC", client_random, server_random));
    output
}

/// `MacSaltKey = First128Bits(SessionKeyBlob)`
pub fn mac_salt_key(session_key_blob: &[u8]) -> [u8; 16] {
    session_key_blob[0..16].try_into().expect("16-byte slice")
}

/// `LicensingEncryptionKey = MD5(Second128Bits(SessionKeyBlob) || ClientRandom || ServerRandom)`
pub fn licensing_encryption_key(session_key_blob: &[u8], client_random: &[u8], server_random: &[u8]) -> [u8; 16] {
    let mut md5 = Md5::new();
    md5.update(&session_key_blob[16..32]);
    md5.update(client_random);
    md5.update(server_random);
    md5.finalize().into()
}

/// `FinalHash(K) = MD5(K || ClientRandom || ServerRandom)`
fn final_hash(key: &[u8], client_random: &[u8], server_random: &[u8]) -> [u8; 16] {
    let mut md5 = Md5::new();
    md5.update(key);
    md5.update(client_random);
    md5.update(server_random);
    md5.finalize().into()
}

/// The negotiated non-FIPS key strength.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyStrength {
    Bits40,
    Bits56,
    Bits128,
}

impl KeyStrength {
    /// Effective RC4 key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Bits40 | Self::Bits56 => 8,
            Self::Bits128 => 16,
        }
    }

    /// Overwrites the key head with the well-known salt of the reduced
    /// strengths; no-op for 128-bit keys.
    pub fn apply_salt(self, key: &mut [u8]) {
        match self {
            Self::Bits40 => key[..SALT_40BIT.len()].copy_from_slice(&SALT_40BIT),
            Self::Bits56 => key[..SALT_56BIT.len()].copy_from_slice(&SALT_56BIT),
            Self::Bits128 => {}
        }
    }
}

/// The non-FIPS session keys of [MS-RDPBCGR] 5.3.5.1, from the client's
/// point of view.
#[derive(Clone)]
pub struct SessionKeys {
    pub mac_key: Vec<u8>,
    pub encrypt_key: Vec<u8>,
    pub decrypt_key: Vec<u8>,
}

pub fn session_keys(
    premaster_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    strength: KeyStrength,
) -> SessionKeys {
    let master = master_secret(premaster_secret, client_random, server_random);
    let blob = session_key_blob(&master, client_random, server_random);

    let mut mac_key = blob[0..16].to_vec();
    // Client decrypt key = InitialServerEncryptKey, client encrypt key =
    // InitialServerDecryptKey.
    let mut decrypt_key = final_hash(&blob[16..32], client_random, server_random).to_vec();
    let mut encrypt_key = final_hash(&blob[32..48], client_random, server_random).to_vec();

    let key_len = strength.key_len();
    mac_key.truncate(key_len);
    encrypt_key.truncate(key_len);
    decrypt_key.truncate(key_len);

    strength.apply_salt(&mut mac_key);
    strength.apply_salt(&mut encrypt_key);
    strength.apply_salt(&mut decrypt_key);

    SessionKeys {
        mac_key,
        encrypt_key,
        decrypt_key,
    }
}

/// The RDP MAC over a payload ([MS-RDPBCGR] 5.3.6.1), full 16-byte form as
/// used by licensing.
pub fn mac_data(mac_salt_key: &[u8], data: &[u8]) -> [u8; MAC_SIZE] {
    let length = (data.len() as u32).to_le_bytes();

    let mut sha1 = Sha1::new();
    sha1.update(mac_salt_key);
    sha1.update(PAD1);
    sha1.update(length);
    sha1.update(data);
    let sha1_digest = sha1.finalize();

    let mut md5 = Md5::new();
    md5.update(mac_salt_key);
    md5.update(PAD2);
    md5.update(sha1_digest);
    md5.finalize().into()
}

/// The 8-byte data signature placed in the security header.
///
/// With `salted_count` set, the running encryption counter is mixed in (the
/// "salted MAC" negotiated through the secure-checksum capability).
pub fn mac_signature(mac_key: &[u8], data: &[u8], salted_count: Option<u32>) -> [u8; MAC_DATA_SIZE] {
    let length = (data.len() as u32).to_le_bytes();

    let mut sha1 = Sha1::new();
    sha1.update(mac_key);
    sha1.update(PAD1);
    sha1.update(length);
    sha1.update(data);
    if let Some(count) = salted_count {
        sha1.update(count.to_le_bytes());
    }
    let sha1_digest = sha1.finalize();

    let mut md5 = Md5::new();
    md5.update(mac_key);
    md5.update(PAD2);
    md5.update(sha1_digest);
    let digest: [u8; 16] = md5.finalize().into();

    digest[..MAC_DATA_SIZE].try_into().expect("8-byte slice")
}

/// The key-update function of [MS-RDPBCGR] 5.3.7, applied after 4096
/// encryptions or decryptions.
pub fn update_key(initial_key: &[u8], current_key: &[u8], strength: KeyStrength) -> Vec<u8> {
    let mut sha1 = Sha1::new();
    sha1.update(initial_key);
    sha1.update(PAD1);
    sha1.update(current_key);
    let sha1_digest = sha1.finalize();

    let mut md5 = Md5::new();
    md5.update(initial_key);
    md5.update(PAD2);
    md5.update(sha1_digest);
    let temp_key: [u8; 16] = md5.finalize().into();

    let key_len = strength.key_len();
    let mut new_key = Rc4::new(&temp_key[..key_len]).process(&temp_key[..key_len]);
    strength.apply_salt(&mut new_key);

    new_key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_randoms() -> ([u8; RANDOM_SIZE], [u8; RANDOM_SIZE]) {
        ([0x00; RANDOM_SIZE], [0x01; RANDOM_SIZE])
    }

    // Fixed vectors for the [MS-RDPBCGR] 5.3.5 derivation chain with
    // ClientRandom = 0x00 repeated (32 bytes), ServerRandom = 0x01 repeated
    // (32 bytes) and PreMasterSecret = First192Bits(ClientRandom) ||
    // First192Bits(ServerRandom) per 5.3.4.

    const MASTER_SECRET: [u8; 48] = [
        0x02, 0x8D, 0x73, 0x07, 0x66, 0x5E, 0x5E, 0x30,
        0xCE, 0xD4, 0xC7, 0xB3, 0x0C, 0xF8, 0x79, 0x79,
        0xE0, 0x1F, 0xAB, 0xCC, 0xD5, 0xB8, 0xB7, 0x0C,
        0x33, 0x35, 0xAA, 0x7C, 0xD1, 0xAD, 0x28, 0xE1,
        0xB4, 0x46, 0x52, 0xF7, 0xDF, 0x16, 0x7F, 0xE8,
        0x30, 0x2E, 0xFC, 0xC9, 0x01, 0x0F, 0xB6, 0x86,
    ];

    const SESSION_KEY_BLOB: [u8; 48] = [
        0xDB, 0x92, 0xB4, 0xF3, 0xE4, 0xE9, 0x97, 0x99,
        0xA2, 0x2D, 0x0F, 0x8C, 0xBE, 0x00, 0xDE, 0x67,
        0x8B, 0xB7, 0x6F, 0x86, 0xA5, 0x60, 0x01, 0x64,
        0x05, 0xDB, 0x61, 0xA1, 0xE8, 0x2B, 0x7C, 0xEB,
        0xC5, 0x10, 0x8D, 0x60, 0x45, 0x70, 0x1D, 0x84,
        0xD4, 0xB2, 0x2C, 0x31, 0x5A, 0x70, 0xEF, 0x35,
    ];

    const MAC_SALT_KEY: [u8; 16] = [
        0xDB, 0x92, 0xB4, 0xF3, 0xE4, 0xE9, 0x97, 0x99,
        0xA2, 0x2D, 0x0F, 0x8C, 0xBE, 0x00, 0xDE, 0x67,
    ];

    const LICENSING_ENCRYPTION_KEY: [u8; 16] = [
        0x6E, 0x10, 0x79, 0xE0, 0x38, 0x63, 0xAF, 0x75,
        0x4A, 0x03, 0x12, 0xFA, 0x27, 0x7E, 0x3A, 0x35,
    ];

    #[test]
    fn derivation_matches_the_fixed_vectors() {
        let (client_random, server_random) = fixed_randoms();

        let mut premaster = [0u8; PREMASTER_SECRET_SIZE];
        premaster[..24].copy_from_slice(&client_random[..24]);
        premaster[24..].copy_from_slice(&server_random[..24]);

        let master = master_secret(&premaster, &client_random, &server_random);
        assert_eq!(master, MASTER_SECRET);

        let blob = session_key_blob(&master, &client_random, &server_random);
        assert_eq!(blob, SESSION_KEY_BLOB);

        assert_eq!(mac_salt_key(&blob), MAC_SALT_KEY);

        let license_key = licensing_encryption_key(&blob, &client_random, &server_random);
        assert_eq!(license_key, LICENSING_ENCRYPTION_KEY);
    }

    #[test]
    fn reduced_strength_keys_carry_the_salt() {
        let (client_random, server_random) = fixed_randoms();
        let premaster = [0x03u8; PREMASTER_SECRET_SIZE];

        let keys40 = session_keys(&premaster, &client_random, &server_random, KeyStrength::Bits40);
        assert_eq!(keys40.encrypt_key.len(), 8);
        assert_eq!(&keys40.encrypt_key[..3], &[0xD1, 0x26, 0x9E]);

        let keys56 = session_keys(&premaster, &client_random, &server_random, KeyStrength::Bits56);
        assert_eq!(keys56.encrypt_key.len(), 8);
        assert_eq!(keys56.encrypt_key[0], 0xD1);

        let keys128 = session_keys(&premaster, &client_random, &server_random, KeyStrength::Bits128);
        assert_eq!(keys128.encrypt_key.len(), 16);
    }

    #[test]
    fn update_key_changes_the_key_and_keeps_length() {
        let initial = [0x11u8; 16];
        let current = [0x22u8; 16];

        let updated = update_key(&initial, &current, KeyStrength::Bits128);
        assert_eq!(updated.len(), 16);
        assert_ne!(updated.as_slice(), current.as_slice());

        // Deterministic: the peer performs the same computation.
        assert_eq!(updated, update_key(&initial, &current, KeyStrength::Bits128));
    }

    #[test]
    fn mac_signature_salted_variant_differs() {
        let key = [0x55u8; 16];
        let data = b"some protected payload";

        let plain = mac_signature(&key, data, None);
        let salted = mac_signature(&key, data, Some(1));
        assert_ne!(plain, salted);
    }
}
