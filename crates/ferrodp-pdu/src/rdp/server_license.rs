//! Licensing PDUs ([MS-RDPBCGR] 2.2.1.12, [MS-RDPELE]).
//!
//! The client side of the licensing exchange: a Server License Request is
//! answered with a Client New License Request, a Platform Challenge with a
//! Platform Challenge Response, and a New/Upgrade License or a Licensing
//! Error Message with `STATUS_VALID_CLIENT` completes the exchange.

use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};

use crate::crypto::{self, rc4::Rc4};
use crate::utils;

pub const RANDOM_NUMBER_SIZE: usize = 32;
pub const PREMASTER_SECRET_SIZE: usize = 48;
pub const MAC_SIZE: usize = 16;
pub const LICENSE_KEY_SIZE: usize = 16;

const PREAMBLE_SIZE: usize = 4;
const PREAMBLE_VERSION_3_0: u8 = 0x03;
const EXTENDED_ERROR_MSG_SUPPORTED: u8 = 0x80;
const BLOB_HEADER_SIZE: usize = 4;

const KEY_EXCHANGE_ALG_RSA: u32 = 0x0000_0001;
const PLATFORM_ID: u32 = 0x0400_0000 | 0x0001_0000;

const HWID_SIZE: usize = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
enum PreambleType {
    LicenseRequest = 0x01,
    PlatformChallenge = 0x02,
    NewLicense = 0x03,
    UpgradeLicense = 0x04,
    LicenseInfo = 0x12,
    NewLicenseRequest = 0x13,
    PlatformChallengeResponse = 0x15,
    ErrorAlert = 0xFF,
}

impl PreambleType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::LicenseRequest),
            0x02 => Some(Self::PlatformChallenge),
            0x03 => Some(Self::NewLicense),
            0x04 => Some(Self::UpgradeLicense),
            0x12 => Some(Self::LicenseInfo),
            0x13 => Some(Self::NewLicenseRequest),
            0x15 => Some(Self::PlatformChallengeResponse),
            0xFF => Some(Self::ErrorAlert),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
enum BlobType {
    Data = 0x01,
    Random = 0x02,
    Certificate = 0x03,
    Error = 0x04,
    EncryptedData = 0x09,
    KeyExchangeAlg = 0x0D,
    Scope = 0x0E,
    ClientUserName = 0x0F,
    ClientMachineName = 0x10,
}

fn read_blob<'a>(src: &mut ReadCursor<'a>, ctx: &'static str) -> DecodeResult<(u16, &'a [u8])> {
    ensure_size!(ctx: ctx, in: src, size: BLOB_HEADER_SIZE);
    let blob_type = src.read_u16();
    let length = usize::from(src.read_u16());
    ensure_size!(ctx: ctx, in: src, size: length);
    Ok((blob_type, src.read_slice(length)))
}

fn write_blob(dst: &mut WriteCursor<'_>, blob_type: BlobType, data: &[u8]) -> EncodeResult<()> {
    dst.write_u16(blob_type as u16);
    dst.write_u16(cast_length!("blob", "wBlobLen", data.len())?);
    dst.write_slice(data);
    Ok(())
}

fn blob_size(data: &[u8]) -> usize {
    BLOB_HEADER_SIZE + data.len()
}

/// Any licensing message, including its preamble.
///
/// The basic security header that precedes licensing messages on the wire is
/// the concern of the security envelope, not of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicensePdu {
    ServerLicenseRequest(ServerLicenseRequest),
    ClientNewLicenseRequest(ClientNewLicenseRequest),
    ServerPlatformChallenge(ServerPlatformChallenge),
    ClientPlatformChallengeResponse(ClientPlatformChallengeResponse),
    ServerNewLicense(ServerNewLicense),
    LicensingErrorMessage(LicensingErrorMessage),
}

impl LicensePdu {
    const NAME: &'static str = "LicensePdu";

    fn preamble_type(&self) -> PreambleType {
        match self {
            Self::ServerLicenseRequest(_) => PreambleType::LicenseRequest,
            Self::ClientNewLicenseRequest(_) => PreambleType::NewLicenseRequest,
            Self::ServerPlatformChallenge(_) => PreambleType::PlatformChallenge,
            Self::ClientPlatformChallengeResponse(_) => PreambleType::PlatformChallengeResponse,
            Self::ServerNewLicense(_) => PreambleType::NewLicense,
            Self::LicensingErrorMessage(_) => PreambleType::ErrorAlert,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            Self::ServerLicenseRequest(pdu) => pdu.size(),
            Self::ClientNewLicenseRequest(pdu) => pdu.size(),
            Self::ServerPlatformChallenge(pdu) => pdu.size(),
            Self::ClientPlatformChallengeResponse(pdu) => pdu.size(),
            Self::ServerNewLicense(pdu) => pdu.size(),
            Self::LicensingErrorMessage(pdu) => pdu.size(),
        }
    }
}

impl Encode for LicensePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u8(self.preamble_type() as u8);
        dst.write_u8(PREAMBLE_VERSION_3_0 | EXTENDED_ERROR_MSG_SUPPORTED);
        dst.write_u16(cast_length!("wMsgSize", self.body_size() + PREAMBLE_SIZE)?);

        match self {
            Self::ServerLicenseRequest(pdu) => pdu.encode_body(dst),
            Self::ClientNewLicenseRequest(pdu) => pdu.encode_body(dst),
            Self::ServerPlatformChallenge(pdu) => pdu.encode_body(dst),
            Self::ClientPlatformChallengeResponse(pdu) => pdu.encode_body(dst),
            Self::ServerNewLicense(pdu) => pdu.encode_body(dst),
            Self::LicensingErrorMessage(pdu) => pdu.encode_body(dst),
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        PREAMBLE_SIZE + self.body_size()
    }
}

impl<'de> Decode<'de> for LicensePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: PREAMBLE_SIZE);
        let msg_type =
            PreambleType::from_u8(src.read_u8()).ok_or_else(|| invalid_field_err!("bMsgType", "unknown message"))?;
        let _flags = src.read_u8();
        let _msg_size = src.read_u16();

        match msg_type {
            PreambleType::LicenseRequest => Ok(Self::ServerLicenseRequest(ServerLicenseRequest::decode_body(src)?)),
            PreambleType::NewLicenseRequest => {
                Ok(Self::ClientNewLicenseRequest(ClientNewLicenseRequest::decode_body(src)?))
            }
            PreambleType::PlatformChallenge => {
                Ok(Self::ServerPlatformChallenge(ServerPlatformChallenge::decode_body(src)?))
            }
            PreambleType::PlatformChallengeResponse => Ok(Self::ClientPlatformChallengeResponse(
                ClientPlatformChallengeResponse::decode_body(src)?,
            )),
            PreambleType::NewLicense | PreambleType::UpgradeLicense => {
                Ok(Self::ServerNewLicense(ServerNewLicense::decode_body(src)?))
            }
            PreambleType::ErrorAlert => Ok(Self::LicensingErrorMessage(LicensingErrorMessage::decode_body(src)?)),
            PreambleType::LicenseInfo => Err(invalid_field_err!("bMsgType", "unexpected client-to-server message")),
        }
    }
}

/// SERVER_LICENSE_REQUEST ([MS-RDPELE] 2.2.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLicenseRequest {
    pub server_random: [u8; RANDOM_NUMBER_SIZE],
    pub product_version: u32,
    pub company_name: String,
    pub product_id: String,
    pub server_certificate: Vec<u8>,
    pub scope_list: Vec<String>,
}

impl ServerLicenseRequest {
    const NAME: &'static str = "ServerLicenseRequest";

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: RANDOM_NUMBER_SIZE + 4 + 4 + 4);

        let server_random = src.read_array();

        let product_version = src.read_u32();
        let company_name_len = usize::try_from(src.read_u32()).unwrap_or(usize::MAX);
        ensure_size!(ctx: Self::NAME, in: src, size: company_name_len + 4);
        let company_name = utils::from_utf16_bytes(src.read_slice(company_name_len))
            .trim_end_matches('\0')
            .to_owned();
        let product_id_len = usize::try_from(src.read_u32()).unwrap_or(usize::MAX);
        ensure_size!(ctx: Self::NAME, in: src, size: product_id_len);
        let product_id = utils::from_utf16_bytes(src.read_slice(product_id_len))
            .trim_end_matches('\0')
            .to_owned();

        let (_key_exchange_type, _key_exchange) = read_blob(src, Self::NAME)?;
        let (_cert_type, server_certificate) = read_blob(src, Self::NAME)?;

        ensure_size!(ctx: Self::NAME, in: src, size: 4);
        let scope_count = src.read_u32().min(16);
        let mut scope_list = Vec::with_capacity(scope_count as usize);
        for _ in 0..scope_count {
            let (_ty, scope) = read_blob(src, Self::NAME)?;
            scope_list.push(String::from_utf8_lossy(scope).trim_end_matches('\0').to_owned());
        }

        Ok(Self {
            server_random,
            product_version,
            company_name,
            product_id,
            server_certificate: server_certificate.to_vec(),
            scope_list,
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let company_name = utils::to_utf16_bytes(&self.company_name);
        let product_id = utils::to_utf16_bytes(&self.product_id);

        dst.write_slice(&self.server_random);
        dst.write_u32(self.product_version);
        dst.write_u32((company_name.len() + 2) as u32);
        dst.write_slice(&company_name);
        dst.write_u16(0);
        dst.write_u32((product_id.len() + 2) as u32);
        dst.write_slice(&product_id);
        dst.write_u16(0);

        write_blob(dst, BlobType::KeyExchangeAlg, &KEY_EXCHANGE_ALG_RSA.to_le_bytes())?;
        write_blob(dst, BlobType::Certificate, &self.server_certificate)?;

        dst.write_u32(self.scope_list.len() as u32);
        for scope in self.scope_list.iter() {
            let mut bytes = scope.clone().into_bytes();
            bytes.push(0);
            write_blob(dst, BlobType::Scope, &bytes)?;
        }

        Ok(())
    }

    fn size(&self) -> usize {
        RANDOM_NUMBER_SIZE
            + 4
            + 4
            + utils::to_utf16_bytes(&self.company_name).len()
            + 2
            + 4
            + utils::to_utf16_bytes(&self.product_id).len()
            + 2
            + blob_size(&KEY_EXCHANGE_ALG_RSA.to_le_bytes())
            + blob_size(&self.server_certificate)
            + 4
            + self.scope_list.iter().map(|s| BLOB_HEADER_SIZE + s.len() + 1).sum::<usize>()
    }
}

/// CLIENT_NEW_LICENSE_REQUEST ([MS-RDPELE] 2.2.2.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNewLicenseRequest {
    pub client_random: [u8; RANDOM_NUMBER_SIZE],
    pub encrypted_premaster_secret: Vec<u8>,
    pub client_username: String,
    pub client_machine_name: String,
}

/// Key material derived while building a licensing request; needed to verify
/// and decrypt the subsequent server messages.
#[derive(Clone)]
pub struct LicenseEncryptionData {
    pub premaster_secret: Vec<u8>,
    pub mac_salt_key: [u8; LICENSE_KEY_SIZE],
    pub license_key: [u8; LICENSE_KEY_SIZE],
}

impl core::fmt::Debug for LicenseEncryptionData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Key material stays out of the logs.
        f.debug_struct("LicenseEncryptionData").finish_non_exhaustive()
    }
}

impl ClientNewLicenseRequest {
    const NAME: &'static str = "ClientNewLicenseRequest";

    /// Builds the request and the licensing session keys from the server's
    /// license request.
    pub fn from_server_license_request(
        license_request: &ServerLicenseRequest,
        client_random: &[u8; RANDOM_NUMBER_SIZE],
        premaster_secret: &[u8; PREMASTER_SECRET_SIZE],
        username: &str,
        machine_name: &str,
    ) -> Result<(Self, LicenseEncryptionData), crypto::CryptoError> {
        let master_secret = crypto::keys::master_secret(premaster_secret, client_random, &license_request.server_random);
        let session_key_blob =
            crypto::keys::session_key_blob(&master_secret, client_random, &license_request.server_random);

        let mut mac_salt_key = [0u8; LICENSE_KEY_SIZE];
        mac_salt_key.copy_from_slice(&session_key_blob[..16]);

        let license_key =
            crypto::keys::licensing_encryption_key(&session_key_blob, client_random, &license_request.server_random);

        let public_key = crypto::cert::extract_rsa_public_key(&license_request.server_certificate)?;
        let encrypted_premaster_secret = crypto::rsa_public_encrypt(premaster_secret, &public_key);

        let request = Self {
            client_random: *client_random,
            encrypted_premaster_secret,
            client_username: username.to_owned(),
            client_machine_name: machine_name.to_owned(),
        };

        let encryption_data = LicenseEncryptionData {
            premaster_secret: premaster_secret.to_vec(),
            mac_salt_key,
            license_key,
        };

        Ok((request, encryption_data))
    }

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: 4 + 4 + RANDOM_NUMBER_SIZE);

        let _key_exchange_alg = src.read_u32();
        let _platform_id = src.read_u32();
        let client_random = src.read_array();

        let (_ty, encrypted_premaster_secret) = read_blob(src, Self::NAME)?;
        let (_ty, username) = read_blob(src, Self::NAME)?;
        let (_ty, machine_name) = read_blob(src, Self::NAME)?;

        Ok(Self {
            client_random,
            encrypted_premaster_secret: encrypted_premaster_secret.to_vec(),
            client_username: String::from_utf8_lossy(username).trim_end_matches('\0').to_owned(),
            client_machine_name: String::from_utf8_lossy(machine_name).trim_end_matches('\0').to_owned(),
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u32(KEY_EXCHANGE_ALG_RSA);
        dst.write_u32(PLATFORM_ID);
        dst.write_slice(&self.client_random);

        write_blob(dst, BlobType::Random, &self.encrypted_premaster_secret)?;

        let mut username = self.client_username.clone().into_bytes();
        username.push(0);
        write_blob(dst, BlobType::ClientUserName, &username)?;

        let mut machine_name = self.client_machine_name.clone().into_bytes();
        machine_name.push(0);
        write_blob(dst, BlobType::ClientMachineName, &machine_name)?;

        Ok(())
    }

    fn size(&self) -> usize {
        4 + 4
            + RANDOM_NUMBER_SIZE
            + blob_size(&self.encrypted_premaster_secret)
            + BLOB_HEADER_SIZE
            + self.client_username.len()
            + 1
            + BLOB_HEADER_SIZE
            + self.client_machine_name.len()
            + 1
    }
}

/// SERVER_PLATFORM_CHALLENGE ([MS-RDPELE] 2.2.2.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPlatformChallenge {
    pub encrypted_platform_challenge: Vec<u8>,
    pub mac_data: [u8; MAC_SIZE],
}

impl ServerPlatformChallenge {
    const NAME: &'static str = "ServerPlatformChallenge";

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: 4);
        let _connect_flags = src.read_u32();

        let (_ty, encrypted_platform_challenge) = read_blob(src, Self::NAME)?;

        ensure_size!(ctx: Self::NAME, in: src, size: MAC_SIZE);
        let mac_data = src.read_array();

        Ok(Self {
            encrypted_platform_challenge: encrypted_platform_challenge.to_vec(),
            mac_data,
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u32(0);
        write_blob(dst, BlobType::EncryptedData, &self.encrypted_platform_challenge)?;
        dst.write_slice(&self.mac_data);
        Ok(())
    }

    fn size(&self) -> usize {
        4 + blob_size(&self.encrypted_platform_challenge) + MAC_SIZE
    }
}

/// CLIENT_PLATFORM_CHALLENGE_RESPONSE ([MS-RDPELE] 2.2.2.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPlatformChallengeResponse {
    pub encrypted_challenge_response: Vec<u8>,
    pub encrypted_hwid: Vec<u8>,
    pub mac_data: [u8; MAC_SIZE],
}

impl ClientPlatformChallengeResponse {
    const NAME: &'static str = "ClientPlatformChallengeResponse";

    /// Decrypts the challenge, re-encrypts it together with the hardware id
    /// and MACs the pair, per [MS-RDPELE] 3.3.5.5.
    pub fn from_server_platform_challenge(
        challenge: &ServerPlatformChallenge,
        hardware_id: [u32; 4],
        encryption_data: &LicenseEncryptionData,
    ) -> Result<Self, crypto::CryptoError> {
        let decrypted_challenge =
            Rc4::new(&encryption_data.license_key).process(&challenge.encrypted_platform_challenge);

        let mut hwid = [0u8; HWID_SIZE];
        hwid[..4].copy_from_slice(&2u32.to_le_bytes()); // HWID version
        for (chunk, value) in hwid[4..].chunks_exact_mut(4).zip(hardware_id.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }

        let mut mac_input = Vec::with_capacity(decrypted_challenge.len() + HWID_SIZE);
        mac_input.extend_from_slice(&decrypted_challenge);
        mac_input.extend_from_slice(&hwid);
        let mac_data = crypto::keys::mac_data(&encryption_data.mac_salt_key, &mac_input);

        let encrypted_challenge_response = Rc4::new(&encryption_data.license_key).process(&decrypted_challenge);
        let encrypted_hwid = Rc4::new(&encryption_data.license_key).process(&hwid);

        Ok(Self {
            encrypted_challenge_response,
            encrypted_hwid,
            mac_data,
        })
    }

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        let (_ty, encrypted_challenge_response) = read_blob(src, Self::NAME)?;
        let (_ty, encrypted_hwid) = read_blob(src, Self::NAME)?;

        ensure_size!(ctx: Self::NAME, in: src, size: MAC_SIZE);
        let mac_data = src.read_array();

        Ok(Self {
            encrypted_challenge_response: encrypted_challenge_response.to_vec(),
            encrypted_hwid: encrypted_hwid.to_vec(),
            mac_data,
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        write_blob(dst, BlobType::EncryptedData, &self.encrypted_challenge_response)?;
        write_blob(dst, BlobType::EncryptedData, &self.encrypted_hwid)?;
        dst.write_slice(&self.mac_data);
        Ok(())
    }

    fn size(&self) -> usize {
        blob_size(&self.encrypted_challenge_response) + blob_size(&self.encrypted_hwid) + MAC_SIZE
    }
}

/// SERVER_NEW_LICENSE / SERVER_UPGRADE_LICENSE ([MS-RDPELE] 2.2.2.6, 2.2.2.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNewLicense {
    pub encrypted_license_info: Vec<u8>,
    pub mac_data: [u8; MAC_SIZE],
}

impl ServerNewLicense {
    const NAME: &'static str = "ServerNewLicense";

    /// Decrypts and MAC-checks the license info blob.
    pub fn decrypt_license_info(&self, encryption_data: &LicenseEncryptionData) -> Result<Vec<u8>, crypto::CryptoError> {
        let decrypted = Rc4::new(&encryption_data.license_key).process(&self.encrypted_license_info);

        let expected_mac = crypto::keys::mac_data(&encryption_data.mac_salt_key, &decrypted);
        if expected_mac != self.mac_data {
            return Err(crypto::CryptoError::MacMismatch);
        }

        Ok(decrypted)
    }

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        let (_ty, encrypted_license_info) = read_blob(src, Self::NAME)?;

        ensure_size!(ctx: Self::NAME, in: src, size: MAC_SIZE);
        let mac_data = src.read_array();

        Ok(Self {
            encrypted_license_info: encrypted_license_info.to_vec(),
            mac_data,
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        write_blob(dst, BlobType::EncryptedData, &self.encrypted_license_info)?;
        dst.write_slice(&self.mac_data);
        Ok(())
    }

    fn size(&self) -> usize {
        blob_size(&self.encrypted_license_info) + MAC_SIZE
    }
}

/// LICENSE_ERROR_MESSAGE ([MS-RDPBCGR] 2.2.1.12.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensingErrorMessage {
    pub error_code: LicenseErrorCode,
    pub state_transition: u32,
    pub error_info: Vec<u8>,
}

impl LicensingErrorMessage {
    const NAME: &'static str = "LicensingErrorMessage";

    const FIXED_PART_SIZE: usize = 4 + 4;

    pub fn valid_client() -> Self {
        Self {
            error_code: LicenseErrorCode::StatusValidClient,
            state_transition: 2, // ST_NO_TRANSITION
            error_info: Vec::new(),
        }
    }

    fn decode_body(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let error_code = LicenseErrorCode::from_u32(src.read_u32());
        let state_transition = src.read_u32();
        let error_info = if src.len() >= BLOB_HEADER_SIZE {
            read_blob(src, Self::NAME)?.1.to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            error_code,
            state_transition,
            error_info,
        })
    }

    fn encode_body(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u32(self.error_code.as_u32());
        dst.write_u32(self.state_transition);
        write_blob(dst, BlobType::Error, &self.error_info)?;
        Ok(())
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + blob_size(&self.error_info)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LicenseErrorCode {
    InvalidServerCertificate,
    NoLicense,
    InvalidMac,
    InvalidScope,
    NoLicenseServer,
    StatusValidClient,
    InvalidClient,
    InvalidProductId,
    InvalidMessageLen,
    Other(u32),
}

impl LicenseErrorCode {
    fn from_u32(value: u32) -> Self {
        match value {
            0x01 => Self::InvalidServerCertificate,
            0x02 => Self::NoLicense,
            0x03 => Self::InvalidMac,
            0x04 => Self::InvalidScope,
            0x06 => Self::NoLicenseServer,
            0x07 => Self::StatusValidClient,
            0x08 => Self::InvalidClient,
            0x0B => Self::InvalidProductId,
            0x0C => Self::InvalidMessageLen,
            other => Self::Other(other),
        }
    }

    fn as_u32(self) -> u32 {
        match self {
            Self::InvalidServerCertificate => 0x01,
            Self::NoLicense => 0x02,
            Self::InvalidMac => 0x03,
            Self::InvalidScope => 0x04,
            Self::NoLicenseServer => 0x06,
            Self::StatusValidClient => 0x07,
            Self::InvalidClient => 0x08,
            Self::InvalidProductId => 0x0B,
            Self::InvalidMessageLen => 0x0C,
            Self::Other(other) => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn valid_client_error_message_roundtrip() {
        let pdu = LicensePdu::LicensingErrorMessage(LicensingErrorMessage::valid_client());
        let encoded = encode_vec(&pdu).unwrap();
        let decoded: LicensePdu = decode(&encoded).unwrap();

        match decoded {
            LicensePdu::LicensingErrorMessage(msg) => {
                assert_eq!(msg.error_code, LicenseErrorCode::StatusValidClient);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
