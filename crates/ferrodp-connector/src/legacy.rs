//! Channel plumbing shared by the connection sequences and the active stage:
//! MCS send-data framing, the share control/data headers and the standard
//! RDP security envelope.

use std::borrow::Cow;

use ferrodp_core::{decode, encode_buf, encode_vec, Encode, WriteBuf};
use ferrodp_pdu::crypto::context::SealedPayload;
use ferrodp_pdu::crypto::SecurityContext;
use ferrodp_pdu::mcs;
use ferrodp_pdu::rdp::client_info::CompressionType;
use ferrodp_pdu::rdp::headers::{
    BasicSecurityHeader, BasicSecurityHeaderFlags, CompressionFlags, ShareControlHeader, ShareControlPdu,
    ShareDataHeader, ShareDataPdu, StreamPriority,
};
use ferrodp_pdu::x224::X224;

use crate::{ConnectorError, ConnectorErrorExt as _, ConnectorResult};

const FIPS_HEADER_SIZE: usize = 4;
const FIPS_VERSION_1: u8 = 1;
const SIGNATURE_SIZE: usize = 8;

/// Per-session security state: absent entirely under enhanced security.
pub type SecurityState = Option<SecurityContext>;

/// Wraps an io-channel payload in the standard-security envelope.
///
/// With legacy security active every payload is signed and encrypted under a
/// basic security header; otherwise a header is emitted only when `flags`
/// demands one (Client Info, licensing).
pub fn wrap_security(
    security: &mut SecurityState,
    flags: BasicSecurityHeaderFlags,
    payload: &[u8],
) -> ConnectorResult<Vec<u8>> {
    match security.as_mut() {
        Some(context) => {
            let mut header_flags = flags | BasicSecurityHeaderFlags::ENCRYPT;
            if context.secure_checksum() {
                header_flags |= BasicSecurityHeaderFlags::SECURE_CHECKSUM;
            }

            let SealedPayload {
                signature,
                data,
                pad_length,
            } = context.encrypt(payload).map_err(ConnectorError::security)?;

            let header = BasicSecurityHeader { flags: header_flags };
            let mut out = encode_vec(&header).map_err(ConnectorError::encode)?;

            if context.is_fips() {
                out.extend_from_slice(&(FIPS_HEADER_SIZE as u16).to_le_bytes());
                out.push(FIPS_VERSION_1);
                out.push(pad_length);
            }

            out.extend_from_slice(&signature);
            out.extend_from_slice(&data);

            Ok(out)
        }
        None if flags.is_empty() => Ok(payload.to_vec()),
        None => {
            let header = BasicSecurityHeader { flags };
            let mut out = encode_vec(&header).map_err(ConnectorError::encode)?;
            out.extend_from_slice(payload);
            Ok(out)
        }
    }
}

/// Strips (and when necessary decrypts) the standard-security envelope from
/// an inbound io-channel payload.
///
/// Returns the header flags (empty when no header was present) and the
/// plaintext body. A MAC mismatch is fatal.
pub fn unwrap_security<'a>(
    security: &mut SecurityState,
    data: &'a [u8],
    header_expected: bool,
) -> ConnectorResult<(BasicSecurityHeaderFlags, Cow<'a, [u8]>)> {
    if security.is_none() && !header_expected {
        return Ok((BasicSecurityHeaderFlags::empty(), Cow::Borrowed(data)));
    }

    let header: BasicSecurityHeader = decode(data).map_err(ConnectorError::decode)?;
    let mut rest = &data[BasicSecurityHeader::FIXED_PART_SIZE..];

    if !header.flags.contains(BasicSecurityHeaderFlags::ENCRYPT) {
        return Ok((header.flags, Cow::Borrowed(rest)));
    }

    let Some(context) = security.as_mut() else {
        return Err(general_err!("received an encrypted payload without a security context"));
    };

    let mut pad_length = 0u8;
    if context.is_fips() {
        if rest.len() < FIPS_HEADER_SIZE {
            return Err(general_err!("truncated FIPS security header"));
        }
        pad_length = rest[3];
        rest = &rest[FIPS_HEADER_SIZE..];
    }

    if rest.len() < SIGNATURE_SIZE {
        return Err(general_err!("truncated security signature"));
    }

    let mut signature = [0u8; SIGNATURE_SIZE];
    signature.copy_from_slice(&rest[..SIGNATURE_SIZE]);
    let sealed = SealedPayload {
        signature,
        data: rest[SIGNATURE_SIZE..].to_vec(),
        pad_length,
    };

    let plaintext = context.decrypt(&sealed).map_err(ConnectorError::security)?;

    Ok((header.flags, Cow::Owned(plaintext)))
}

/// Encodes a message as MCS send-data-request user data inside the X.224
/// framing.
pub fn encode_send_data_request<T: Encode>(
    initiator_id: u16,
    channel_id: u16,
    user_msg: &T,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let user_data = encode_vec(user_msg).map_err(ConnectorError::encode)?;
    encode_send_data_request_raw(initiator_id, channel_id, &user_data, buf)
}

/// Same as [`encode_send_data_request`] for an already-encoded payload.
pub fn encode_send_data_request_raw(
    initiator_id: u16,
    channel_id: u16,
    user_data: &[u8],
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let pdu = mcs::SendDataRequest {
        initiator_id,
        channel_id,
        user_data: Cow::Borrowed(user_data),
    };

    let written = encode_buf(&X224(pdu), buf).map_err(ConnectorError::encode)?;

    Ok(written)
}

#[derive(Debug, Clone, Copy)]
pub struct SendDataIndicationCtx<'a> {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub user_data: &'a [u8],
}

/// Strips the MCS send-data-indication framing from an inbound frame.
pub fn decode_send_data_indication(src: &[u8]) -> ConnectorResult<SendDataIndicationCtx<'_>> {
    let mcs_msg = decode::<X224<mcs::McsMessage<'_>>>(src)
        .map_err(ConnectorError::decode)?
        .0;

    match mcs_msg {
        mcs::McsMessage::SendDataIndication(msg) => {
            let Cow::Borrowed(user_data) = msg.user_data else {
                unreachable!("borrowed decode");
            };

            Ok(SendDataIndicationCtx {
                initiator_id: msg.initiator_id,
                channel_id: msg.channel_id,
                user_data,
            })
        }
        mcs::McsMessage::DisconnectProviderUltimatum(msg) => Err(reason_err!(
            "decode_send_data_indication",
            "received disconnect provider ultimatum: {}",
            msg.reason
        )),
        unexpected => Err(reason_err!(
            "decode_send_data_indication",
            "unexpected MCS message: {}",
            unexpected.name()
        )),
    }
}

/// Encodes a share-control PDU onto the io channel, applying the security
/// envelope.
pub fn encode_share_control(
    initiator_id: u16,
    channel_id: u16,
    share_id: u32,
    pdu: ShareControlPdu,
    security: &mut SecurityState,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let share_control_header = ShareControlHeader {
        share_control_pdu: pdu,
        pdu_source: initiator_id,
        share_id,
    };

    let payload = encode_vec(&share_control_header).map_err(ConnectorError::encode)?;
    let sealed = wrap_security(security, BasicSecurityHeaderFlags::empty(), &payload)?;

    encode_send_data_request_raw(initiator_id, channel_id, &sealed, buf)
}

#[derive(Debug, Clone)]
pub struct ShareControlCtx {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub share_id: u32,
    pub pdu_source: u16,
    pub pdu: ShareControlPdu,
}

/// Decodes an inbound io-channel frame down to its share-control PDU.
pub fn decode_share_control(
    ctx: SendDataIndicationCtx<'_>,
    security: &mut SecurityState,
) -> ConnectorResult<ShareControlCtx> {
    let (_flags, body) = unwrap_security(security, ctx.user_data, false)?;
    let user_msg: ShareControlHeader = decode(body.as_ref()).map_err(ConnectorError::decode)?;

    Ok(ShareControlCtx {
        initiator_id: ctx.initiator_id,
        channel_id: ctx.channel_id,
        share_id: user_msg.share_id,
        pdu_source: user_msg.pdu_source,
        pdu: user_msg.share_control_pdu,
    })
}

/// Encodes a share-data PDU (uncompressed) onto the io channel.
pub fn encode_share_data(
    initiator_id: u16,
    channel_id: u16,
    share_id: u32,
    pdu: ShareDataPdu,
    security: &mut SecurityState,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let share_data_header = ShareDataHeader {
        share_data_pdu: pdu,
        stream_priority: StreamPriority::Medium,
        compression_flags: CompressionFlags::empty(),
        compression_type: CompressionType::K8, // ignored without compression flags
    };

    let share_control_pdu = ShareControlPdu::Data(share_data_header);

    encode_share_control(initiator_id, channel_id, share_id, share_control_pdu, security, buf)
}

#[derive(Debug, Clone)]
pub struct ShareDataCtx {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub share_id: u32,
    pub pdu_source: u16,
    pub pdu: ShareDataPdu,
}

/// Decodes an inbound io-channel frame down to its share-data PDU.
pub fn decode_share_data(
    ctx: SendDataIndicationCtx<'_>,
    security: &mut SecurityState,
) -> ConnectorResult<ShareDataCtx> {
    let ctx = decode_share_control(ctx, security)?;

    let ShareControlPdu::Data(share_data_header) = ctx.pdu else {
        return Err(general_err!(
            "received unexpected Share Control PDU (expected Share Data Header)"
        ));
    };

    Ok(ShareDataCtx {
        initiator_id: ctx.initiator_id,
        channel_id: ctx.channel_id,
        share_id: ctx.share_id,
        pdu_source: ctx.pdu_source,
        pdu: share_data_header.share_data_pdu,
    })
}
