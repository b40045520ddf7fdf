//! Drivers running the connector sequence over a blocking stream.

use std::io::{Read, Write};

use ferrodp_connector::{
    ClientConnector, ClientConnectorState, ConnectionResult, ConnectorError, ConnectorErrorExt as _, ConnectorResult,
    Sequence, State as _, Written,
};
use ferrodp_core::WriteBuf;
use tracing::debug;

use crate::framed::Framed;

/// Marker returned when the sequence pauses for a transport upgrade (TLS
/// handshake or NLA), which the host performs before calling
/// [`connect_finalize`].
#[derive(Debug)]
#[must_use]
pub struct ShouldUpgrade;

/// Runs the connection sequence until the transport upgrade point.
pub fn connect_begin<S>(framed: &mut Framed<S>, connector: &mut ClientConnector) -> ConnectorResult<ShouldUpgrade>
where
    S: Read + Write,
{
    let mut buf = WriteBuf::new();

    while !connector.should_perform_security_upgrade() {
        if connector.state.is_terminal() {
            break;
        }
        single_sequence_step(framed, connector, &mut buf)?;
    }

    Ok(ShouldUpgrade)
}

/// Runs the remainder of the connection sequence after the transport upgrade
/// (or directly after [`connect_begin`] when standard RDP security was
/// selected and no upgrade happened).
pub fn connect_finalize<S>(
    _upgraded: ShouldUpgrade,
    framed: &mut Framed<S>,
    connector: &mut ClientConnector,
) -> ConnectorResult<ConnectionResult>
where
    S: Read + Write,
{
    if connector.should_perform_security_upgrade() {
        connector.mark_security_upgrade_as_done();
    }

    let mut buf = WriteBuf::new();

    while !connector.state.is_terminal() {
        single_sequence_step(framed, connector, &mut buf)?;
    }

    match std::mem::take(&mut connector.state) {
        ClientConnectorState::Connected { result } => Ok(*result),
        _ => Err(ConnectorError::general("connector did not terminate in the connected state")),
    }
}

/// One step of any sequence: read a frame when the sequence expects one, run
/// the step, flush whatever it produced.
pub fn single_sequence_step<S>(
    framed: &mut Framed<S>,
    sequence: &mut dyn Sequence,
    buf: &mut WriteBuf,
) -> ConnectorResult<Written>
where
    S: Read + Write,
{
    buf.clear();

    let written = if let Some(next_pdu_hint) = sequence.next_pdu_hint() {
        debug!(
            connector.state = sequence.state().name(),
            hint = ?next_pdu_hint,
            "Waiting for a PDU"
        );

        let pdu = framed
            .read_by_hint(next_pdu_hint)
            .map_err(|e| ferrodp_connector::custom_err!("read frame by hint", e))?;

        sequence.step(&pdu, buf)?
    } else {
        sequence.step_no_input(buf)?
    };

    if let Some(response_len) = written.size() {
        debug_assert_eq!(buf.filled_len(), response_len);
        framed
            .write_all(buf.filled())
            .map_err(|e| ferrodp_connector::custom_err!("write response", e))?;
    }

    Ok(written)
}
