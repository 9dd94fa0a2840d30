//! Association engines for the requesting (SCU)
//! and accepting (SCP) sides of the DICOM Upper Layer,
//! over asynchronous TCP streams.
pub mod client;
pub mod pdata;
pub mod server;

use std::time::Duration;

use snafu::{Backtrace, ResultExt, Snafu};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::pdu::reader::read_pdu;
use crate::pdu::writer::write_pdu;
use crate::pdu::{
    AbortServiceProviderReason, AbortSource, AssociationRJ, Pdu, MAXIMUM_PDU_SIZE,
    PDU_HEADER_SIZE,
};

/// The states of an association, per the PS3.8 state machine
/// (collapsed to the externally observable states).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    /// no association established
    Idle,
    /// association requested, awaiting the peer's response
    AwaitingAssociate,
    /// association established; data may flow
    Established,
    /// release requested, awaiting the release response
    AwaitingRelease,
    /// association released in an orderly manner
    Released,
    /// association aborted by either peer or by a protocol error
    Aborted,
}

/// The timers which bound association activity.
/// The strictest applicable timer fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutProfile {
    /// bound on establishing the TCP connection (and TLS handshake)
    pub connect: Duration,
    /// bound on each read of a PDU; also serves as the ARTIM timer
    pub read: Duration,
    /// bound on each write of a PDU
    pub write: Duration,
    /// bound on one whole service operation (enforced by callers)
    pub operation: Duration,
}

impl Default for TimeoutProfile {
    fn default() -> Self {
        TimeoutProfile {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(30),
            write: Duration::from_secs(30),
            operation: Duration::from_secs(300),
        }
    }
}

/// A presentation context agreed upon in association negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NegotiatedContext {
    /// the presentation context id
    pub id: u8,
    /// the abstract syntax (SOP class UID)
    pub abstract_syntax: String,
    /// the accepted transfer syntax UID
    pub transfer_syntax: String,
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// could not connect to the peer
    #[snafu(display("could not connect to peer"))]
    Connect {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// the TLS handshake failed
    #[snafu(display("TLS handshake failed"))]
    TlsHandshake {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// an operation timed out
    #[snafu(display("{} timed out", operation))]
    Timeout {
        operation: &'static str,
        backtrace: Backtrace,
    },

    /// failed to send a PDU
    #[snafu(display("failed to send PDU"))]
    Send {
        #[snafu(source(from(crate::pdu::writer::Error, Box::new)))]
        source: Box<crate::pdu::writer::Error>,
    },

    /// failed to write to the transport
    #[snafu(display("failed to write to transport"))]
    WireSend {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// failed to receive a PDU
    #[snafu(display("failed to receive PDU"))]
    Receive {
        #[snafu(source(from(crate::pdu::reader::Error, Box::new)))]
        source: Box<crate::pdu::reader::Error>,
    },

    /// failed to read from the transport
    #[snafu(display("failed to read from transport"))]
    WireReceive {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// the peer closed the connection
    #[snafu(display("connection closed by peer"))]
    PeerClosed { backtrace: Backtrace },

    /// the association request was rejected
    #[snafu(display("association rejected by the peer"))]
    Rejected {
        /// the rejection outcome carried by the A-ASSOCIATE-RJ
        rejection: AssociationRJ,
    },

    /// the association was aborted
    #[snafu(display("association aborted"))]
    Aborted {
        /// who aborted the association and why
        source_info: AbortSource,
    },

    /// a PDU arrived which is not admissible in the current state
    #[snafu(display("unexpected {} in state {:?}", pdu.short_description(), state))]
    UnexpectedPdu {
        /// the offending PDU
        pdu: Box<Pdu>,
        /// the state the association was in
        state: State,
    },

    /// no presentation context was accepted by the peer
    #[snafu(display("no presentation context accepted"))]
    NoAcceptedPresentationContexts { backtrace: Backtrace },

    /// at least one presentation context must be proposed
    #[snafu(display("no presentation context proposed"))]
    MissingAbstractSyntax { backtrace: Backtrace },

    /// the association is not in a state which permits the operation
    #[snafu(display("operation invalid in state {:?}", state))]
    InvalidState { state: State },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Object-safe asynchronous byte stream, plain or TLS.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Read one PDU from an asynchronous stream within the read timeout.
pub(crate) async fn read_pdu_async<R>(
    stream: &mut R,
    max_pdu_length: u32,
    strict: bool,
    read_timeout: Duration,
) -> Result<Pdu>
where
    R: AsyncRead + Unpin,
{
    let pdu = tokio::time::timeout(read_timeout, async {
        let mut header = [0u8; PDU_HEADER_SIZE as usize];
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return PeerClosedSnafu.fail();
            }
            Err(e) => return Err(e).context(WireReceiveSnafu),
        }
        let pdu_length = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
        // bound the allocation before reading the payload
        if pdu_length > MAXIMUM_PDU_SIZE {
            return Err(Error::Receive {
                source: Box::new(
                    crate::pdu::reader::PduTooLargeSnafu {
                        pdu_length,
                        max_pdu_length: MAXIMUM_PDU_SIZE,
                    }
                    .build(),
                ),
            });
        }
        let mut buffer =
            bytes::BytesMut::zeroed(PDU_HEADER_SIZE as usize + pdu_length as usize);
        buffer[..PDU_HEADER_SIZE as usize].copy_from_slice(&header);
        stream
            .read_exact(&mut buffer[PDU_HEADER_SIZE as usize..])
            .await
            .context(WireReceiveSnafu)?;
        read_pdu(&mut &buffer[..], max_pdu_length, strict).context(ReceiveSnafu)
    })
    .await
    .map_err(|_| {
        TimeoutSnafu {
            operation: "PDU read",
        }
        .build()
    })??;
    Ok(pdu)
}

/// Write one PDU to an asynchronous stream within the write timeout.
pub(crate) async fn write_pdu_async<W>(
    stream: &mut W,
    pdu: &Pdu,
    write_timeout: Duration,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    write_pdu(&mut buffer, pdu).context(SendSnafu)?;
    tokio::time::timeout(write_timeout, async {
        stream.write_all(&buffer).await.context(WireSendSnafu)?;
        stream.flush().await.context(WireSendSnafu)
    })
    .await
    .map_err(|_| {
        TimeoutSnafu {
            operation: "PDU write",
        }
        .build()
    })??;
    Ok(())
}

/// The A-ABORT PDU sent on protocol errors
/// (service-provider initiated, unexpected PDU).
pub(crate) fn provider_abort() -> Pdu {
    Pdu::AbortRQ {
        source: AbortSource::ServiceProvider(AbortServiceProviderReason::UnexpectedPdu),
    }
}
