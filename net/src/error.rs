//! The service-level error taxonomy.
//!
//! All high-level operations of this crate surface this one sum type,
//! with the category of the failure encoded in the variant
//! and, where applicable, the SOP instance UID or message id
//! which contextualizes it.
use snafu::Snafu;

use medicom_core::header::Tag;
use medicom_ul::association::Error as UlError;
use medicom_ul::pdu::{AbortSource, AssociationRJ};

use crate::command::Status;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    // protocol parse
    /// An incoming command or data set could not be decoded.
    #[snafu(display("could not decode incoming data set"))]
    ProtocolParse {
        #[snafu(source(from(medicom_object::read::Error, Box::new)))]
        source: Box<medicom_object::read::Error>,
    },

    /// An outgoing command or data set could not be encoded.
    #[snafu(display("could not encode outgoing data set"))]
    ProtocolEncode {
        #[snafu(source(from(medicom_object::write::Error, Box::new)))]
        source: Box<medicom_object::write::Error>,
    },

    /// A PDU-level error occurred.
    #[snafu(display("upper layer protocol failure"))]
    UpperLayer {
        #[snafu(source(from(UlError, Box::new)))]
        source: Box<UlError>,
    },

    // protocol semantic
    /// A required command set element is missing or malformed.
    #[snafu(display("command set is missing element {}", tag))]
    MalformedCommand { tag: Tag },

    /// A message arrived on an unknown presentation context.
    #[snafu(display("unknown presentation context id {}", id))]
    UnknownPresentationContext { id: u8 },

    /// A response referenced a message id that is not in flight.
    #[snafu(display("message id {} is not in flight", message_id))]
    MessageNotInFlight { message_id: u16 },

    /// The peer sent a data set where none was expected, or vice versa.
    #[snafu(display("command/data mismatch in {}", operation))]
    CommandDataMismatch { operation: &'static str },

    // association
    /// The association was rejected by the peer.
    #[snafu(display("association rejected"))]
    AssociationRejected {
        /// the rejection details
        rejection: AssociationRJ,
    },

    /// The association was aborted.
    #[snafu(display("association aborted"))]
    AssociationAborted {
        /// who aborted and why
        source_info: AbortSource,
    },

    /// The peer closed the connection unexpectedly.
    #[snafu(display("connection closed by peer"))]
    PeerClosed,

    /// No presentation context usable for the operation was accepted.
    #[snafu(display("no suitable presentation context for {}", sop_class_uid))]
    NoSuitablePresentationContext { sop_class_uid: String },

    // service
    /// The peer answered with a non-success DIMSE status.
    #[snafu(display("service returned status {:04X}", status.0))]
    ServiceStatus {
        /// the DIMSE status code
        status: Status,
        /// the affected SOP instance, when reported
        sop_instance_uid: Option<String>,
        /// the message id of the failed request, when known
        message_id: Option<u16>,
    },

    // value
    /// A value in a data set could not be interpreted.
    #[snafu(display("invalid value in data set"))]
    InvalidValue {
        #[snafu(source(from(medicom_object::mem::AccessError, Box::new)))]
        source: Box<medicom_object::mem::AccessError>,
    },

    // transport
    /// Establishing the connection failed.
    #[snafu(display("could not connect to {}", address))]
    ConnectFailed {
        address: String,
        source: std::io::Error,
    },

    /// An operation exceeded its allotted time.
    #[snafu(display("operation `{}` timed out", operation))]
    OperationTimeout { operation: &'static str },

    // resource
    /// The connection pool has no capacity for the peer.
    #[snafu(display("connection pool exhausted for {}", peer))]
    PoolExhausted { peer: String },

    /// The circuit breaker for the peer is open.
    #[snafu(display("circuit breaker open for {}", peer))]
    CircuitOpen { peer: String },

    /// Too many concurrent associations.
    #[snafu(display("too many concurrent associations"))]
    TooManyAssociations,

    /// No commitment transaction with this UID is outstanding.
    #[snafu(display("unknown commitment transaction {}", transaction_uid))]
    UnknownTransaction { transaction_uid: String },

    /// The operation was cancelled locally.
    #[snafu(display("operation cancelled"))]
    Cancelled,
}

/// Whether an error may be retried under a retry policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// transient: timeouts, resets, temporary resource shortage
    Retryable,
    /// permanent: protocol violations, rejections, value errors
    Fatal,
}

impl Error {
    /// Classify this error for retry purposes.
    ///
    /// Service statuses are never retried here:
    /// the caller decides what a warning or failure status means.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::ConnectFailed { .. }
            | Error::OperationTimeout { .. }
            | Error::PeerClosed
            | Error::PoolExhausted { .. }
            | Error::TooManyAssociations => ErrorClass::Retryable,
            Error::UpperLayer { source, .. } => match source.as_ref() {
                UlError::Connect { .. }
                | UlError::Timeout { .. }
                | UlError::WireSend { .. }
                | UlError::WireReceive { .. }
                | UlError::PeerClosed { .. } => ErrorClass::Retryable,
                UlError::Rejected { rejection } => {
                    // a transient rejection admits a later retry
                    match rejection.result {
                        medicom_ul::pdu::AssociationRJResult::Transient => ErrorClass::Retryable,
                        medicom_ul::pdu::AssociationRJResult::Permanent => ErrorClass::Fatal,
                    }
                }
                _ => ErrorClass::Fatal,
            },
            _ => ErrorClass::Fatal,
        }
    }
}

impl From<UlError> for Error {
    fn from(e: UlError) -> Self {
        match e {
            UlError::Rejected { rejection } => Error::AssociationRejected { rejection },
            UlError::Aborted { source_info } => Error::AssociationAborted { source_info },
            UlError::PeerClosed { .. } => Error::PeerClosed,
            other => Error::UpperLayer {
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
