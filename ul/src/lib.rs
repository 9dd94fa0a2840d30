//! Types and methods for interacting with the
//! DICOM Upper Layer Protocol (PS3.8):
//! the PDU codec, and association engines
//! for both the requesting and the accepting side.
//!
//! - The [`pdu`] module holds the data types of the protocol data
//!   units, with a synchronous byte-level [reader](pdu::reader)
//!   and [writer](pdu::writer).
//! - The [`association`] module drives associations over tokio TCP
//!   streams, with optional TLS (behind the `tls` feature),
//!   covering negotiation, the association state machine,
//!   P-DATA chunking and the ARTIM timer.
pub mod association;
pub mod pdu;
#[cfg(feature = "tls")]
pub mod tls;

pub use crate::association::client::{ClientAssociation, ClientAssociationOptions};
pub use crate::association::server::{ServerAssociation, ServerAssociationOptions};
pub use crate::association::{State, TimeoutProfile};
pub use crate::pdu::Pdu;
