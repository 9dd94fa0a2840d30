//! DIMSE message exchange over an established association:
//! command set encoding, PDV fragmentation and reassembly,
//! and message id bookkeeping.
use std::collections::HashSet;

use snafu::ResultExt;

use medicom_encoding::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::write::write_data_set;
use medicom_object::DataSet;
use medicom_ul::association::client::ClientAssociation;
use medicom_ul::association::pdata::{split_into_pdus, PDataAssembler};
use medicom_ul::association::server::ServerAssociation;
use medicom_ul::association::NegotiatedContext;
use medicom_ul::pdu::{PDataValueType, Pdu};

use crate::command::CommandView;
use crate::error::{Error, ProtocolEncodeSnafu, ProtocolParseSnafu, Result};

/// A side of an association able to exchange DIMSE messages.
///
/// Implemented by both the requester and acceptor association types.
pub trait AssociationMessaging: Send {
    /// The presentation contexts agreed in negotiation.
    fn contexts(&self) -> &[NegotiatedContext];

    /// The maximum PDU length for outgoing PDUs.
    fn send_max_pdu(&self) -> u32;

    /// Send one PDU.
    fn send_pdu(
        &mut self,
        pdu: &Pdu,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Receive one PDU.
    fn receive_pdu(&mut self) -> impl std::future::Future<Output = Result<Pdu>> + Send;
}

impl AssociationMessaging for ClientAssociation {
    fn contexts(&self) -> &[NegotiatedContext] {
        self.presentation_contexts()
    }

    fn send_max_pdu(&self) -> u32 {
        self.send_max_pdu()
    }

    async fn send_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        self.send(pdu).await.map_err(Error::from)
    }

    async fn receive_pdu(&mut self) -> Result<Pdu> {
        self.receive().await.map_err(Error::from)
    }
}

impl AssociationMessaging for ServerAssociation {
    fn contexts(&self) -> &[NegotiatedContext] {
        self.presentation_contexts()
    }

    fn send_max_pdu(&self) -> u32 {
        self.send_max_pdu()
    }

    async fn send_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        self.send(pdu).await.map_err(Error::from)
    }

    async fn receive_pdu(&mut self) -> Result<Pdu> {
        self.receive().await.map_err(Error::from)
    }
}

/// A complete received DIMSE message:
/// the command set and the raw data set bytes, if any.
///
/// The data set is kept in its wire form,
/// to be decoded under the transfer syntax of the
/// presentation context it arrived on.
#[derive(Debug)]
pub struct DimseMessage {
    /// the presentation context the message arrived on
    pub presentation_context_id: u8,
    /// the parsed command set
    pub command: CommandView,
    /// the raw data set bytes, when the command announced one
    pub data: Option<Vec<u8>>,
}

/// What arrived on the association.
#[derive(Debug)]
pub enum Incoming {
    /// a complete DIMSE message
    Message(DimseMessage),
    /// the peer requested an orderly release
    Release,
}

/// Send a DIMSE message: the command set
/// and optionally the accompanying data set bytes.
pub async fn send_message<A: AssociationMessaging>(
    association: &mut A,
    presentation_context_id: u8,
    command: &DataSet,
    data: Option<&[u8]>,
) -> Result<()> {
    let mut command_bytes = Vec::new();
    write_data_set(&mut command_bytes, command, &IMPLICIT_VR_LITTLE_ENDIAN)
        .context(ProtocolEncodeSnafu)?;

    let max_pdu = association.send_max_pdu();
    for pdu in split_into_pdus(
        presentation_context_id,
        PDataValueType::Command,
        &command_bytes,
        max_pdu,
    ) {
        association.send_pdu(&pdu).await?;
    }
    if let Some(data) = data {
        for pdu in split_into_pdus(
            presentation_context_id,
            PDataValueType::Data,
            data,
            max_pdu,
        ) {
            association.send_pdu(&pdu).await?;
        }
    }
    Ok(())
}

/// Receive one complete DIMSE message,
/// reassembling command and data PDV streams.
pub async fn receive_message<A: AssociationMessaging>(
    association: &mut A,
) -> Result<Incoming> {
    let mut assembler = PDataAssembler::new();
    let mut command: Option<(u8, CommandView)> = None;
    let mut data: Option<Vec<u8>> = None;

    loop {
        let pdu = association.receive_pdu().await?;
        let values = match pdu {
            Pdu::PData { data } => data,
            Pdu::ReleaseRQ => return Ok(Incoming::Release),
            pdu => {
                return Err(Error::UpperLayer {
                    source: Box::new(medicom_ul::association::Error::UnexpectedPdu {
                        pdu: Box::new(pdu),
                        state: medicom_ul::association::State::Established,
                    }),
                })
            }
        };
        for stream in assembler.feed(values) {
            match stream.value_type {
                PDataValueType::Command => {
                    let command_set = read_data_set(
                        &stream.data[..],
                        &IMPLICIT_VR_LITTLE_ENDIAN,
                        ParseMode::Lenient,
                    )
                    .context(ProtocolParseSnafu)?;
                    let view = CommandView::from_data_set(command_set)?;
                    command = Some((stream.presentation_context_id, view));
                }
                PDataValueType::Data => {
                    data = Some(stream.data);
                }
            }
        }

        if let Some((context_id, view)) = command.take() {
            if !view.has_data_set {
                return Ok(Incoming::Message(DimseMessage {
                    presentation_context_id: context_id,
                    command: view,
                    data: None,
                }));
            }
            if let Some(bytes) = data.take() {
                return Ok(Incoming::Message(DimseMessage {
                    presentation_context_id: context_id,
                    command: view,
                    data: Some(bytes),
                }));
            }
            // data set still in transit
            command = Some((context_id, view));
        }
    }
}

/// Allocates message ids for one association,
/// guaranteeing that an id is never reused while still in flight.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    next: u16,
    in_flight: HashSet<u16>,
}

impl MessageIdAllocator {
    /// Create a new allocator starting at message id 1.
    pub fn new() -> Self {
        MessageIdAllocator {
            next: 1,
            in_flight: HashSet::new(),
        }
    }

    /// Allocate the next free message id and mark it in flight.
    pub fn allocate(&mut self) -> u16 {
        loop {
            let id = self.next;
            self.next = self.next.wrapping_add(1).max(1);
            if self.in_flight.insert(id) {
                return id;
            }
        }
    }

    /// Mark a message id as answered,
    /// reporting an error if it was not in flight.
    pub fn complete(&mut self, message_id: u16) -> Result<()> {
        if self.in_flight.remove(&message_id) {
            Ok(())
        } else {
            Err(Error::MessageNotInFlight { message_id })
        }
    }

    /// Whether the given message id is awaiting a final response.
    pub fn is_in_flight(&self, message_id: u16) -> bool {
        self.in_flight.contains(&message_id)
    }
}

/// Find the accepted presentation context for an abstract syntax.
pub fn context_for<'a>(
    contexts: &'a [NegotiatedContext],
    sop_class_uid: &str,
) -> Result<&'a NegotiatedContext> {
    contexts
        .iter()
        .find(|c| c.abstract_syntax == sop_class_uid)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class_uid.to_string(),
        })
}

/// Find a negotiated context by its id.
pub fn context_by_id(contexts: &[NegotiatedContext], id: u8) -> Result<&NegotiatedContext> {
    contexts
        .iter()
        .find(|c| c.id == id)
        .ok_or(Error::UnknownPresentationContext { id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_not_reused_in_flight() {
        let mut allocator = MessageIdAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert_ne!(a, b);
        assert!(allocator.is_in_flight(a));
        allocator.complete(a).unwrap();
        assert!(!allocator.is_in_flight(a));
        assert!(allocator.complete(a).is_err());
    }
}
