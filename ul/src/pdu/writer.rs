//! PDU writer module
use std::io::Write;

use byteordered::byteorder::{BigEndian, WriteBytesExt};
use medicom_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use snafu::{Backtrace, ResultExt, Snafu};

use crate::pdu::*;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not write PDU field `{}`", field))]
    WriteField {
        field: &'static str,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not encode text field `{}`", field))]
    EncodeField {
        field: &'static str,
        source: medicom_encoding::text::EncodeTextError,
    },

    #[snafu(display("could not write chunk `{}`", name))]
    WriteChunk {
        name: &'static str,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Write the given content through a closure into a buffer,
/// then emit it prefixed by its big-endian 32-bit length.
fn write_chunk_u32<W, F>(writer: &mut W, name: &'static str, func: F) -> Result<()>
where
    W: Write,
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = Vec::new();
    func(&mut data).map_err(|e| Error::WriteChunk {
        name,
        source: Box::new(e),
    })?;
    writer
        .write_u32::<BigEndian>(data.len() as u32)
        .context(WriteFieldSnafu { field: "PDU-length" })?;
    writer
        .write_all(&data)
        .context(WriteFieldSnafu { field: "PDU-data" })?;
    Ok(())
}

/// Write a sub-item prefixed by its big-endian 16-bit length.
fn write_chunk_u16<F>(writer: &mut Vec<u8>, name: &'static str, func: F) -> Result<()>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = Vec::new();
    func(&mut data).map_err(|e| Error::WriteChunk {
        name,
        source: Box::new(e),
    })?;
    writer
        .write_u16::<BigEndian>(data.len() as u16)
        .context(WriteFieldSnafu { field: "Item-length" })?;
    writer
        .write_all(&data)
        .context(WriteFieldSnafu { field: "Item-data" })?;
    Ok(())
}

fn write_ae_title(writer: &mut Vec<u8>, title: &str, field: &'static str) -> Result<()> {
    let codec = DefaultCharacterSetCodec;
    let mut bytes = codec.encode(title).context(EncodeFieldSnafu { field })?;
    bytes.resize(16, b' ');
    writer.write_all(&bytes).context(WriteFieldSnafu { field })
}

fn write_uid_sub_item(writer: &mut Vec<u8>, sub_type: u8, uid: &str) -> Result<()> {
    writer
        .write_all(&[sub_type, 0x00])
        .context(WriteFieldSnafu { field: "Item-type" })?;
    write_chunk_u16(writer, "syntax sub-item", |out| {
        let codec = DefaultCharacterSetCodec;
        let bytes = codec
            .encode(uid)
            .context(EncodeFieldSnafu { field: "Syntax-name" })?;
        out.write_all(&bytes)
            .context(WriteFieldSnafu { field: "Syntax-name" })
    })
}

/// Serialize one PDU into the given writer.
pub fn write_pdu<W>(writer: &mut W, pdu: &Pdu) -> Result<()>
where
    W: Write,
{
    match pdu {
        Pdu::AssociationRQ(AssociationRQ {
            protocol_version,
            calling_ae_title,
            called_ae_title,
            application_context_name,
            presentation_contexts,
            user_variables,
        }) => {
            writer
                .write_all(&[0x01, 0x00])
                .context(WriteFieldSnafu { field: "PDU-type" })?;
            write_chunk_u32(writer, "A-ASSOCIATE-RQ", |out| {
                out.write_u16::<BigEndian>(*protocol_version)
                    .context(WriteFieldSnafu { field: "Protocol-version" })?;
                out.write_u16::<BigEndian>(0)
                    .context(WriteFieldSnafu { field: "Reserved" })?;
                write_ae_title(out, called_ae_title, "Called-AE-title")?;
                write_ae_title(out, calling_ae_title, "Calling-AE-title")?;
                out.write_all(&[0; 32])
                    .context(WriteFieldSnafu { field: "Reserved" })?;
                write_application_context(out, application_context_name)?;
                for pc in presentation_contexts {
                    write_presentation_context_proposed(out, pc)?;
                }
                write_user_information(out, user_variables)
            })
        }
        Pdu::AssociationAC(AssociationAC {
            protocol_version,
            called_ae_title,
            calling_ae_title,
            application_context_name,
            presentation_contexts,
            user_variables,
        }) => {
            writer
                .write_all(&[0x02, 0x00])
                .context(WriteFieldSnafu { field: "PDU-type" })?;
            write_chunk_u32(writer, "A-ASSOCIATE-AC", |out| {
                out.write_u16::<BigEndian>(*protocol_version)
                    .context(WriteFieldSnafu { field: "Protocol-version" })?;
                out.write_u16::<BigEndian>(0)
                    .context(WriteFieldSnafu { field: "Reserved" })?;
                write_ae_title(out, called_ae_title, "Called-AE-title")?;
                write_ae_title(out, calling_ae_title, "Calling-AE-title")?;
                out.write_all(&[0; 32])
                    .context(WriteFieldSnafu { field: "Reserved" })?;
                write_application_context(out, application_context_name)?;
                for pc in presentation_contexts {
                    write_presentation_context_result(out, pc)?;
                }
                write_user_information(out, user_variables)
            })
        }
        Pdu::AssociationRJ(AssociationRJ { result, source }) => {
            writer
                .write_all(&[0x03, 0x00])
                .context(WriteFieldSnafu { field: "PDU-type" })?;
            write_chunk_u32(writer, "A-ASSOCIATE-RJ", |out| {
                let result_byte = match result {
                    AssociationRJResult::Permanent => 1,
                    AssociationRJResult::Transient => 2,
                };
                let (source_byte, reason_byte) = match source {
                    AssociationRJSource::ServiceUser(reason) => (
                        1,
                        match reason {
                            AssociationRJServiceUserReason::NoReasonGiven => 1,
                            AssociationRJServiceUserReason::ApplicationContextNameNotSupported => 2,
                            AssociationRJServiceUserReason::CallingAETitleNotRecognized => 3,
                            AssociationRJServiceUserReason::CalledAETitleNotRecognized => 7,
                            AssociationRJServiceUserReason::Reserved(r) => *r,
                        },
                    ),
                    AssociationRJSource::ServiceProviderAsce(reason) => (
                        2,
                        match reason {
                            AssociationRJServiceProviderAsceReason::NoReasonGiven => 1,
                            AssociationRJServiceProviderAsceReason::ProtocolVersionNotSupported => 2,
                        },
                    ),
                    AssociationRJSource::ServiceProviderPresentation(reason) => (
                        3,
                        match reason {
                            AssociationRJServiceProviderPresentationReason::TemporaryCongestion => 1,
                            AssociationRJServiceProviderPresentationReason::LocalLimitExceeded => 2,
                            AssociationRJServiceProviderPresentationReason::Reserved(r) => *r,
                        },
                    ),
                };
                out.write_all(&[0x00, result_byte, source_byte, reason_byte])
                    .context(WriteFieldSnafu { field: "Result/Source/Reason" })
            })
        }
        Pdu::PData { data } => {
            writer
                .write_all(&[0x04, 0x00])
                .context(WriteFieldSnafu { field: "PDU-type" })?;
            write_chunk_u32(writer, "P-DATA-TF", |out| {
                for pdv in data {
                    out.write_u32::<BigEndian>(pdv.data.len() as u32 + 2)
                        .context(WriteFieldSnafu { field: "PDV-length" })?;
                    out.write_all(&[pdv.presentation_context_id])
                        .context(WriteFieldSnafu { field: "PDV-context-id" })?;
                    let mut header = 0x00u8;
                    if pdv.value_type == PDataValueType::Command {
                        header |= 0x01;
                    }
                    if pdv.is_last {
                        header |= 0x02;
                    }
                    out.write_all(&[header])
                        .context(WriteFieldSnafu { field: "PDV-control-header" })?;
                    out.write_all(&pdv.data)
                        .context(WriteFieldSnafu { field: "PDV-data" })?;
                }
                Ok(())
            })
        }
        Pdu::ReleaseRQ => {
            writer
                .write_all(&[0x05, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00])
                .context(WriteFieldSnafu { field: "A-RELEASE-RQ" })?;
            Ok(())
        }
        Pdu::ReleaseRP => {
            writer
                .write_all(&[0x06, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00])
                .context(WriteFieldSnafu { field: "A-RELEASE-RP" })?;
            Ok(())
        }
        Pdu::AbortRQ { source } => {
            let (source_byte, reason_byte) = match source {
                AbortSource::ServiceUser => (0, 0),
                AbortSource::Reserved => (1, 0),
                AbortSource::ServiceProvider(reason) => (
                    2,
                    match reason {
                        AbortServiceProviderReason::ReasonNotSpecified => 0,
                        AbortServiceProviderReason::UnexpectedPdu => 1,
                        AbortServiceProviderReason::Reserved => 2,
                        AbortServiceProviderReason::UnrecognizedPduParameter => 4,
                        AbortServiceProviderReason::UnexpectedPduParameter => 5,
                        AbortServiceProviderReason::InvalidPduParameter => 6,
                    },
                ),
            };
            writer
                .write_all(&[
                    0x07, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, source_byte, reason_byte,
                ])
                .context(WriteFieldSnafu { field: "A-ABORT" })?;
            Ok(())
        }
        Pdu::Unknown { pdu_type, data } => {
            writer
                .write_all(&[*pdu_type, 0x00])
                .context(WriteFieldSnafu { field: "PDU-type" })?;
            write_chunk_u32(writer, "unknown PDU", |out| {
                out.write_all(data)
                    .context(WriteFieldSnafu { field: "PDU-data" })
            })
        }
    }
}

fn write_application_context(out: &mut Vec<u8>, name: &str) -> Result<()> {
    out.write_all(&[0x10, 0x00])
        .context(WriteFieldSnafu { field: "Item-type" })?;
    write_chunk_u16(out, "application context item", |item| {
        let codec = DefaultCharacterSetCodec;
        let bytes = codec.encode(name).context(EncodeFieldSnafu {
            field: "Application-context-name",
        })?;
        item.write_all(&bytes).context(WriteFieldSnafu {
            field: "Application-context-name",
        })
    })
}

fn write_presentation_context_proposed(
    out: &mut Vec<u8>,
    pc: &PresentationContextProposed,
) -> Result<()> {
    out.write_all(&[0x20, 0x00])
        .context(WriteFieldSnafu { field: "Item-type" })?;
    write_chunk_u16(out, "presentation context item", |item| {
        item.write_all(&[pc.id, 0x00, 0x00, 0x00])
            .context(WriteFieldSnafu { field: "Presentation-context-ID" })?;
        write_uid_sub_item(item, 0x30, &pc.abstract_syntax)?;
        for ts in &pc.transfer_syntaxes {
            write_uid_sub_item(item, 0x40, ts)?;
        }
        Ok(())
    })
}

fn write_presentation_context_result(
    out: &mut Vec<u8>,
    pc: &PresentationContextResult,
) -> Result<()> {
    out.write_all(&[0x21, 0x00])
        .context(WriteFieldSnafu { field: "Item-type" })?;
    write_chunk_u16(out, "presentation context result item", |item| {
        item.write_all(&[pc.id, 0x00, pc.reason as u8, 0x00])
            .context(WriteFieldSnafu { field: "Presentation-context-ID" })?;
        write_uid_sub_item(item, 0x40, &pc.transfer_syntax)
    })
}

fn write_user_information(out: &mut Vec<u8>, items: &[UserVariableItem]) -> Result<()> {
    out.write_all(&[0x50, 0x00])
        .context(WriteFieldSnafu { field: "Item-type" })?;
    write_chunk_u16(out, "user information item", |user| {
        for item in items {
            match item {
                UserVariableItem::MaxLength(max) => {
                    user.write_all(&[0x51, 0x00])
                        .context(WriteFieldSnafu { field: "Item-type" })?;
                    write_chunk_u16(user, "max length sub-item", |sub| {
                        sub.write_u32::<BigEndian>(*max)
                            .context(WriteFieldSnafu { field: "Maximum-length" })
                    })?;
                }
                UserVariableItem::ImplementationClassUID(uid) => {
                    write_uid_sub_item(user, 0x52, uid)?;
                }
                UserVariableItem::ImplementationVersionName(name) => {
                    write_uid_sub_item(user, 0x55, name)?;
                }
                UserVariableItem::UserIdentity(identity) => {
                    user.write_all(&[0x58, 0x00])
                        .context(WriteFieldSnafu { field: "Item-type" })?;
                    write_chunk_u16(user, "user identity sub-item", |sub| {
                        sub.write_all(&[
                            identity.identity_type.to_u8(),
                            identity.positive_response_requested as u8,
                        ])
                        .context(WriteFieldSnafu { field: "User-identity-type" })?;
                        sub.write_u16::<BigEndian>(identity.primary_field.len() as u16)
                            .context(WriteFieldSnafu { field: "Primary-field-length" })?;
                        sub.write_all(&identity.primary_field)
                            .context(WriteFieldSnafu { field: "Primary-field" })?;
                        sub.write_u16::<BigEndian>(identity.secondary_field.len() as u16)
                            .context(WriteFieldSnafu { field: "Secondary-field-length" })?;
                        sub.write_all(&identity.secondary_field)
                            .context(WriteFieldSnafu { field: "Secondary-field" })
                    })?;
                }
                UserVariableItem::UserIdentityAck(response) => {
                    user.write_all(&[0x59, 0x00])
                        .context(WriteFieldSnafu { field: "Item-type" })?;
                    write_chunk_u16(user, "user identity ack sub-item", |sub| {
                        sub.write_u16::<BigEndian>(response.len() as u16)
                            .context(WriteFieldSnafu { field: "Server-response-length" })?;
                        sub.write_all(response)
                            .context(WriteFieldSnafu { field: "Server-response" })
                    })?;
                }
                UserVariableItem::Unknown(sub_type, data) => {
                    user.write_all(&[*sub_type, 0x00])
                        .context(WriteFieldSnafu { field: "Item-type" })?;
                    write_chunk_u16(user, "unknown sub-item", |sub| {
                        sub.write_all(data)
                            .context(WriteFieldSnafu { field: "Item-data" })
                    })?;
                }
            }
        }
        Ok(())
    })
}
