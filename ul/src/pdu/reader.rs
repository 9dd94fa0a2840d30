//! PDU reader module
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};

use byteordered::byteorder::{BigEndian, ReadBytesExt};
use medicom_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use tracing::warn;

use crate::pdu::*;

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid max PDU length {}", max_pdu_length))]
    InvalidMaxPdu {
        max_pdu_length: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("no PDU available"))]
    NoPduAvailable { backtrace: Backtrace },

    #[snafu(display("could not read PDU"))]
    ReadPdu {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not read PDU field `{}`", field))]
    ReadPduField {
        field: &'static str,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("incoming PDU too large: length {}, maximum is {}", pdu_length, max_pdu_length))]
    PduTooLarge {
        pdu_length: u32,
        max_pdu_length: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("invalid item length {} for sub-item {:#04x}", length, item_type))]
    InvalidItemLength { item_type: u8, length: u16 },

    #[snafu(display("could not decode text field `{}`", field))]
    DecodeText {
        field: &'static str,
        source: medicom_encoding::text::DecodeTextError,
    },

    #[snafu(display("invalid reject source or reason"))]
    InvalidRejectSourceOrReason { backtrace: Backtrace },

    #[snafu(display("invalid abort source or reason"))]
    InvalidAbortSourceOrReason { backtrace: Backtrace },

    #[snafu(display("invalid presentation context result reason"))]
    InvalidPresentationContextResultReason { backtrace: Backtrace },

    #[snafu(display("missing application context name"))]
    MissingApplicationContextName { backtrace: Backtrace },

    #[snafu(display("missing abstract syntax"))]
    MissingAbstractSyntax { backtrace: Backtrace },

    #[snafu(display("missing transfer syntax"))]
    MissingTransferSyntax { backtrace: Backtrace },

    #[snafu(display("malformed user identity sub-item"))]
    MalformedUserIdentity { backtrace: Backtrace },

    #[snafu(display("invalid presentation data value"))]
    InvalidPDataValue { backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

fn read_n<R: Read>(reader: &mut R, n: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = vec![0; n];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

fn read_ae_title(cursor: &mut impl Read, field: &'static str) -> Result<String> {
    let mut bytes = [0; 16];
    cursor
        .read_exact(&mut bytes)
        .context(ReadPduFieldSnafu { field })?;
    let codec = DefaultCharacterSetCodec;
    Ok(codec
        .decode(&bytes)
        .context(DecodeTextSnafu { field })?
        .trim()
        .to_string())
}

/// Read one PDU from the given source.
///
/// `max_pdu_length` bounds the incoming PDU length;
/// in non-strict mode, oversized PDUs are tolerated
/// up to the absolute implementation maximum,
/// with a warning.
pub fn read_pdu<R>(reader: &mut R, max_pdu_length: u32, strict: bool) -> Result<Pdu>
where
    R: Read,
{
    ensure!(
        (MINIMUM_PDU_SIZE..=MAXIMUM_PDU_SIZE).contains(&max_pdu_length),
        InvalidMaxPduSnafu { max_pdu_length }
    );

    // Failing to read the first 2 bytes means no PDU was available:
    // the stream may simply have been closed by the peer.
    // Past that point, a premature end of stream is an error.
    let mut bytes = [0; 2];
    if let Err(e) = reader.read_exact(&mut bytes) {
        ensure!(e.kind() != ErrorKind::UnexpectedEof, NoPduAvailableSnafu);
        return Err(e).context(ReadPduFieldSnafu { field: "type" });
    }
    let pdu_type = bytes[0];
    let pdu_length = reader
        .read_u32::<BigEndian>()
        .context(ReadPduFieldSnafu { field: "length" })?;

    if strict {
        ensure!(
            pdu_length <= max_pdu_length,
            PduTooLargeSnafu {
                pdu_length,
                max_pdu_length
            }
        );
    } else if pdu_length > max_pdu_length {
        ensure!(
            pdu_length <= MAXIMUM_PDU_SIZE,
            PduTooLargeSnafu {
                pdu_length,
                max_pdu_length: MAXIMUM_PDU_SIZE
            }
        );
        warn!(
            "incoming PDU too large: length {}, maximum is {}",
            pdu_length, max_pdu_length
        );
    }

    let bytes = read_n(reader, pdu_length as usize).context(ReadPduSnafu)?;
    let mut cursor = Cursor::new(&bytes[..]);

    match pdu_type {
        0x01 | 0x02 => read_associate(pdu_type, &mut cursor, bytes.len()),
        0x03 => {
            // reserved byte, result, source, reason
            let mut fields = [0; 4];
            cursor
                .read_exact(&mut fields)
                .context(ReadPduFieldSnafu { field: "A-ASSOCIATE-RJ" })?;
            let result = match fields[1] {
                1 => AssociationRJResult::Permanent,
                2 => AssociationRJResult::Transient,
                _ => return InvalidRejectSourceOrReasonSnafu.fail(),
            };
            let source = match (fields[2], fields[3]) {
                (1, 1) => AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::NoReasonGiven,
                ),
                (1, 2) => AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
                ),
                (1, 3) => AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                ),
                (1, 7) => AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CalledAETitleNotRecognized,
                ),
                (1, reason) => AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::Reserved(reason),
                ),
                (2, 2) => AssociationRJSource::ServiceProviderAsce(
                    AssociationRJServiceProviderAsceReason::ProtocolVersionNotSupported,
                ),
                (2, _) => AssociationRJSource::ServiceProviderAsce(
                    AssociationRJServiceProviderAsceReason::NoReasonGiven,
                ),
                (3, 1) => AssociationRJSource::ServiceProviderPresentation(
                    AssociationRJServiceProviderPresentationReason::TemporaryCongestion,
                ),
                (3, 2) => AssociationRJSource::ServiceProviderPresentation(
                    AssociationRJServiceProviderPresentationReason::LocalLimitExceeded,
                ),
                (3, reason) => AssociationRJSource::ServiceProviderPresentation(
                    AssociationRJServiceProviderPresentationReason::Reserved(reason),
                ),
                _ => return InvalidRejectSourceOrReasonSnafu.fail(),
            };
            Ok(Pdu::AssociationRJ(AssociationRJ { result, source }))
        }
        0x04 => {
            let mut values = Vec::new();
            while cursor.position() < pdu_length as u64 {
                let length = cursor
                    .read_u32::<BigEndian>()
                    .context(ReadPduFieldSnafu { field: "PDV length" })?;
                ensure!(length >= 2, InvalidPDataValueSnafu);
                let presentation_context_id = cursor
                    .read_u8()
                    .context(ReadPduFieldSnafu { field: "PDV context id" })?;
                let header = cursor
                    .read_u8()
                    .context(ReadPduFieldSnafu { field: "PDV control header" })?;
                let data = read_n(&mut cursor, length as usize - 2).context(ReadPduSnafu)?;
                values.push(PDataValue {
                    presentation_context_id,
                    value_type: if header & 0x01 != 0 {
                        PDataValueType::Command
                    } else {
                        PDataValueType::Data
                    },
                    is_last: header & 0x02 != 0,
                    data,
                });
            }
            Ok(Pdu::PData { data: values })
        }
        0x05 => {
            // 4 reserved bytes
            cursor
                .seek(SeekFrom::Current(4))
                .context(ReadPduFieldSnafu { field: "A-RELEASE-RQ" })?;
            Ok(Pdu::ReleaseRQ)
        }
        0x06 => {
            cursor
                .seek(SeekFrom::Current(4))
                .context(ReadPduFieldSnafu { field: "A-RELEASE-RP" })?;
            Ok(Pdu::ReleaseRP)
        }
        0x07 => {
            // 2 reserved bytes, source, reason
            let mut fields = [0; 4];
            cursor
                .read_exact(&mut fields)
                .context(ReadPduFieldSnafu { field: "A-ABORT" })?;
            let source = match (fields[2], fields[3]) {
                (0, _) => AbortSource::ServiceUser,
                (1, _) => AbortSource::Reserved,
                (2, 0) => AbortSource::ServiceProvider(
                    AbortServiceProviderReason::ReasonNotSpecified,
                ),
                (2, 1) => {
                    AbortSource::ServiceProvider(AbortServiceProviderReason::UnexpectedPdu)
                }
                (2, 2) => AbortSource::ServiceProvider(AbortServiceProviderReason::Reserved),
                (2, 4) => AbortSource::ServiceProvider(
                    AbortServiceProviderReason::UnrecognizedPduParameter,
                ),
                (2, 5) => AbortSource::ServiceProvider(
                    AbortServiceProviderReason::UnexpectedPduParameter,
                ),
                (2, 6) => AbortSource::ServiceProvider(
                    AbortServiceProviderReason::InvalidPduParameter,
                ),
                _ => return InvalidAbortSourceOrReasonSnafu.fail(),
            };
            Ok(Pdu::AbortRQ { source })
        }
        _ => Ok(Pdu::Unknown {
            pdu_type,
            data: bytes,
        }),
    }
}

/// Parse an A-ASSOCIATE-RQ (0x01) or A-ASSOCIATE-AC (0x02) payload.
fn read_associate(pdu_type: u8, cursor: &mut Cursor<&[u8]>, total: usize) -> Result<Pdu> {
    let protocol_version = cursor
        .read_u16::<BigEndian>()
        .context(ReadPduFieldSnafu { field: "Protocol-version" })?;
    cursor
        .seek(SeekFrom::Current(2))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;
    let called_ae_title = read_ae_title(cursor, "Called-AE-title")?;
    let calling_ae_title = read_ae_title(cursor, "Calling-AE-title")?;
    cursor
        .seek(SeekFrom::Current(32))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;

    let mut application_context_name = None;
    let mut proposed = Vec::new();
    let mut results = Vec::new();
    let mut user_variables = Vec::new();

    while (cursor.position() as usize) < total {
        let item_type = cursor
            .read_u8()
            .context(ReadPduFieldSnafu { field: "Item-type" })?;
        cursor
            .seek(SeekFrom::Current(1))
            .context(ReadPduFieldSnafu { field: "Reserved" })?;
        let item_length = cursor
            .read_u16::<BigEndian>()
            .context(ReadPduFieldSnafu { field: "Item-length" })?;
        let item_data = read_n(cursor, item_length as usize).context(ReadPduSnafu)?;
        let mut item = Cursor::new(&item_data[..]);

        match item_type {
            0x10 => {
                let codec = DefaultCharacterSetCodec;
                application_context_name = Some(
                    codec
                        .decode(&item_data)
                        .context(DecodeTextSnafu {
                            field: "Application-context-name",
                        })?
                        .trim()
                        .to_string(),
                );
            }
            0x20 => proposed.push(read_presentation_context_proposed(&mut item, &item_data)?),
            0x21 => results.push(read_presentation_context_result(&mut item, &item_data)?),
            0x50 => user_variables = read_user_information(&mut item, &item_data)?,
            other => {
                warn!("ignoring unknown association item type {:#04x}", other);
            }
        }
    }

    let application_context_name =
        application_context_name.context(MissingApplicationContextNameSnafu)?;

    if pdu_type == 0x01 {
        Ok(Pdu::AssociationRQ(AssociationRQ {
            protocol_version,
            calling_ae_title,
            called_ae_title,
            application_context_name,
            presentation_contexts: proposed,
            user_variables,
        }))
    } else {
        Ok(Pdu::AssociationAC(AssociationAC {
            protocol_version,
            called_ae_title,
            calling_ae_title,
            application_context_name,
            presentation_contexts: results,
            user_variables,
        }))
    }
}

fn read_uid_sub_item(
    cursor: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<(u8, String)> {
    let item_type = cursor
        .read_u8()
        .context(ReadPduFieldSnafu { field: "Item-type" })?;
    cursor
        .seek(SeekFrom::Current(1))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;
    let length = cursor
        .read_u16::<BigEndian>()
        .context(ReadPduFieldSnafu { field: "Item-length" })?;
    let data = read_n(cursor, length as usize).context(ReadPduSnafu)?;
    let codec = DefaultCharacterSetCodec;
    let uid = codec
        .decode(&data)
        .context(DecodeTextSnafu { field })?
        .trim_end_matches(['\0', ' '])
        .to_string();
    Ok((item_type, uid))
}

fn read_presentation_context_proposed(
    cursor: &mut Cursor<&[u8]>,
    item_data: &[u8],
) -> Result<PresentationContextProposed> {
    let id = cursor
        .read_u8()
        .context(ReadPduFieldSnafu { field: "Presentation-context-ID" })?;
    cursor
        .seek(SeekFrom::Current(3))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;

    let mut abstract_syntax = None;
    let mut transfer_syntaxes = Vec::new();
    while (cursor.position() as usize) < item_data.len() {
        let (sub_type, uid) = read_uid_sub_item(cursor, "Syntax-name")?;
        match sub_type {
            0x30 => abstract_syntax = Some(uid),
            0x40 => transfer_syntaxes.push(uid),
            other => warn!("ignoring unknown presentation context sub-item {:#04x}", other),
        }
    }

    let abstract_syntax = abstract_syntax.context(MissingAbstractSyntaxSnafu)?;
    ensure!(!transfer_syntaxes.is_empty(), MissingTransferSyntaxSnafu);
    Ok(PresentationContextProposed {
        id,
        abstract_syntax,
        transfer_syntaxes,
    })
}

fn read_presentation_context_result(
    cursor: &mut Cursor<&[u8]>,
    item_data: &[u8],
) -> Result<PresentationContextResult> {
    let id = cursor
        .read_u8()
        .context(ReadPduFieldSnafu { field: "Presentation-context-ID" })?;
    cursor
        .seek(SeekFrom::Current(1))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;
    let reason_byte = cursor
        .read_u8()
        .context(ReadPduFieldSnafu { field: "Result/Reason" })?;
    cursor
        .seek(SeekFrom::Current(1))
        .context(ReadPduFieldSnafu { field: "Reserved" })?;
    let reason = match reason_byte {
        0 => PresentationContextResultReason::Acceptance,
        1 => PresentationContextResultReason::UserRejection,
        2 => PresentationContextResultReason::NoReason,
        3 => PresentationContextResultReason::AbstractSyntaxNotSupported,
        4 => PresentationContextResultReason::TransferSyntaxesNotSupported,
        _ => return InvalidPresentationContextResultReasonSnafu.fail(),
    };

    let mut transfer_syntax = String::new();
    while (cursor.position() as usize) < item_data.len() {
        let (sub_type, uid) = read_uid_sub_item(cursor, "Transfer-syntax-name")?;
        if sub_type == 0x40 {
            transfer_syntax = uid;
        }
    }
    ensure!(
        !transfer_syntax.is_empty() || reason != PresentationContextResultReason::Acceptance,
        MissingTransferSyntaxSnafu
    );
    Ok(PresentationContextResult {
        id,
        reason,
        transfer_syntax,
    })
}

fn read_user_information(
    cursor: &mut Cursor<&[u8]>,
    item_data: &[u8],
) -> Result<Vec<UserVariableItem>> {
    let mut items = Vec::new();
    let codec = DefaultCharacterSetCodec;
    while (cursor.position() as usize) < item_data.len() {
        let sub_type = cursor
            .read_u8()
            .context(ReadPduFieldSnafu { field: "Item-type" })?;
        cursor
            .seek(SeekFrom::Current(1))
            .context(ReadPduFieldSnafu { field: "Reserved" })?;
        let length = cursor
            .read_u16::<BigEndian>()
            .context(ReadPduFieldSnafu { field: "Item-length" })?;
        let data = read_n(cursor, length as usize).context(ReadPduSnafu)?;

        match sub_type {
            0x51 => {
                ensure!(
                    data.len() == 4,
                    InvalidItemLengthSnafu {
                        item_type: 0x51_u8,
                        length
                    }
                );
                items.push(UserVariableItem::MaxLength(u32::from_be_bytes([
                    data[0], data[1], data[2], data[3],
                ])));
            }
            0x52 => {
                let uid = codec
                    .decode(&data)
                    .context(DecodeTextSnafu {
                        field: "Implementation-class-UID",
                    })?
                    .trim_end_matches(['\0', ' '])
                    .to_string();
                items.push(UserVariableItem::ImplementationClassUID(uid));
            }
            0x55 => {
                let name = codec
                    .decode(&data)
                    .context(DecodeTextSnafu {
                        field: "Implementation-version-name",
                    })?
                    .trim()
                    .to_string();
                items.push(UserVariableItem::ImplementationVersionName(name));
            }
            0x58 => items.push(UserVariableItem::UserIdentity(read_user_identity(&data)?)),
            0x59 => {
                // reserved or server response with a 2-byte length prefix
                let response = if data.len() >= 2 {
                    let n = u16::from_be_bytes([data[0], data[1]]) as usize;
                    ensure!(data.len() >= 2 + n, MalformedUserIdentitySnafu);
                    data[2..2 + n].to_vec()
                } else {
                    Vec::new()
                };
                items.push(UserVariableItem::UserIdentityAck(response));
            }
            other => items.push(UserVariableItem::Unknown(other, data)),
        }
    }
    Ok(items)
}

fn read_user_identity(data: &[u8]) -> Result<UserIdentityRequest> {
    ensure!(data.len() >= 4, MalformedUserIdentitySnafu);
    let identity_type =
        UserIdentityType::from_u8(data[0]).context(MalformedUserIdentitySnafu)?;
    let positive_response_requested = data[1] != 0;
    let primary_len = u16::from_be_bytes([data[2], data[3]]) as usize;
    ensure!(data.len() >= 4 + primary_len + 2, MalformedUserIdentitySnafu);
    let primary_field = data[4..4 + primary_len].to_vec();
    let secondary_off = 4 + primary_len;
    let secondary_len =
        u16::from_be_bytes([data[secondary_off], data[secondary_off + 1]]) as usize;
    ensure!(
        data.len() >= secondary_off + 2 + secondary_len,
        MalformedUserIdentitySnafu
    );
    let secondary_field = data[secondary_off + 2..secondary_off + 2 + secondary_len].to_vec();
    Ok(UserIdentityRequest {
        identity_type,
        positive_response_requested,
        primary_field,
        secondary_field,
    })
}
