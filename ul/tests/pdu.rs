//! PDU codec round trip tests.
use medicom_ul::pdu::reader::read_pdu;
use medicom_ul::pdu::writer::write_pdu;
use medicom_ul::pdu::*;

fn round_trip(pdu: Pdu) {
    let mut bytes = Vec::new();
    write_pdu(&mut bytes, &pdu).unwrap();
    let mut cursor = &bytes[..];
    let decoded = read_pdu(&mut cursor, MAXIMUM_PDU_SIZE, true).unwrap();
    assert_eq!(decoded, pdu);
    assert!(cursor.is_empty(), "trailing bytes after PDU");
}

#[test]
fn associate_rq_round_trip() {
    round_trip(Pdu::AssociationRQ(AssociationRQ {
        protocol_version: 1,
        calling_ae_title: "DICOM_VIEWER".to_string(),
        called_ae_title: "ORTHANC".to_string(),
        application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
        presentation_contexts: vec![
            PresentationContextProposed {
                id: 1,
                abstract_syntax: "1.2.840.10008.1.1".to_string(),
                transfer_syntaxes: vec![
                    "1.2.840.10008.1.2.1".to_string(),
                    "1.2.840.10008.1.2".to_string(),
                ],
            },
            PresentationContextProposed {
                id: 3,
                abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                transfer_syntaxes: vec!["1.2.840.10008.1.2.1".to_string()],
            },
        ],
        user_variables: vec![
            UserVariableItem::MaxLength(16384),
            UserVariableItem::ImplementationClassUID("1.2.3.4".to_string()),
            UserVariableItem::ImplementationVersionName("TEST_010".to_string()),
        ],
    }));
}

#[test]
fn associate_rq_with_user_identity_round_trip() {
    round_trip(Pdu::AssociationRQ(AssociationRQ {
        protocol_version: 1,
        calling_ae_title: "SCU".to_string(),
        called_ae_title: "SCP".to_string(),
        application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
        presentation_contexts: vec![PresentationContextProposed {
            id: 1,
            abstract_syntax: "1.2.840.10008.1.1".to_string(),
            transfer_syntaxes: vec!["1.2.840.10008.1.2".to_string()],
        }],
        user_variables: vec![UserVariableItem::UserIdentity(UserIdentityRequest {
            identity_type: UserIdentityType::UsernameAndPasscode,
            positive_response_requested: true,
            primary_field: b"operator".to_vec(),
            secondary_field: b"secret".to_vec(),
        })],
    }));
}

#[test]
fn associate_ac_round_trip() {
    round_trip(Pdu::AssociationAC(AssociationAC {
        protocol_version: 1,
        called_ae_title: "ORTHANC".to_string(),
        calling_ae_title: "DICOM_VIEWER".to_string(),
        application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
        presentation_contexts: vec![
            PresentationContextResult {
                id: 1,
                reason: PresentationContextResultReason::Acceptance,
                transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
            },
            PresentationContextResult {
                id: 3,
                reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                transfer_syntax: String::new(),
            },
        ],
        user_variables: vec![UserVariableItem::MaxLength(32768)],
    }));
}

#[test]
fn associate_rj_round_trip() {
    round_trip(Pdu::AssociationRJ(AssociationRJ {
        result: AssociationRJResult::Permanent,
        source: AssociationRJSource::ServiceUser(
            AssociationRJServiceUserReason::CalledAETitleNotRecognized,
        ),
    }));
    round_trip(Pdu::AssociationRJ(AssociationRJ {
        result: AssociationRJResult::Transient,
        source: AssociationRJSource::ServiceProviderPresentation(
            AssociationRJServiceProviderPresentationReason::TemporaryCongestion,
        ),
    }));
}

#[test]
fn p_data_round_trip() {
    round_trip(Pdu::PData {
        data: vec![
            PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Command,
                is_last: true,
                data: vec![8, 0, 0, 0],
            },
            PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Data,
                is_last: false,
                data: vec![0xAB; 128],
            },
        ],
    });
}

#[test]
fn release_and_abort_round_trip() {
    round_trip(Pdu::ReleaseRQ);
    round_trip(Pdu::ReleaseRP);
    round_trip(Pdu::AbortRQ {
        source: AbortSource::ServiceUser,
    });
    round_trip(Pdu::AbortRQ {
        source: AbortSource::ServiceProvider(AbortServiceProviderReason::UnexpectedPdu),
    });
}

#[test]
fn oversized_pdu_is_rejected_in_strict_mode() {
    let pdu = Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Data,
            is_last: true,
            data: vec![0; 8192],
        }],
    };
    let mut bytes = Vec::new();
    write_pdu(&mut bytes, &pdu).unwrap();
    let mut cursor = &bytes[..];
    let err = read_pdu(&mut cursor, MINIMUM_PDU_SIZE, true).unwrap_err();
    assert!(matches!(
        err,
        medicom_ul::pdu::reader::Error::PduTooLarge { .. }
    ));
}

#[test]
fn closed_stream_reports_no_pdu_available() {
    let mut cursor: &[u8] = &[];
    let err = read_pdu(&mut cursor, MINIMUM_PDU_SIZE, true).unwrap_err();
    assert!(matches!(
        err,
        medicom_ul::pdu::reader::Error::NoPduAvailable { .. }
    ));
}
