//! End-to-end service tests over loopback TCP:
//! echo, find, store and storage commitment.
use std::sync::Arc;

use tokio::net::TcpListener;

use medicom_core::dictionary::{tags, uids};
use medicom_core::header::VR;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::write::write_data_set;
use medicom_object::{DataSet, FileMetaTableBuilder, FileObject};
use medicom_net::command::{
    action_rsp, event_report_rq, find_rsp, CommandField, Status,
};
use medicom_net::commitment::{
    self, CommitmentOutcome, CommitmentTracker, SopReference,
};
use medicom_net::dimse::{receive_message, send_message, Incoming};
use medicom_net::find::{find, QueryModel};
use medicom_net::scp::{AcceptAllDelegate, ScpEvent, StorageScp, StorageScpOptions};
use medicom_net::store::store_one;
use medicom_net::{echo, Peer};
use medicom_ul::association::client::ClientAssociationOptions;
use medicom_ul::association::server::ServerAssociationOptions;

async fn loopback() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    (listener, address)
}

fn secondary_capture_object() -> FileObject {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("2.25.4242")
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .build()
        .unwrap();
    let mut data = DataSet::new();
    data.put_value(
        tags::SOP_CLASS_UID,
        VR::UI,
        uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
    );
    data.put_value(tags::SOP_INSTANCE_UID, VR::UI, "2.25.4242");
    data.put_value(tags::MODALITY, VR::CS, "OT");
    data.put_value(tags::CONVERSION_TYPE, VR::CS, "WSD");
    data.put_value(tags::ROWS, VR::US, 1_u16);
    data.put_value(tags::COLUMNS, VR::US, 1_u16);
    data.put_value(tags::BITS_ALLOCATED, VR::US, 8_u16);
    data.put_value(tags::BITS_STORED, VR::US, 8_u16);
    data.put_value(tags::HIGH_BIT, VR::US, 7_u16);
    data.put_value(tags::PIXEL_REPRESENTATION, VR::US, 0_u16);
    data.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16);
    data.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
    // one padded pixel sample, kept as OW word data so that the
    // element reads back identically under any uncompressed syntax
    data.put_value(
        tags::PIXEL_DATA,
        VR::OW,
        medicom_core::value::PrimitiveValue::U16(smallvec::smallvec![0x00AB]),
    );
    FileObject::new(meta, data)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn echo_against_the_storage_scp() {
    let (listener, address) = loopback().await;
    let (scp, _events) = StorageScp::new(
        StorageScpOptions {
            ae_title: "ORTHANC".to_string(),
            ..Default::default()
        },
        Arc::new(AcceptAllDelegate),
    );
    tokio::spawn(scp.run(listener));

    let peer = Peer::new(address, "ORTHANC").calling_ae_title("DICOM_VIEWER");
    echo::echo(&peer).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_round_trip_through_the_scp() {
    let (listener, address) = loopback().await;
    let (scp, mut events) = StorageScp::new(
        StorageScpOptions::default(),
        Arc::new(AcceptAllDelegate),
    );
    tokio::spawn(scp.run(listener));

    let object = secondary_capture_object();
    let peer = Peer::new(address, "MEDICOM-SCP").calling_ae_title("STORE-SCU");
    let status = store_one(&peer, object.clone()).await.unwrap();
    assert!(status.is_success());

    // the delegate observes a byte-level equal data set
    let received = loop {
        match events.recv().await.expect("event stream ended") {
            ScpEvent::InstanceReceived(instance) => break instance,
            _ => continue,
        }
    };
    assert_eq!(received.sop_instance_uid, "2.25.4242");
    assert_eq!(
        received.sop_class_uid,
        uids::SECONDARY_CAPTURE_IMAGE_STORAGE
    );

    // compare against the object after its own encoding round trip
    let ts = TransferSyntaxRegistry
        .get(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .unwrap();
    let mut bytes = Vec::new();
    write_data_set(&mut bytes, object.data(), ts).unwrap();
    let expected = read_data_set(&bytes[..], ts, ParseMode::Lenient).unwrap();
    assert_eq!(received.object.data(), &expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn find_streams_each_match() {
    let (listener, address) = loopback().await;

    // a minimal C-FIND SCP holding two matching studies
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut association = ServerAssociationOptions::new()
            .establish(stream)
            .await
            .unwrap();
        let message = match receive_message(&mut association).await.unwrap() {
            Incoming::Message(message) => message,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(message.command.field, CommandField::CFindRq);
        let context = association.presentation_contexts()[0].clone();
        let ts = TransferSyntaxRegistry.get(&context.transfer_syntax).unwrap();

        // the matching keys carry the requested return keys
        let keys = read_data_set(
            &message.data.unwrap()[..],
            ts,
            ParseMode::Lenient,
        )
        .unwrap();
        assert_eq!(keys.string(tags::PATIENT_NAME).unwrap(), "SMITH*");
        let message_id = message.command.message_id.unwrap();

        for study_uid in ["2.25.10", "2.25.11"] {
            let mut matched = DataSet::new();
            matched.put_value(tags::QUERY_RETRIEVE_LEVEL, VR::CS, "STUDY");
            matched.put_value(tags::PATIENT_NAME, VR::PN, "SMITH^JOHN");
            matched.put_value(tags::STUDY_DATE, VR::DA, "20240615");
            matched.put_value(tags::STUDY_INSTANCE_UID, VR::UI, study_uid);
            let mut bytes = Vec::new();
            write_data_set(&mut bytes, &matched, ts).unwrap();
            send_message(
                &mut association,
                context.id,
                &find_rsp(
                    message_id,
                    uids::STUDY_ROOT_QUERY_RETRIEVE_FIND,
                    Status::PENDING,
                ),
                Some(&bytes),
            )
            .await
            .unwrap();
        }
        send_message(
            &mut association,
            context.id,
            &find_rsp(
                message_id,
                uids::STUDY_ROOT_QUERY_RETRIEVE_FIND,
                Status::SUCCESS,
            ),
            None,
        )
        .await
        .unwrap();

        match association.receive().await.unwrap() {
            medicom_ul::Pdu::ReleaseRQ => association.confirm_release().await.unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    });

    let mut keys = DataSet::new();
    keys.put_value(tags::QUERY_RETRIEVE_LEVEL, VR::CS, "STUDY");
    keys.put_value(tags::PATIENT_NAME, VR::PN, "SMITH*");
    keys.put_value(tags::STUDY_DATE, VR::DA, "");
    keys.put_value(tags::STUDY_INSTANCE_UID, VR::UI, "");

    let peer = Peer::new(address, "PACS").calling_ae_title("FIND-SCU");
    let matches = find(&peer, QueryModel::StudyRoot, keys)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].string(tags::PATIENT_NAME).unwrap(), "SMITH^JOHN");
    assert_eq!(matches[0].string(tags::STUDY_INSTANCE_UID).unwrap(), "2.25.10");
    assert_eq!(matches[1].string(tags::STUDY_INSTANCE_UID).unwrap(), "2.25.11");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commitment_round_trip() {
    let tracker = CommitmentTracker::new();

    // the SCP which acknowledges the N-ACTION request
    let (listener, address) = loopback().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut association = ServerAssociationOptions::new()
            .establish(stream)
            .await
            .unwrap();
        let message = match receive_message(&mut association).await.unwrap() {
            Incoming::Message(message) => message,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(message.command.field, CommandField::NActionRq);
        let context = association.presentation_contexts()[0].clone();
        let ts = TransferSyntaxRegistry.get(&context.transfer_syntax).unwrap();
        let action_info = read_data_set(
            &message.data.unwrap()[..],
            ts,
            ParseMode::Lenient,
        )
        .unwrap();
        let transaction_uid = action_info.uid(tags::TRANSACTION_UID).unwrap().to_string();
        let referenced = action_info
            .element(tags::REFERENCED_SOP_SEQUENCE)
            .unwrap()
            .value()
            .items()
            .unwrap()
            .to_vec();
        assert_eq!(referenced.len(), 1);

        send_message(
            &mut association,
            context.id,
            &action_rsp(
                message.command.message_id.unwrap(),
                uids::STORAGE_COMMITMENT_PUSH_MODEL,
                uids::STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE,
                Status::SUCCESS,
            ),
            None,
        )
        .await
        .unwrap();
        match association.receive().await.unwrap() {
            medicom_ul::Pdu::ReleaseRQ => association.confirm_release().await.unwrap(),
            other => panic!("unexpected {:?}", other),
        }

        // deliver the commitment result on a reverse-role association
        transaction_uid
    });

    // the listener which receives the N-EVENT-REPORT
    let (report_listener, report_address) = loopback().await;
    tokio::spawn(commitment::serve_event_reports(
        report_listener,
        "COMMIT-SCU".to_string(),
        tracker.clone(),
        Default::default(),
    ));

    let peer = Peer::new(address, "PACS").calling_ae_title("COMMIT-SCU");
    let awaiter = commitment::request(
        &peer,
        &tracker,
        vec![SopReference {
            sop_class_uid: uids::SECONDARY_CAPTURE_IMAGE_STORAGE.to_string(),
            sop_instance_uid: "2.25.4242".to_string(),
        }],
    )
    .await
    .unwrap();
    let transaction_uid = awaiter.transaction_uid().to_string();

    // simulate the PACS delivering the result
    let mut association = ClientAssociationOptions::new()
        .calling_ae_title("PACS")
        .called_ae_title("COMMIT-SCU")
        .with_presentation_context(
            uids::STORAGE_COMMITMENT_PUSH_MODEL,
            vec![uids::EXPLICIT_VR_LITTLE_ENDIAN],
        )
        .establish(report_address)
        .await
        .unwrap();
    let context = association.presentation_contexts()[0].clone();
    let ts = TransferSyntaxRegistry.get(&context.transfer_syntax).unwrap();

    let mut report = DataSet::new();
    report.put_value(tags::TRANSACTION_UID, VR::UI, transaction_uid.as_str());
    {
        use medicom_core::header::Length;
        use medicom_core::value::Value;
        let mut item = DataSet::new();
        item.put_value(
            tags::REFERENCED_SOP_CLASS_UID,
            VR::UI,
            uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
        );
        item.put_value(tags::REFERENCED_SOP_INSTANCE_UID, VR::UI, "2.25.4242");
        report.put(medicom_object::DataElement::new(
            tags::REFERENCED_SOP_SEQUENCE,
            VR::SQ,
            Value::Sequence {
                items: smallvec::smallvec![item],
                length: Length::UNDEFINED,
            },
        ));
    }
    let mut report_bytes = Vec::new();
    write_data_set(&mut report_bytes, &report, ts).unwrap();
    send_message(
        &mut association,
        context.id,
        &event_report_rq(
            1,
            uids::STORAGE_COMMITMENT_PUSH_MODEL,
            uids::STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE,
            1,
        ),
        Some(&report_bytes),
    )
    .await
    .unwrap();
    let response = match receive_message(&mut association).await.unwrap() {
        Incoming::Message(message) => message,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(response.command.field, CommandField::NEventReportRsp);
    assert!(response.command.expect_status().unwrap().is_success());
    association.release().await.unwrap();

    // the awaiter completes with a successful outcome
    match awaiter.outcome().await.unwrap() {
        CommitmentOutcome::Success { committed } => {
            assert_eq!(committed.len(), 1);
            assert_eq!(committed[0].sop_instance_uid, "2.25.4242");
        }
        other => panic!("expected success, got {:?}", other),
    }
}
