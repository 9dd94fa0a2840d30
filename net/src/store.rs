//! Storage service (C-STORE) as a service class user,
//! for single instances and batches.
use std::collections::BTreeSet;

use snafu::ResultExt;
use tokio::sync::mpsc;
use tracing::debug;

use medicom_core::dictionary::uids;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::write::write_data_set;
use medicom_object::FileObject;

use crate::command::{store_rq, CommandField, Priority, Status};
use crate::dimse::{context_for, receive_message, send_message, Incoming, MessageIdAllocator};
use crate::error::{Error, ProtocolEncodeSnafu, Result};
use crate::peer::Peer;

/// What to do with the remaining instances
/// after one of them fails to store.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum StoreFailurePolicy {
    /// stop at the first failure
    FailFast,
    /// attempt every instance regardless of failures
    #[default]
    Continue,
}

/// The outcome of storing one instance.
#[derive(Debug)]
pub struct StoreOutcome {
    /// the SOP instance UID of the instance
    pub sop_instance_uid: String,
    /// the outcome: the response status, or the error which precluded it
    pub result: Result<Status>,
}

/// A stream of per-instance store outcomes.
pub struct StoreStream {
    receiver: mpsc::Receiver<StoreOutcome>,
}

impl StoreStream {
    /// Await the outcome of the next instance.
    pub async fn next(&mut self) -> Option<StoreOutcome> {
        self.receiver.recv().await
    }

    /// Await all outcomes.
    pub async fn collect(mut self) -> Vec<StoreOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Store a single instance, establishing a dedicated association.
pub async fn store_one(peer: &Peer, object: FileObject) -> Result<Status> {
    let mut stream = store(peer, vec![object], StoreFailurePolicy::FailFast).await?;
    match stream.next().await {
        Some(outcome) => outcome.result,
        None => Err(Error::PeerClosed),
    }
}

/// Store a batch of instances over one association.
///
/// The union of the SOP classes of all instances is negotiated
/// up front; each instance's own transfer syntax is proposed
/// next to the uncompressed defaults.
/// Outcomes surface per instance, in order.
pub async fn store(
    peer: &Peer,
    objects: Vec<FileObject>,
    policy: StoreFailurePolicy,
) -> Result<StoreStream> {
    // negotiate the union of SOP classes and transfer syntaxes needed
    let mut sop_classes: BTreeSet<String> = BTreeSet::new();
    let mut transfer_syntaxes: BTreeSet<String> = BTreeSet::new();
    for object in &objects {
        sop_classes.insert(object.meta().media_storage_sop_class_uid().to_string());
        transfer_syntaxes.insert(object.meta().transfer_syntax().to_string());
    }
    transfer_syntaxes.insert(uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string());
    transfer_syntaxes.insert(uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string());

    let mut options = peer.association_options();
    for sop_class in &sop_classes {
        options = options.with_presentation_context(
            sop_class.clone(),
            transfer_syntaxes.iter().cloned().collect::<Vec<_>>(),
        );
    }
    let mut association = options.establish(&peer.address).await?;

    let (sender, receiver) = mpsc::channel(4);
    let operation_timeout = peer.timeouts.operation;

    tokio::spawn(async move {
        let mut ids = MessageIdAllocator::new();
        let mut failed = false;

        for object in objects {
            let sop_instance_uid = object.meta().media_storage_sop_instance_uid().to_string();
            if failed && matches!(policy, StoreFailurePolicy::FailFast) {
                let _ = sender
                    .send(StoreOutcome {
                        sop_instance_uid,
                        result: Err(Error::Cancelled),
                    })
                    .await;
                continue;
            }

            let result = tokio::time::timeout(
                operation_timeout,
                store_instance(&mut association, &mut ids, &object),
            )
            .await
            .unwrap_or(Err(Error::OperationTimeout { operation: "store" }));

            match &result {
                Ok(status) if status.is_success() => {}
                _ => failed = true,
            }
            if sender
                .send(StoreOutcome {
                    sop_instance_uid,
                    result,
                })
                .await
                .is_err()
            {
                debug!("store consumer dropped; aborting");
                let _ = association.abort().await;
                return;
            }
        }
        let _ = association.release().await;
    });

    Ok(StoreStream { receiver })
}

/// Send one C-STORE-RQ over an established association
/// and await its response.
async fn store_instance(
    association: &mut medicom_ul::association::client::ClientAssociation,
    ids: &mut MessageIdAllocator,
    object: &FileObject,
) -> Result<Status> {
    let sop_class_uid = object.meta().media_storage_sop_class_uid().to_string();
    let sop_instance_uid = object.meta().media_storage_sop_instance_uid().to_string();
    let context = context_for(association.presentation_contexts(), &sop_class_uid)?.clone();

    // encode the data set under the accepted transfer syntax
    let accepted_ts = TransferSyntaxRegistry
        .get(&context.transfer_syntax)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class_uid.clone(),
        })?;
    let file_ts = object
        .transfer_syntax()
        .map_err(|_| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class_uid.clone(),
        })?;
    if accepted_ts.uid() != file_ts.uid() && file_ts.is_encapsulated() {
        // encapsulated pixel data cannot be re-encoded here
        return Err(Error::NoSuitablePresentationContext {
            sop_class_uid,
        });
    }
    let mut data_bytes = Vec::new();
    write_data_set(&mut data_bytes, object.data(), accepted_ts)
        .context(ProtocolEncodeSnafu)?;

    let message_id = ids.allocate();
    send_message(
        association,
        context.id,
        &store_rq(
            message_id,
            &sop_class_uid,
            &sop_instance_uid,
            Priority::Medium,
        ),
        Some(&data_bytes),
    )
    .await?;

    let response = match receive_message(association).await? {
        Incoming::Message(message) => message,
        Incoming::Release => return Err(Error::PeerClosed),
    };
    if response.command.field != CommandField::CStoreRsp {
        return Err(Error::CommandDataMismatch { operation: "store" });
    }
    if let Some(responded_to) = response.command.responded_to {
        ids.complete(responded_to)?;
    }
    let status = response.command.expect_status()?;
    if status.is_success() || status.class() == crate::command::StatusClass::Warning {
        Ok(status)
    } else {
        Err(Error::ServiceStatus {
            status,
            sop_instance_uid: Some(sop_instance_uid),
            message_id: Some(message_id),
        })
    }
}
