//! Storage commitment push model (PS3.4 annex J):
//! N-ACTION requests as the service class user,
//! and correlation of the asynchronous N-EVENT-REPORT results.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use medicom_core::dictionary::{tags, uids};
use medicom_core::header::{Length, VR};
use medicom_core::value::Value;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::write::write_data_set;
use medicom_object::{DataElement, DataSet};
use medicom_ul::association::server::ServerAssociationOptions;
use medicom_ul::association::TimeoutProfile;

use crate::command::{
    action_rq, event_report_rsp, CommandField, Status,
};
use crate::dimse::{receive_message, send_message, Incoming, MessageIdAllocator};
use crate::error::{Error, ProtocolEncodeSnafu, ProtocolParseSnafu, Result};
use crate::peer::Peer;

/// A reference to one SOP instance under commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SopReference {
    /// the SOP class UID
    pub sop_class_uid: String,
    /// the SOP instance UID
    pub sop_instance_uid: String,
}

/// The final outcome of a storage commitment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitmentOutcome {
    /// all referenced instances were committed
    Success {
        /// the committed instances
        committed: Vec<SopReference>,
    },
    /// some instances were committed, some failed
    Partial {
        /// the committed instances
        committed: Vec<SopReference>,
        /// the failed instances
        failed: Vec<SopReference>,
    },
    /// no instance was committed
    Failure {
        /// the failed instances
        failed: Vec<SopReference>,
    },
}

/// An outstanding commitment transaction.
#[derive(Debug, Clone)]
pub struct CommitmentTransaction {
    /// the transaction UID
    pub transaction_uid: String,
    /// the referenced instances
    pub referenced: Vec<SopReference>,
    /// when the N-ACTION request was sent
    pub sent_at: DateTime<Utc>,
}

/// Awaits the outcome of one commitment transaction.
pub struct CommitmentAwaiter {
    transaction_uid: String,
    receiver: oneshot::Receiver<CommitmentOutcome>,
}

impl CommitmentAwaiter {
    /// The transaction UID awaited on.
    pub fn transaction_uid(&self) -> &str {
        &self.transaction_uid
    }

    /// Wait for the commitment result.
    pub async fn outcome(self) -> Result<CommitmentOutcome> {
        self.receiver.await.map_err(|_| Error::UnknownTransaction {
            transaction_uid: self.transaction_uid,
        })
    }
}

struct PendingTransaction {
    transaction: CommitmentTransaction,
    completion: oneshot::Sender<CommitmentOutcome>,
}

/// Tracks commitment transactions across associations.
///
/// Transactions are keyed by their transaction UID and survive
/// the association which initiated them; results arriving through
/// any association complete the matching awaiter.
#[derive(Clone, Default)]
pub struct CommitmentTracker {
    pending: Arc<Mutex<HashMap<String, PendingTransaction>>>,
}

impl CommitmentTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction and obtain its awaiter.
    pub fn register(&self, transaction: CommitmentTransaction) -> CommitmentAwaiter {
        let (completion, receiver) = oneshot::channel();
        let transaction_uid = transaction.transaction_uid.clone();
        self.pending
            .lock()
            .expect("commitment tracker lock poisoned")
            .insert(
                transaction_uid.clone(),
                PendingTransaction {
                    transaction,
                    completion,
                },
            );
        CommitmentAwaiter {
            transaction_uid,
            receiver,
        }
    }

    /// The transactions still awaiting a result.
    pub fn outstanding(&self) -> Vec<CommitmentTransaction> {
        self.pending
            .lock()
            .expect("commitment tracker lock poisoned")
            .values()
            .map(|p| p.transaction.clone())
            .collect()
    }

    /// Complete a transaction from a received event report data set.
    ///
    /// Returns the transaction UID on success,
    /// or an error when the transaction is unknown.
    pub fn complete_from_report(&self, report: &DataSet) -> Result<String> {
        let transaction_uid = report
            .uid(tags::TRANSACTION_UID)
            .map_err(|_| Error::MalformedCommand {
                tag: tags::TRANSACTION_UID,
            })?
            .to_string();
        let committed = read_sop_references(report, tags::REFERENCED_SOP_SEQUENCE);
        let failed = read_sop_references(report, tags::FAILED_SOP_SEQUENCE);

        let pending = self
            .pending
            .lock()
            .expect("commitment tracker lock poisoned")
            .remove(&transaction_uid);
        let pending = pending.ok_or_else(|| Error::UnknownTransaction {
            transaction_uid: transaction_uid.clone(),
        })?;

        let outcome = match (committed.is_empty(), failed.is_empty()) {
            (_, true) => CommitmentOutcome::Success { committed },
            (true, false) => CommitmentOutcome::Failure { failed },
            (false, false) => CommitmentOutcome::Partial { committed, failed },
        };
        if pending.completion.send(outcome).is_err() {
            debug!("commitment awaiter for {} was dropped", transaction_uid);
        }
        Ok(transaction_uid)
    }
}

fn read_sop_references(ds: &DataSet, tag: medicom_core::header::Tag) -> Vec<SopReference> {
    let mut references = Vec::new();
    if let Some(items) = ds.get(tag).and_then(|e| e.value().items()) {
        for item in items {
            let sop_class_uid = item
                .uid(tags::REFERENCED_SOP_CLASS_UID)
                .map(|s| s.to_string())
                .unwrap_or_default();
            let sop_instance_uid = item
                .uid(tags::REFERENCED_SOP_INSTANCE_UID)
                .map(|s| s.to_string())
                .unwrap_or_default();
            references.push(SopReference {
                sop_class_uid,
                sop_instance_uid,
            });
        }
    }
    references
}

fn sop_reference_sequence(references: &[SopReference]) -> DataElement {
    let items: medicom_core::value::C<DataSet> = references
        .iter()
        .map(|reference| {
            let mut item = DataSet::new();
            item.put_value(
                tags::REFERENCED_SOP_CLASS_UID,
                VR::UI,
                reference.sop_class_uid.as_str(),
            );
            item.put_value(
                tags::REFERENCED_SOP_INSTANCE_UID,
                VR::UI,
                reference.sop_instance_uid.as_str(),
            );
            item
        })
        .collect();
    DataElement::new(
        tags::REFERENCED_SOP_SEQUENCE,
        VR::SQ,
        Value::Sequence {
            items,
            length: Length::UNDEFINED,
        },
    )
}

/// Request storage commitment for the given instances.
///
/// Sends an N-ACTION (action type 1) to the peer and registers the
/// transaction with the tracker. The result arrives asynchronously
/// through an N-EVENT-REPORT, on a listener fed into the same tracker
/// (see [`serve_event_reports`]).
pub async fn request(
    peer: &Peer,
    tracker: &CommitmentTracker,
    references: Vec<SopReference>,
) -> Result<CommitmentAwaiter> {
    let transaction_uid = crate::generate_uid();

    let mut association = peer
        .association_options()
        .with_presentation_context(
            uids::STORAGE_COMMITMENT_PUSH_MODEL,
            vec![
                uids::EXPLICIT_VR_LITTLE_ENDIAN,
                uids::IMPLICIT_VR_LITTLE_ENDIAN,
            ],
        )
        .establish(&peer.address)
        .await?;

    let context = association.presentation_contexts()[0].clone();
    let ts = TransferSyntaxRegistry
        .get(&context.transfer_syntax)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: uids::STORAGE_COMMITMENT_PUSH_MODEL.to_string(),
        })?;

    // action information: transaction UID + referenced SOP sequence
    let mut action_info = DataSet::new();
    action_info.put_value(tags::TRANSACTION_UID, VR::UI, transaction_uid.as_str());
    action_info.put(sop_reference_sequence(&references));
    let mut action_bytes = Vec::new();
    write_data_set(&mut action_bytes, &action_info, ts).context(ProtocolEncodeSnafu)?;

    let awaiter = tracker.register(CommitmentTransaction {
        transaction_uid: transaction_uid.clone(),
        referenced: references,
        sent_at: Utc::now(),
    });

    let mut ids = MessageIdAllocator::new();
    let message_id = ids.allocate();
    send_message(
        &mut association,
        context.id,
        &action_rq(
            message_id,
            uids::STORAGE_COMMITMENT_PUSH_MODEL,
            uids::STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE,
            1,
        ),
        Some(&action_bytes),
    )
    .await?;

    let response = match receive_message(&mut association).await? {
        Incoming::Message(message) => message,
        Incoming::Release => return Err(Error::PeerClosed),
    };
    if response.command.field != CommandField::NActionRsp {
        return Err(Error::CommandDataMismatch {
            operation: "commitment",
        });
    }
    ids.complete(message_id)?;
    let status = response.command.expect_status()?;
    if !status.is_success() {
        return Err(Error::ServiceStatus {
            status,
            sop_instance_uid: None,
            message_id: Some(message_id),
        });
    }
    association.release().await?;
    Ok(awaiter)
}

/// Serve N-EVENT-REPORT messages on the given listener,
/// completing the matching transactions in the tracker.
///
/// This is the reverse-role association through which the peer
/// delivers commitment results. Runs until the listener fails.
pub async fn serve_event_reports(
    listener: tokio::net::TcpListener,
    ae_title: String,
    tracker: CommitmentTracker,
    timeouts: TimeoutProfile,
) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener
            .accept()
            .await
            .map_err(|source| Error::ConnectFailed {
                address: "<listener>".to_string(),
                source,
            })?;
        let tracker = tracker.clone();
        let ae_title = ae_title.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_event_report_association(stream, ae_title, tracker, timeouts).await
            {
                debug!("event report association from {} failed: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_event_report_association(
    stream: tokio::net::TcpStream,
    ae_title: String,
    tracker: CommitmentTracker,
    timeouts: TimeoutProfile,
) -> Result<()> {
    let mut association = ServerAssociationOptions::new()
        .ae_title(ae_title)
        .accept_abstract_syntaxes(vec![uids::STORAGE_COMMITMENT_PUSH_MODEL.to_string()])
        .timeouts(timeouts)
        .establish(stream)
        .await?;

    loop {
        let message = match receive_message(&mut association).await {
            Ok(Incoming::Message(message)) => message,
            Ok(Incoming::Release) => {
                let _ = association.confirm_release().await;
                return Ok(());
            }
            Err(Error::AssociationAborted { .. }) | Err(Error::PeerClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        if message.command.field != CommandField::NEventReportRq {
            warn!("unexpected command {:?} on commitment listener", message.command.field);
            continue;
        }

        let context = crate::dimse::context_by_id(
            association.presentation_contexts(),
            message.presentation_context_id,
        )?
        .clone();
        let ts = TransferSyntaxRegistry
            .get(&context.transfer_syntax)
            .ok_or(Error::UnknownPresentationContext {
                id: message.presentation_context_id,
            })?;
        let bytes = message.data.ok_or(Error::CommandDataMismatch {
            operation: "commitment",
        })?;
        let report =
            read_data_set(&bytes[..], ts, ParseMode::Lenient).context(ProtocolParseSnafu)?;

        let status = match tracker.complete_from_report(&report) {
            Ok(transaction_uid) => {
                debug!("commitment transaction {} completed", transaction_uid);
                Status::SUCCESS
            }
            Err(e) => {
                warn!("could not complete commitment transaction: {}", e);
                // no such object instance
                Status(0x0112)
            }
        };

        let message_id = message.command.message_id.unwrap_or(0);
        send_message(
            &mut association,
            message.presentation_context_id,
            &event_report_rsp(
                message_id,
                uids::STORAGE_COMMITMENT_PUSH_MODEL,
                uids::STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE,
                status,
            ),
            None,
        )
        .await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(transaction_uid: &str, committed: &[&str], failed: &[&str]) -> DataSet {
        let mut ds = DataSet::new();
        ds.put_value(tags::TRANSACTION_UID, VR::UI, transaction_uid);
        let to_refs = |uids: &[&str]| {
            uids.iter()
                .map(|uid| SopReference {
                    sop_class_uid: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                    sop_instance_uid: uid.to_string(),
                })
                .collect::<Vec<_>>()
        };
        if !committed.is_empty() {
            ds.put(sop_reference_sequence(&to_refs(committed)));
        }
        if !failed.is_empty() {
            let mut element = sop_reference_sequence(&to_refs(failed));
            element = DataElement::new(
                tags::FAILED_SOP_SEQUENCE,
                VR::SQ,
                element.value().clone(),
            );
            ds.put(element);
        }
        ds
    }

    #[tokio::test]
    async fn successful_commitment_completes_awaiter() {
        let tracker = CommitmentTracker::new();
        let awaiter = tracker.register(CommitmentTransaction {
            transaction_uid: "2.25.100".to_string(),
            referenced: vec![],
            sent_at: Utc::now(),
        });

        let uid = tracker
            .complete_from_report(&report("2.25.100", &["1.2.3"], &[]))
            .unwrap();
        assert_eq!(uid, "2.25.100");

        match awaiter.outcome().await.unwrap() {
            CommitmentOutcome::Success { committed } => {
                assert_eq!(committed.len(), 1);
                assert_eq!(committed[0].sop_instance_uid, "1.2.3");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn partial_commitment_reports_both_lists() {
        let tracker = CommitmentTracker::new();
        let awaiter = tracker.register(CommitmentTransaction {
            transaction_uid: "2.25.200".to_string(),
            referenced: vec![],
            sent_at: Utc::now(),
        });
        tracker
            .complete_from_report(&report("2.25.200", &["1.2.3"], &["1.2.4"]))
            .unwrap();
        match awaiter.outcome().await.unwrap() {
            CommitmentOutcome::Partial { committed, failed } => {
                assert_eq!(committed[0].sop_instance_uid, "1.2.3");
                assert_eq!(failed[0].sop_instance_uid, "1.2.4");
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn unknown_transaction_is_an_error() {
        let tracker = CommitmentTracker::new();
        let err = tracker
            .complete_from_report(&report("2.25.999", &["1.2.3"], &[]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTransaction { .. }));
    }
}
