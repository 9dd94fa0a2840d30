//! Query service (C-FIND) as a service class user,
//! with per-match streaming.
use tokio::sync::mpsc;
use tracing::debug;

use medicom_core::dictionary::uids;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::write::write_data_set;
use medicom_object::DataSet;

use crate::command::{find_rq, CommandField, Priority, StatusClass};
use crate::dimse::{receive_message, send_message, Incoming, MessageIdAllocator};
use crate::error::{Error, ProtocolEncodeSnafu, ProtocolParseSnafu, Result};
use crate::peer::Peer;
use snafu::ResultExt;

/// The query/retrieve information model to use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueryModel {
    /// patient root information model
    PatientRoot,
    /// study root information model
    StudyRoot,
}

impl QueryModel {
    /// The C-FIND SOP class of this model.
    pub fn find_sop_class(self) -> &'static str {
        match self {
            QueryModel::PatientRoot => uids::PATIENT_ROOT_QUERY_RETRIEVE_FIND,
            QueryModel::StudyRoot => uids::STUDY_ROOT_QUERY_RETRIEVE_FIND,
        }
    }

    /// The C-MOVE SOP class of this model.
    pub fn move_sop_class(self) -> &'static str {
        match self {
            QueryModel::PatientRoot => uids::PATIENT_ROOT_QUERY_RETRIEVE_MOVE,
            QueryModel::StudyRoot => uids::STUDY_ROOT_QUERY_RETRIEVE_MOVE,
        }
    }

    /// The C-GET SOP class of this model.
    pub fn get_sop_class(self) -> &'static str {
        match self {
            QueryModel::PatientRoot => uids::PATIENT_ROOT_QUERY_RETRIEVE_GET,
            QueryModel::StudyRoot => uids::STUDY_ROOT_QUERY_RETRIEVE_GET,
        }
    }
}

/// A stream of query matches.
///
/// Matches surface one by one, in the order the peer emits them;
/// the stream ends when the final response arrives.
/// Dropping the stream cancels the query
/// by aborting the underlying association.
pub struct FindStream {
    receiver: mpsc::Receiver<Result<DataSet>>,
}

impl FindStream {
    /// Await the next match.
    /// Returns `None` after the final response.
    pub async fn next(&mut self) -> Option<Result<DataSet>> {
        self.receiver.recv().await
    }

    /// Collect all remaining matches, failing on the first error.
    pub async fn collect(mut self) -> Result<Vec<DataSet>> {
        let mut matches = Vec::new();
        while let Some(result) = self.next().await {
            matches.push(result?);
        }
        Ok(matches)
    }
}

/// Issue a C-FIND query with the given matching keys
/// and stream each match as it arrives.
pub async fn find(peer: &Peer, model: QueryModel, keys: DataSet) -> Result<FindStream> {
    let sop_class = model.find_sop_class();
    let mut association = peer
        .association_options()
        .with_presentation_context(
            sop_class,
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
            sop_class_uid: sop_class.to_string(),
        })?;

    let mut keys_bytes = Vec::new();
    write_data_set(&mut keys_bytes, &keys, ts).context(ProtocolEncodeSnafu)?;

    let mut ids = MessageIdAllocator::new();
    let message_id = ids.allocate();
    send_message(
        &mut association,
        context.id,
        &find_rq(message_id, sop_class, Priority::Medium),
        Some(&keys_bytes),
    )
    .await?;

    let (sender, receiver) = mpsc::channel(8);
    let operation_timeout = peer.timeouts.operation;

    tokio::spawn(async move {
        let drive = async {
            loop {
                let message = match receive_message(&mut association).await? {
                    Incoming::Message(message) => message,
                    Incoming::Release => return Err(Error::PeerClosed),
                };
                if message.command.field != CommandField::CFindRsp {
                    return Err(Error::CommandDataMismatch { operation: "find" });
                }
                let status = message.command.expect_status()?;
                match status.class() {
                    StatusClass::Pending => {
                        let bytes = message.data.ok_or(Error::CommandDataMismatch {
                            operation: "find",
                        })?;
                        let matched = read_data_set(&bytes[..], ts, ParseMode::Lenient)
                            .context(ProtocolParseSnafu)?;
                        if sender.send(Ok(matched)).await.is_err() {
                            // consumer cancelled: abort the association
                            debug!("query consumer dropped; aborting");
                            let _ = association.abort().await;
                            return Err(Error::Cancelled);
                        }
                    }
                    StatusClass::Success => {
                        ids.complete(message_id)?;
                        association.release().await?;
                        return Ok(());
                    }
                    StatusClass::Cancel => {
                        let _ = association.abort().await;
                        return Err(Error::Cancelled);
                    }
                    _ => {
                        let _ = association.release().await;
                        return Err(Error::ServiceStatus {
                            status,
                            sop_instance_uid: None,
                            message_id: Some(message_id),
                        });
                    }
                }
            }
        };
        match tokio::time::timeout(operation_timeout, drive).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = sender.send(Err(e)).await;
            }
            Err(_) => {
                let _ = sender
                    .send(Err(Error::OperationTimeout { operation: "find" }))
                    .await;
            }
        }
    });

    Ok(FindStream { receiver })
}
