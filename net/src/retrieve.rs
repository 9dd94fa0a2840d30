//! Retrieval services (C-MOVE and C-GET) as a service class user.
use snafu::ResultExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use medicom_core::dictionary::uids;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::meta::FileMetaTableBuilder;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::write::write_data_set;
use medicom_object::{DataSet, FileObject};

use crate::command::{
    get_rq, move_rq, store_rsp, CommandField, Priority, Status, StatusClass, SubOperationCounts,
};
use crate::dimse::{
    context_by_id, receive_message, send_message, Incoming, MessageIdAllocator,
};
use crate::error::{Error, ProtocolEncodeSnafu, ProtocolParseSnafu, Result};
use crate::find::QueryModel;
use crate::peer::Peer;

/// A progress report of an ongoing retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrieveEvent {
    /// interim sub-operation progress
    Progress(SubOperationCounts),
    /// an instance arrived over the same association (C-GET only)
    Instance(Box<FileObject>),
    /// the retrieval concluded
    Completed {
        /// the final status
        status_class: StatusClass,
        /// the final sub-operation counters, when reported
        counts: Option<SubOperationCounts>,
    },
}

/// A stream of retrieval progress events.
pub struct RetrieveStream {
    receiver: mpsc::Receiver<Result<RetrieveEvent>>,
}

impl RetrieveStream {
    /// Await the next event.
    /// Returns `None` after the completion event.
    pub async fn next(&mut self) -> Option<Result<RetrieveEvent>> {
        self.receiver.recv().await
    }
}

/// Issue a C-MOVE request, directing the peer to send the matching
/// instances to `destination_ae` over a separate association.
///
/// Interim responses surface as progress events.
pub async fn move_to(
    peer: &Peer,
    model: QueryModel,
    destination_ae: &str,
    keys: DataSet,
) -> Result<RetrieveStream> {
    let sop_class = model.move_sop_class();
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
        &move_rq(message_id, sop_class, Priority::Medium, destination_ae),
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
                if message.command.field != CommandField::CMoveRsp {
                    return Err(Error::CommandDataMismatch { operation: "move" });
                }
                let status = message.command.expect_status()?;
                match status.class() {
                    StatusClass::Pending => {
                        let counts = message.command.sub_operations.unwrap_or_default();
                        if sender
                            .send(Ok(RetrieveEvent::Progress(counts)))
                            .await
                            .is_err()
                        {
                            let _ = association.abort().await;
                            return Err(Error::Cancelled);
                        }
                    }
                    class @ (StatusClass::Success | StatusClass::Warning) => {
                        ids.complete(message_id)?;
                        let _ = sender
                            .send(Ok(RetrieveEvent::Completed {
                                status_class: class,
                                counts: message.command.sub_operations,
                            }))
                            .await;
                        association.release().await?;
                        return Ok(());
                    }
                    StatusClass::Cancel => {
                        let _ = association.abort().await;
                        return Err(Error::Cancelled);
                    }
                    StatusClass::Failure => {
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
                    .send(Err(Error::OperationTimeout { operation: "move" }))
                    .await;
            }
        }
    });

    Ok(RetrieveStream { receiver })
}

/// Issue a C-GET request, accepting the matching instances
/// as C-STORE sub-operations over the same association.
///
/// Presentation contexts for the given storage SOP classes are
/// negotiated alongside the retrieval context;
/// each received instance surfaces as an event as it arrives.
pub async fn get(
    peer: &Peer,
    model: QueryModel,
    keys: DataSet,
    storage_sop_classes: &[&str],
) -> Result<RetrieveStream> {
    let sop_class = model.get_sop_class();
    let mut options = peer.association_options().with_presentation_context(
        sop_class,
        vec![
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
        ],
    );
    for storage_class in storage_sop_classes {
        options = options.with_presentation_context(
            *storage_class,
            vec![
                uids::EXPLICIT_VR_LITTLE_ENDIAN,
                uids::IMPLICIT_VR_LITTLE_ENDIAN,
            ],
        );
    }
    let mut association = options.establish(&peer.address).await?;

    let retrieve_context = association
        .presentation_contexts()
        .iter()
        .find(|c| c.abstract_syntax == sop_class)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class.to_string(),
        })?
        .clone();
    let ts = TransferSyntaxRegistry
        .get(&retrieve_context.transfer_syntax)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class.to_string(),
        })?;
    let mut keys_bytes = Vec::new();
    write_data_set(&mut keys_bytes, &keys, ts).context(ProtocolEncodeSnafu)?;

    let mut ids = MessageIdAllocator::new();
    let message_id = ids.allocate();
    send_message(
        &mut association,
        retrieve_context.id,
        &get_rq(message_id, sop_class, Priority::Medium),
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
                match message.command.field {
                    CommandField::CGetRsp => {
                        let status = message.command.expect_status()?;
                        match status.class() {
                            StatusClass::Pending => {
                                let counts =
                                    message.command.sub_operations.unwrap_or_default();
                                if sender
                                    .send(Ok(RetrieveEvent::Progress(counts)))
                                    .await
                                    .is_err()
                                {
                                    let _ = association.abort().await;
                                    return Err(Error::Cancelled);
                                }
                            }
                            class @ (StatusClass::Success | StatusClass::Warning) => {
                                ids.complete(message_id)?;
                                let _ = sender
                                    .send(Ok(RetrieveEvent::Completed {
                                        status_class: class,
                                        counts: message.command.sub_operations,
                                    }))
                                    .await;
                                association.release().await?;
                                return Ok(());
                            }
                            StatusClass::Cancel => {
                                let _ = association.abort().await;
                                return Err(Error::Cancelled);
                            }
                            StatusClass::Failure => {
                                let _ = association.release().await;
                                return Err(Error::ServiceStatus {
                                    status,
                                    sop_instance_uid: None,
                                    message_id: Some(message_id),
                                });
                            }
                        }
                    }
                    CommandField::CStoreRq => {
                        // an inbound sub-operation on the same association
                        let store_context = context_by_id(
                            association.presentation_contexts(),
                            message.presentation_context_id,
                        )?
                        .clone();
                        let instance_ts = TransferSyntaxRegistry
                            .get(&store_context.transfer_syntax)
                            .ok_or(Error::UnknownPresentationContext {
                                id: message.presentation_context_id,
                            })?;
                        let sub_message_id = message.command.message_id.unwrap_or(0);
                        let sop_class_uid =
                            message.command.sop_class_uid.clone().unwrap_or_default();
                        let sop_instance_uid =
                            message.command.sop_instance_uid.clone().unwrap_or_default();

                        let outcome = message
                            .data
                            .ok_or(Error::CommandDataMismatch { operation: "get" })
                            .and_then(|bytes| {
                                read_data_set(&bytes[..], instance_ts, ParseMode::Lenient)
                                    .context(ProtocolParseSnafu)
                            })
                            .and_then(|data| {
                                let meta = FileMetaTableBuilder::new()
                                    .media_storage_sop_class_uid(sop_class_uid.clone())
                                    .media_storage_sop_instance_uid(sop_instance_uid.clone())
                                    .transfer_syntax(store_context.transfer_syntax.clone())
                                    .build()
                                    .map_err(|_| Error::CommandDataMismatch {
                                        operation: "get",
                                    })?;
                                Ok(FileObject::new(meta, data))
                            });

                        let status = match &outcome {
                            Ok(_) => Status::SUCCESS,
                            Err(e) => {
                                warn!("could not store retrieved instance: {}", e);
                                // out of resources
                                Status(0xA700)
                            }
                        };
                        send_message(
                            &mut association,
                            message.presentation_context_id,
                            &store_rsp(
                                sub_message_id,
                                &sop_class_uid,
                                &sop_instance_uid,
                                status,
                            ),
                            None,
                        )
                        .await?;

                        if let Ok(instance) = outcome {
                            if sender
                                .send(Ok(RetrieveEvent::Instance(Box::new(instance))))
                                .await
                                .is_err()
                            {
                                debug!("retrieve consumer dropped; aborting");
                                let _ = association.abort().await;
                                return Err(Error::Cancelled);
                            }
                        }
                    }
                    _ => {
                        return Err(Error::CommandDataMismatch { operation: "get" });
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
                    .send(Err(Error::OperationTimeout { operation: "get" }))
                    .await;
            }
        }
    });

    Ok(RetrieveStream { receiver })
}
