//! A storage service class provider:
//! accepts associations, answers C-ECHO,
//! receives C-STORE instances and surfaces them on an event stream.
use std::sync::Arc;

use snafu::ResultExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use medicom_core::dictionary::uids;
use medicom_encoding::transfer_syntax::TransferSyntaxRegistry;
use medicom_object::meta::FileMetaTableBuilder;
use medicom_object::read::{read_data_set, ParseMode};
use medicom_object::FileObject;
use medicom_ul::association::server::{ServerAssociation, ServerAssociationOptions};
use medicom_ul::association::TimeoutProfile;

use crate::command::{echo_rsp, store_rsp, CommandField, Status};
use crate::dimse::{context_by_id, receive_message, send_message, Incoming};
use crate::error::{Error, ProtocolParseSnafu, Result};

/// An instance received through a C-STORE sub-operation.
#[derive(Debug)]
pub struct ReceivedInstance {
    /// the calling AE title of the sender
    pub calling_ae_title: String,
    /// the SOP class of the instance
    pub sop_class_uid: String,
    /// the SOP instance UID
    pub sop_instance_uid: String,
    /// the transfer syntax the instance arrived in
    pub transfer_syntax: String,
    /// the complete instance as a file object
    pub object: FileObject,
}

/// The disposition of a received instance,
/// decided by the storage delegate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstanceDisposition {
    /// accept the instance and answer success
    Accept,
    /// refuse the instance with the given failure status
    Reject(Status),
}

/// Hooks for per-instance decisions of the storage SCP.
pub trait StorageDelegate: Send + Sync {
    /// Review an incoming instance before it is acknowledged.
    ///
    /// The default implementation accepts everything.
    fn review(&self, _instance: &ReceivedInstance) -> InstanceDisposition {
        InstanceDisposition::Accept
    }
}

/// A delegate which accepts every instance.
#[derive(Debug, Default, Copy, Clone)]
pub struct AcceptAllDelegate;

impl StorageDelegate for AcceptAllDelegate {}

/// Events emitted by the storage SCP.
#[derive(Debug)]
pub enum ScpEvent {
    /// an association was accepted
    AssociationOpened {
        /// the calling AE title of the peer
        calling_ae_title: String,
    },
    /// a verification request was answered
    EchoReceived {
        /// the calling AE title of the peer
        calling_ae_title: String,
    },
    /// an instance was received and accepted
    InstanceReceived(Box<ReceivedInstance>),
    /// an association ended (released or aborted)
    AssociationClosed {
        /// the calling AE title of the peer
        calling_ae_title: String,
        /// whether the closure was an orderly release
        orderly: bool,
    },
}

/// Configuration of the storage SCP.
#[derive(Debug, Clone)]
pub struct StorageScpOptions {
    /// the AE title of this provider
    pub ae_title: String,
    /// calling AE titles admitted; all when absent
    pub allowed_calling_aes: Option<Vec<String>>,
    /// calling AE titles refused
    pub blocked_calling_aes: Vec<String>,
    /// the storage SOP classes accepted
    pub sop_classes: Vec<String>,
    /// the transfer syntaxes accepted
    pub transfer_syntaxes: Vec<String>,
    /// the maximum number of simultaneous associations
    pub max_concurrent_associations: usize,
    /// the timers applied to association activity
    pub timeouts: TimeoutProfile,
}

impl Default for StorageScpOptions {
    fn default() -> Self {
        StorageScpOptions {
            ae_title: "MEDICOM-SCP".to_string(),
            allowed_calling_aes: None,
            blocked_calling_aes: Vec::new(),
            sop_classes: uids::DEFAULT_STORAGE_SOP_CLASSES
                .iter()
                .map(|uid| uid.to_string())
                .collect(),
            transfer_syntaxes: vec![
                uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
                uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            ],
            max_concurrent_associations: 16,
            timeouts: TimeoutProfile::default(),
        }
    }
}

/// The storage service class provider.
pub struct StorageScp {
    options: StorageScpOptions,
    delegate: Arc<dyn StorageDelegate>,
    events: mpsc::Sender<ScpEvent>,
    audit: Option<Arc<crate::audit::AuditStream>>,
}

impl StorageScp {
    /// Create a storage SCP with the given options and delegate.
    ///
    /// Returns the provider and the receiving end
    /// of its event stream.
    pub fn new(
        options: StorageScpOptions,
        delegate: Arc<dyn StorageDelegate>,
    ) -> (Self, mpsc::Receiver<ScpEvent>) {
        let (events, receiver) = mpsc::channel(32);
        (
            StorageScp {
                options,
                delegate,
                events,
                audit: None,
            },
            receiver,
        )
    }

    /// Attach an audit stream;
    /// association and store events are recorded on it.
    pub fn with_audit(mut self, audit: Arc<crate::audit::AuditStream>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Serve associations from the given listener until it fails.
    ///
    /// Each association is handled in its own task;
    /// admission is bounded by `max_concurrent_associations`.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let limiter = Arc::new(Semaphore::new(self.options.max_concurrent_associations));
        info!("storage SCP `{}` listening", self.options.ae_title);
        loop {
            let (stream, peer_addr) = listener
                .accept()
                .await
                .map_err(|source| Error::ConnectFailed {
                    address: "<listener>".to_string(),
                    source,
                })?;
            let permit = match limiter.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("rejecting association from {}: at capacity", peer_addr);
                    drop(stream);
                    continue;
                }
            };
            let options = self.options.clone();
            let delegate = self.delegate.clone();
            let events = self.events.clone();
            let audit = self.audit.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) =
                    handle_association(options, delegate, events, audit, peer_addr, stream).await
                {
                    debug!("association from {} ended with error: {}", peer_addr, e);
                }
            });
        }
    }
}

async fn handle_association(
    options: StorageScpOptions,
    delegate: Arc<dyn StorageDelegate>,
    events: mpsc::Sender<ScpEvent>,
    audit: Option<Arc<crate::audit::AuditStream>>,
    peer_addr: std::net::SocketAddr,
    stream: tokio::net::TcpStream,
) -> Result<()> {
    let mut server_options = ServerAssociationOptions::new()
        .ae_title(options.ae_title.clone())
        .accept_abstract_syntaxes(
            options
                .sop_classes
                .iter()
                .cloned()
                .chain([uids::VERIFICATION.to_string()])
                .collect::<Vec<_>>(),
        )
        .accept_transfer_syntaxes(options.transfer_syntaxes.clone())
        .timeouts(options.timeouts);
    if let Some(allowed) = &options.allowed_calling_aes {
        server_options = server_options.allow_calling_aes(allowed.clone());
    }
    if !options.blocked_calling_aes.is_empty() {
        server_options = server_options.block_calling_aes(options.blocked_calling_aes.clone());
    }

    let mut association = server_options.establish(stream).await?;
    let calling_ae_title = association.calling_ae_title().to_string();
    if let Some(audit) = &audit {
        audit.emit(crate::audit::AuditEvent::AssociationOpened {
            calling_ae_title: calling_ae_title.clone(),
            called_ae_title: association.called_ae_title().to_string(),
            peer: peer_addr.to_string(),
        });
    }
    let _ = events
        .send(ScpEvent::AssociationOpened {
            calling_ae_title: calling_ae_title.clone(),
        })
        .await;

    let outcome = serve_messages(
        &mut association,
        &options,
        delegate.as_ref(),
        &events,
        audit.as_deref(),
        peer_addr,
        &calling_ae_title,
    )
    .await;

    let orderly = matches!(outcome, Ok(true));
    if orderly {
        // confirm the peer's release
        let _ = association.confirm_release().await;
    }
    if let Some(audit) = &audit {
        audit.emit(crate::audit::AuditEvent::AssociationClosed {
            peer: peer_addr.to_string(),
            orderly,
        });
    }
    let _ = events
        .send(ScpEvent::AssociationClosed {
            calling_ae_title,
            orderly,
        })
        .await;
    outcome.map(|_| ())
}

/// Serve DIMSE messages until release (returns `true`)
/// or an error occurs.
#[allow(clippy::too_many_arguments)]
async fn serve_messages(
    association: &mut ServerAssociation,
    _options: &StorageScpOptions,
    delegate: &dyn StorageDelegate,
    events: &mpsc::Sender<ScpEvent>,
    audit: Option<&crate::audit::AuditStream>,
    peer_addr: std::net::SocketAddr,
    calling_ae_title: &str,
) -> Result<bool> {
    loop {
        let message = match receive_message(association).await {
            Ok(Incoming::Message(message)) => message,
            Ok(Incoming::Release) => return Ok(true),
            Err(Error::AssociationAborted { .. }) | Err(Error::PeerClosed) => return Ok(false),
            Err(e) => return Err(e),
        };

        match message.command.field {
            CommandField::CEchoRq => {
                let message_id = message.command.message_id.unwrap_or(0);
                let sop_class = message
                    .command
                    .sop_class_uid
                    .clone()
                    .unwrap_or_else(|| uids::VERIFICATION.to_string());
                send_message(
                    association,
                    message.presentation_context_id,
                    &echo_rsp(message_id, &sop_class, Status::SUCCESS),
                    None,
                )
                .await?;
                let _ = events
                    .send(ScpEvent::EchoReceived {
                        calling_ae_title: calling_ae_title.to_string(),
                    })
                    .await;
            }
            CommandField::CStoreRq => {
                let context = context_by_id(
                    association.presentation_contexts(),
                    message.presentation_context_id,
                )?
                .clone();
                let message_id = message.command.message_id.unwrap_or(0);
                let sop_class_uid = message.command.sop_class_uid.clone().unwrap_or_default();
                let sop_instance_uid =
                    message.command.sop_instance_uid.clone().unwrap_or_default();

                let instance = build_instance(
                    calling_ae_title,
                    &context.transfer_syntax,
                    &sop_class_uid,
                    &sop_instance_uid,
                    message.data,
                );

                let status = match &instance {
                    Ok(instance) => match delegate.review(instance) {
                        InstanceDisposition::Accept => Status::SUCCESS,
                        InstanceDisposition::Reject(status) => status,
                    },
                    Err(e) => {
                        warn!("could not read stored instance: {}", e);
                        // cannot understand
                        Status(0xC000)
                    }
                };

                send_message(
                    association,
                    message.presentation_context_id,
                    &store_rsp(message_id, &sop_class_uid, &sop_instance_uid, status),
                    None,
                )
                .await?;

                if let Some(audit) = audit {
                    audit.emit(crate::audit::AuditEvent::StoreCompleted {
                        sop_instance_uid: sop_instance_uid.clone(),
                        peer: peer_addr.to_string(),
                        success: status.is_success(),
                        status: status.0,
                    });
                }
                if let (Ok(instance), true) = (instance, status.is_success()) {
                    let _ = events
                        .send(ScpEvent::InstanceReceived(Box::new(instance)))
                        .await;
                }
            }
            other => {
                debug!("unsupported command {:?}; answering failure", other);
                // unrecognized operation
                let message_id = message.command.message_id.unwrap_or(0);
                let sop_class_uid = message.command.sop_class_uid.clone().unwrap_or_default();
                send_message(
                    association,
                    message.presentation_context_id,
                    &store_rsp(message_id, &sop_class_uid, "", Status(0x0211)),
                    None,
                )
                .await?;
            }
        }
    }
}

fn build_instance(
    calling_ae_title: &str,
    transfer_syntax: &str,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    data: Option<Vec<u8>>,
) -> Result<ReceivedInstance> {
    let ts = TransferSyntaxRegistry
        .get(transfer_syntax)
        .ok_or_else(|| Error::NoSuitablePresentationContext {
            sop_class_uid: sop_class_uid.to_string(),
        })?;
    let bytes = data.ok_or(Error::CommandDataMismatch { operation: "store" })?;
    let data_set = read_data_set(&bytes[..], ts, ParseMode::Lenient).context(ProtocolParseSnafu)?;
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(sop_class_uid)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .transfer_syntax(transfer_syntax)
        .source_application_entity_title(calling_ae_title)
        .build()
        .map_err(|_| Error::CommandDataMismatch { operation: "store" })?;
    Ok(ReceivedInstance {
        calling_ae_title: calling_ae_title.to_string(),
        sop_class_uid: sop_class_uid.to_string(),
        sop_instance_uid: sop_instance_uid.to_string(),
        transfer_syntax: transfer_syntax.to_string(),
        object: FileObject::new(meta, data_set),
    })
}
