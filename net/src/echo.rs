//! Verification service (C-ECHO) as a service class user.
use medicom_core::dictionary::uids;

use crate::command::{echo_rq, CommandField};
use crate::dimse::{receive_message, send_message, Incoming, MessageIdAllocator};
use crate::error::{Error, Result};
use crate::peer::Peer;

/// Verify connectivity with the peer through a C-ECHO operation.
///
/// A fresh association is established for the verification SOP class,
/// the echo is performed, and the association is released.
/// The whole operation is bounded by the peer's operation timeout.
pub async fn echo(peer: &Peer) -> Result<()> {
    let operation = async {
        let mut association = peer
            .association_options()
            .with_presentation_context(
                uids::VERIFICATION,
                vec![
                    uids::EXPLICIT_VR_LITTLE_ENDIAN,
                    uids::IMPLICIT_VR_LITTLE_ENDIAN,
                ],
            )
            .establish(&peer.address)
            .await?;

        let context_id = association.presentation_contexts()[0].id;
        let mut ids = MessageIdAllocator::new();
        let message_id = ids.allocate();

        send_message(
            &mut association,
            context_id,
            &echo_rq(message_id, uids::VERIFICATION),
            None,
        )
        .await?;

        let response = match receive_message(&mut association).await? {
            Incoming::Message(message) => message,
            Incoming::Release => return Err(Error::PeerClosed),
        };
        if response.command.field != CommandField::CEchoRsp {
            return Err(Error::CommandDataMismatch { operation: "echo" });
        }
        if let Some(responded_to) = response.command.responded_to {
            ids.complete(responded_to)?;
        }
        let status = response.command.expect_status()?;
        if !status.is_success() {
            return Err(Error::ServiceStatus {
                status,
                sop_instance_uid: None,
                message_id: Some(message_id),
            });
        }
        association.release().await?;
        Ok(())
    };

    tokio::time::timeout(peer.timeouts.operation, operation)
        .await
        .map_err(|_| Error::OperationTimeout { operation: "echo" })?
}
