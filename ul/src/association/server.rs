//! Association acceptor (SCP side).
use std::borrow::Cow;

use snafu::ensure;
use tracing::debug;

use medicom_core::dictionary::uids;
use medicom_core::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};

use crate::association::{
    provider_abort, read_pdu_async, write_pdu_async, AsyncStream, Error, NegotiatedContext,
    Result, State, TimeoutProfile,
};
use crate::pdu::{
    AbortSource, AssociationAC, AssociationRJ, AssociationRJResult, AssociationRJSource,
    AssociationRJServiceUserReason, Pdu, PresentationContextResult,
    PresentationContextResultReason, UserVariableItem, DEFAULT_MAX_PDU, MAXIMUM_PDU_SIZE,
};

/// A builder for accepting associations from remote
/// application entities, taking the role of the SCP.
///
/// The acceptance policy covers the calling AE title
/// (allow and deny lists), the abstract syntaxes offered
/// and the transfer syntaxes admitted per context.
#[derive(Debug, Clone)]
pub struct ServerAssociationOptions {
    ae_title: Cow<'static, str>,
    allowed_calling_aes: Option<Vec<String>>,
    blocked_calling_aes: Vec<String>,
    accepted_abstract_syntaxes: Option<Vec<String>>,
    accepted_transfer_syntaxes: Vec<String>,
    max_pdu_length: u32,
    strict: bool,
    timeouts: TimeoutProfile,
    protocol_version: u16,
}

impl Default for ServerAssociationOptions {
    fn default() -> Self {
        ServerAssociationOptions {
            ae_title: "THIS-SCP".into(),
            allowed_calling_aes: None,
            blocked_calling_aes: Vec::new(),
            accepted_abstract_syntaxes: None,
            accepted_transfer_syntaxes: vec![
                uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
                uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            ],
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: false,
            timeouts: TimeoutProfile::default(),
            protocol_version: 1,
        }
    }
}

impl ServerAssociationOptions {
    /// Create a new set of options for accepting associations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define this node's AE title. The default is `THIS-SCP`.
    pub fn ae_title<T>(mut self, value: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.ae_title = value.into();
        self
    }

    /// Restrict accepted calling AE titles to the given list.
    pub fn allow_calling_aes(mut self, titles: Vec<impl Into<String>>) -> Self {
        self.allowed_calling_aes = Some(titles.into_iter().map(Into::into).collect());
        self
    }

    /// Reject the given calling AE titles.
    pub fn block_calling_aes(mut self, titles: Vec<impl Into<String>>) -> Self {
        self.blocked_calling_aes = titles.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict accepted abstract syntaxes to the given list.
    /// By default, any proposed abstract syntax is accepted.
    pub fn accept_abstract_syntaxes(mut self, uids: Vec<impl Into<String>>) -> Self {
        self.accepted_abstract_syntaxes = Some(uids.into_iter().map(Into::into).collect());
        self
    }

    /// Define the transfer syntaxes admitted in negotiation.
    pub fn accept_transfer_syntaxes(mut self, uids: Vec<impl Into<String>>) -> Self {
        self.accepted_transfer_syntaxes = uids.into_iter().map(Into::into).collect();
        self
    }

    /// Override the maximum PDU length advertised to the peer.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Override the timeout profile.
    /// The read timeout doubles as the ARTIM timer.
    pub fn timeouts(mut self, timeouts: TimeoutProfile) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Negotiate an association over an accepted connection.
    ///
    /// The ARTIM timer bounds the wait for the association request;
    /// expiry aborts the connection.
    pub async fn establish<S>(self, stream: S) -> Result<ServerAssociation>
    where
        S: AsyncStream + 'static,
    {
        let mut stream: Box<dyn AsyncStream> = Box::new(stream);

        // Idle -> AwaitingAssociate, bounded by ARTIM
        let pdu = read_pdu_async(
            &mut stream,
            MAXIMUM_PDU_SIZE,
            self.strict,
            self.timeouts.read,
        )
        .await?;

        let request = match pdu {
            Pdu::AssociationRQ(request) => request,
            pdu => {
                let _ = write_pdu_async(&mut stream, &provider_abort(), self.timeouts.write).await;
                return Err(Error::UnexpectedPdu {
                    pdu: Box::new(pdu),
                    state: State::AwaitingAssociate,
                });
            }
        };

        // acceptance policy: calling AE allow/deny lists
        let calling_ae = request.calling_ae_title.trim().to_string();
        let ae_rejected = self.blocked_calling_aes.iter().any(|ae| ae == &calling_ae)
            || self
                .allowed_calling_aes
                .as_ref()
                .is_some_and(|allowed| !allowed.iter().any(|ae| ae == &calling_ae));
        if ae_rejected {
            let rejection = Pdu::AssociationRJ(AssociationRJ {
                result: AssociationRJResult::Permanent,
                source: AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                ),
            });
            write_pdu_async(&mut stream, &rejection, self.timeouts.write).await?;
            return Err(Error::Rejected {
                rejection: AssociationRJ {
                    result: AssociationRJResult::Permanent,
                    source: AssociationRJSource::ServiceUser(
                        AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                    ),
                },
            });
        }

        // negotiate each presentation context:
        // at most one transfer syntax is accepted per context,
        // honoring the proposer's preference order
        let mut results = Vec::with_capacity(request.presentation_contexts.len());
        let mut negotiated = Vec::new();
        for pc in &request.presentation_contexts {
            let abstract_supported = self
                .accepted_abstract_syntaxes
                .as_ref()
                .map(|list| list.iter().any(|uid| uid == &pc.abstract_syntax))
                .unwrap_or(true);
            if !abstract_supported {
                debug!("abstract syntax {} not supported", pc.abstract_syntax);
                results.push(PresentationContextResult {
                    id: pc.id,
                    reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                    transfer_syntax: String::new(),
                });
                continue;
            }
            match pc
                .transfer_syntaxes
                .iter()
                .find(|ts| self.accepted_transfer_syntaxes.iter().any(|a| &a == ts))
            {
                Some(ts) => {
                    results.push(PresentationContextResult {
                        id: pc.id,
                        reason: PresentationContextResultReason::Acceptance,
                        transfer_syntax: ts.clone(),
                    });
                    negotiated.push(NegotiatedContext {
                        id: pc.id,
                        abstract_syntax: pc.abstract_syntax.clone(),
                        transfer_syntax: ts.clone(),
                    });
                }
                None => {
                    results.push(PresentationContextResult {
                        id: pc.id,
                        reason: PresentationContextResultReason::TransferSyntaxesNotSupported,
                        transfer_syntax: String::new(),
                    });
                }
            }
        }

        let mut peer_max_pdu = DEFAULT_MAX_PDU;
        for item in &request.user_variables {
            if let UserVariableItem::MaxLength(max) = item {
                if *max > 0 {
                    peer_max_pdu = (*max).min(MAXIMUM_PDU_SIZE);
                }
            }
        }

        let response = Pdu::AssociationAC(AssociationAC {
            protocol_version: self.protocol_version,
            called_ae_title: request.called_ae_title.clone(),
            calling_ae_title: request.calling_ae_title.clone(),
            application_context_name: request.application_context_name.clone(),
            presentation_contexts: results,
            user_variables: vec![
                UserVariableItem::MaxLength(self.max_pdu_length),
                UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
                UserVariableItem::ImplementationVersionName(
                    IMPLEMENTATION_VERSION_NAME.to_string(),
                ),
            ],
        });
        write_pdu_async(&mut stream, &response, self.timeouts.write).await?;

        Ok(ServerAssociation {
            stream,
            negotiated,
            calling_ae_title: calling_ae,
            called_ae_title: request.called_ae_title.trim().to_string(),
            state: State::Established,
            send_max_pdu: peer_max_pdu,
            receive_max_pdu: self.max_pdu_length,
            strict: self.strict,
            timeouts: self.timeouts,
        })
    }
}

/// An established association from the acceptor's perspective.
pub struct ServerAssociation {
    stream: Box<dyn AsyncStream>,
    negotiated: Vec<NegotiatedContext>,
    calling_ae_title: String,
    called_ae_title: String,
    state: State,
    send_max_pdu: u32,
    receive_max_pdu: u32,
    strict: bool,
    timeouts: TimeoutProfile,
}

impl ServerAssociation {
    /// The presentation contexts accepted in negotiation.
    pub fn presentation_contexts(&self) -> &[NegotiatedContext] {
        &self.negotiated
    }

    /// The calling AE title of the peer.
    pub fn calling_ae_title(&self) -> &str {
        &self.calling_ae_title
    }

    /// The called AE title addressed by the peer.
    pub fn called_ae_title(&self) -> &str {
        &self.called_ae_title
    }

    /// The current state of the association.
    pub fn state(&self) -> State {
        self.state
    }

    /// The maximum PDU length admitted by the peer for sending.
    pub fn send_max_pdu(&self) -> u32 {
        self.send_max_pdu
    }

    /// Send one PDU over the association.
    pub async fn send(&mut self, pdu: &Pdu) -> Result<()> {
        ensure!(
            self.state == State::Established,
            crate::association::InvalidStateSnafu { state: self.state }
        );
        write_pdu_async(&mut self.stream, pdu, self.timeouts.write).await
    }

    /// Receive one PDU from the association.
    ///
    /// The ARTIM (read) timer applies.
    /// An incoming A-ABORT or any inadmissible PDU moves the
    /// association to the aborted state.
    pub async fn receive(&mut self) -> Result<Pdu> {
        ensure!(
            self.state == State::Established,
            crate::association::InvalidStateSnafu { state: self.state }
        );
        let pdu = read_pdu_async(
            &mut self.stream,
            self.receive_max_pdu,
            self.strict,
            self.timeouts.read,
        )
        .await;
        let pdu = match pdu {
            Ok(pdu) => pdu,
            Err(e @ Error::Timeout { .. }) => {
                // ARTIM expiry: abort the association
                let _ =
                    write_pdu_async(&mut self.stream, &provider_abort(), self.timeouts.write)
                        .await;
                self.state = State::Aborted;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        match pdu {
            Pdu::AbortRQ { source } => {
                self.state = State::Aborted;
                Err(Error::Aborted {
                    source_info: source,
                })
            }
            pdu @ (Pdu::PData { .. } | Pdu::ReleaseRQ) => Ok(pdu),
            pdu => {
                let _ =
                    write_pdu_async(&mut self.stream, &provider_abort(), self.timeouts.write)
                        .await;
                self.state = State::Aborted;
                Err(Error::UnexpectedPdu {
                    pdu: Box::new(pdu),
                    state: State::Established,
                })
            }
        }
    }

    /// Confirm a release requested by the peer
    /// and close the association in an orderly manner.
    pub async fn confirm_release(mut self) -> Result<()> {
        write_pdu_async(&mut self.stream, &Pdu::ReleaseRP, self.timeouts.write).await?;
        self.state = State::Released;
        Ok(())
    }

    /// Abort the association immediately (service-user initiated).
    pub async fn abort(mut self) -> Result<()> {
        if self.state == State::Aborted {
            return Ok(());
        }
        let pdu = Pdu::AbortRQ {
            source: AbortSource::ServiceUser,
        };
        let result = write_pdu_async(&mut self.stream, &pdu, self.timeouts.write).await;
        self.state = State::Aborted;
        result
    }
}
