//! Association requester (SCU side).
use std::borrow::Cow;

use snafu::{ensure, ResultExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

use medicom_core::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};

use crate::association::{
    provider_abort, read_pdu_async, write_pdu_async, AsyncStream, Error, NegotiatedContext,
    Result, State, TimeoutProfile,
};
use crate::pdu::{
    AbortSource, AssociationRQ, Pdu, PresentationContextProposed,
    PresentationContextResultReason, UserIdentityRequest, UserVariableItem, DEFAULT_MAX_PDU,
    MAXIMUM_PDU_SIZE,
};

/// A builder for establishing an association with a remote
/// application entity, taking the role of the SCU.
///
/// # Example
///
/// ```no_run
/// # use medicom_ul::association::client::ClientAssociationOptions;
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut association = ClientAssociationOptions::new()
///     .calling_ae_title("THIS-SCU")
///     .called_ae_title("ANY-SCP")
///     .with_presentation_context(
///         "1.2.840.10008.1.1",
///         vec!["1.2.840.10008.1.2.1", "1.2.840.10008.1.2"],
///     )
///     .establish("127.0.0.1:11112")
///     .await?;
/// association.release().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientAssociationOptions {
    calling_ae_title: Cow<'static, str>,
    called_ae_title: Cow<'static, str>,
    application_context_name: Cow<'static, str>,
    presentation_contexts: Vec<(String, Vec<String>)>,
    protocol_version: u16,
    max_pdu_length: u32,
    strict: bool,
    timeouts: TimeoutProfile,
    user_identity: Option<UserIdentityRequest>,
    #[cfg(feature = "tls")]
    tls: Option<crate::tls::TlsClientOptions>,
}

impl Default for ClientAssociationOptions {
    fn default() -> Self {
        ClientAssociationOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            presentation_contexts: Vec::new(),
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: false,
            timeouts: TimeoutProfile::default(),
            user_identity: None,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

impl ClientAssociationOptions {
    /// Create a new set of options for establishing an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the calling application entity title,
    /// which refers to this DICOM node. The default is `THIS-SCU`.
    pub fn calling_ae_title<T>(mut self, value: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.calling_ae_title = value.into();
        self
    }

    /// Define the called application entity title,
    /// which refers to the target DICOM node. The default is `ANY-SCP`.
    pub fn called_ae_title<T>(mut self, value: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.called_ae_title = value.into();
        self
    }

    /// Propose a presentation context:
    /// an abstract syntax with transfer syntaxes in preference order.
    pub fn with_presentation_context(
        mut self,
        abstract_syntax: impl Into<String>,
        transfer_syntaxes: Vec<impl Into<String>>,
    ) -> Self {
        self.presentation_contexts.push((
            abstract_syntax.into(),
            transfer_syntaxes.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Override the maximum PDU length advertised to the peer.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Enforce the advertised maximum on incoming PDUs.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Override the timeout profile.
    pub fn timeouts(mut self, timeouts: TimeoutProfile) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Assert a user identity in association negotiation.
    pub fn user_identity(mut self, identity: UserIdentityRequest) -> Self {
        self.user_identity = Some(identity);
        self
    }

    /// Secure the connection with TLS.
    #[cfg(feature = "tls")]
    pub fn tls(mut self, options: crate::tls::TlsClientOptions) -> Self {
        self.tls = Some(options);
        self
    }

    /// Connect to the peer and negotiate the association.
    pub async fn establish<A: ToSocketAddrs>(self, address: A) -> Result<ClientAssociation> {
        ensure!(
            !self.presentation_contexts.is_empty(),
            crate::association::MissingAbstractSyntaxSnafu
        );

        let socket = tokio::time::timeout(self.timeouts.connect, TcpStream::connect(address))
            .await
            .map_err(|_| {
                crate::association::TimeoutSnafu {
                    operation: "connect",
                }
                .build()
            })?
            .context(crate::association::ConnectSnafu)?;

        #[cfg(feature = "tls")]
        let mut stream: Box<dyn AsyncStream> = match &self.tls {
            Some(tls) => Box::new(tls.handshake(socket, self.timeouts.connect).await?),
            None => Box::new(socket),
        };
        #[cfg(not(feature = "tls"))]
        let mut stream: Box<dyn AsyncStream> = Box::new(socket);

        let presentation_contexts: Vec<PresentationContextProposed> = self
            .presentation_contexts
            .iter()
            .enumerate()
            .map(|(i, (abstract_syntax, transfer_syntaxes))| PresentationContextProposed {
                // presentation context ids are odd by definition
                id: (i as u8) * 2 + 1,
                abstract_syntax: abstract_syntax.clone(),
                transfer_syntaxes: transfer_syntaxes.clone(),
            })
            .collect();

        let mut user_variables = vec![
            UserVariableItem::MaxLength(self.max_pdu_length),
            UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
            UserVariableItem::ImplementationVersionName(IMPLEMENTATION_VERSION_NAME.to_string()),
        ];
        if let Some(identity) = self.user_identity.clone() {
            user_variables.push(UserVariableItem::UserIdentity(identity));
        }

        let request = Pdu::AssociationRQ(AssociationRQ {
            protocol_version: self.protocol_version,
            calling_ae_title: self.calling_ae_title.to_string(),
            called_ae_title: self.called_ae_title.to_string(),
            application_context_name: self.application_context_name.to_string(),
            presentation_contexts: presentation_contexts.clone(),
            user_variables,
        });

        // Idle -> AwaitingAssociate
        write_pdu_async(&mut stream, &request, self.timeouts.write).await?;
        let response = read_pdu_async(
            &mut stream,
            MAXIMUM_PDU_SIZE,
            self.strict,
            self.timeouts.read,
        )
        .await?;

        match response {
            Pdu::AssociationAC(ac) => {
                let mut negotiated = Vec::new();
                for result in &ac.presentation_contexts {
                    if result.reason != PresentationContextResultReason::Acceptance {
                        debug!(
                            "presentation context {} not accepted: {:?}",
                            result.id, result.reason
                        );
                        continue;
                    }
                    match presentation_contexts.iter().find(|pc| pc.id == result.id) {
                        Some(proposed) => negotiated.push(NegotiatedContext {
                            id: result.id,
                            abstract_syntax: proposed.abstract_syntax.clone(),
                            transfer_syntax: result.transfer_syntax.clone(),
                        }),
                        None => warn!("peer accepted unknown presentation context {}", result.id),
                    }
                }
                ensure!(
                    !negotiated.is_empty(),
                    crate::association::NoAcceptedPresentationContextsSnafu
                );

                let mut peer_max_pdu = DEFAULT_MAX_PDU;
                let mut peer_implementation_uid = None;
                let mut user_identity_response = None;
                for item in &ac.user_variables {
                    match item {
                        UserVariableItem::MaxLength(max) if *max > 0 => {
                            peer_max_pdu = (*max).min(MAXIMUM_PDU_SIZE);
                        }
                        UserVariableItem::ImplementationClassUID(uid) => {
                            peer_implementation_uid = Some(uid.clone());
                        }
                        UserVariableItem::UserIdentityAck(response) => {
                            user_identity_response = Some(response.clone());
                        }
                        _ => {}
                    }
                }

                Ok(ClientAssociation {
                    stream,
                    negotiated,
                    state: State::Established,
                    send_max_pdu: peer_max_pdu,
                    receive_max_pdu: self.max_pdu_length,
                    strict: self.strict,
                    timeouts: self.timeouts,
                    peer_implementation_uid,
                    user_identity_response,
                })
            }
            Pdu::AssociationRJ(rejection) => Err(Error::Rejected { rejection }),
            Pdu::AbortRQ { source } => Err(Error::Aborted {
                source_info: source,
            }),
            pdu => {
                // protocol violation: abort and report
                let _ = write_pdu_async(&mut stream, &provider_abort(), self.timeouts.write).await;
                Err(Error::UnexpectedPdu {
                    pdu: Box::new(pdu),
                    state: State::AwaitingAssociate,
                })
            }
        }
    }
}

/// An established association from the requester's perspective.
///
/// Associations are single-use:
/// [`release`](ClientAssociation::release) and
/// [`abort`](ClientAssociation::abort) consume the association.
pub struct ClientAssociation {
    stream: Box<dyn AsyncStream>,
    negotiated: Vec<NegotiatedContext>,
    state: State,
    send_max_pdu: u32,
    receive_max_pdu: u32,
    strict: bool,
    timeouts: TimeoutProfile,
    peer_implementation_uid: Option<String>,
    user_identity_response: Option<Vec<u8>>,
}

impl ClientAssociation {
    /// The presentation contexts accepted by the peer.
    pub fn presentation_contexts(&self) -> &[NegotiatedContext] {
        &self.negotiated
    }

    /// The current state of the association.
    pub fn state(&self) -> State {
        self.state
    }

    /// The maximum PDU length admitted by the peer for sending.
    pub fn send_max_pdu(&self) -> u32 {
        self.send_max_pdu
    }

    /// The implementation class UID reported by the peer, if any.
    pub fn peer_implementation_uid(&self) -> Option<&str> {
        self.peer_implementation_uid.as_deref()
    }

    /// The server's user identity response, if one was granted.
    pub fn user_identity_response(&self) -> Option<&[u8]> {
        self.user_identity_response.as_deref()
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
    /// An incoming A-ABORT moves the association to the aborted
    /// state and surfaces as an error;
    /// any PDU inadmissible in the established state triggers a
    /// provider-initiated abort.
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
        .await?;
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

    /// Gracefully release the association,
    /// waiting for the peer's release response.
    pub async fn release(mut self) -> Result<()> {
        ensure!(
            self.state == State::Established,
            crate::association::InvalidStateSnafu { state: self.state }
        );
        write_pdu_async(&mut self.stream, &Pdu::ReleaseRQ, self.timeouts.write).await?;
        self.state = State::AwaitingRelease;
        loop {
            let pdu = read_pdu_async(
                &mut self.stream,
                self.receive_max_pdu,
                self.strict,
                self.timeouts.read,
            )
            .await?;
            match pdu {
                Pdu::ReleaseRP => {
                    self.state = State::Released;
                    return Ok(());
                }
                // data still in flight during release collision is dropped
                Pdu::PData { .. } => continue,
                Pdu::AbortRQ { source } => {
                    self.state = State::Aborted;
                    return Err(Error::Aborted {
                        source_info: source,
                    });
                }
                pdu => {
                    let _ = write_pdu_async(
                        &mut self.stream,
                        &provider_abort(),
                        self.timeouts.write,
                    )
                    .await;
                    self.state = State::Aborted;
                    return Err(Error::UnexpectedPdu {
                        pdu: Box::new(pdu),
                        state: State::AwaitingRelease,
                    });
                }
            }
        }
    }

    /// Abort the association immediately (service-user initiated).
    ///
    /// Aborting is idempotent with respect to the peer:
    /// the socket is closed on drop.
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
