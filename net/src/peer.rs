//! Description of a remote application entity
//! and the options used when associating with it.
use medicom_ul::association::client::ClientAssociationOptions;
use medicom_ul::association::TimeoutProfile;
use medicom_ul::pdu::DEFAULT_MAX_PDU;

/// A remote application entity to associate with,
/// along with the local identity and transport options.
#[derive(Debug, Clone)]
pub struct Peer {
    /// the socket address of the peer, as `host:port`
    pub address: String,
    /// the AE title presented by this node
    pub calling_ae_title: String,
    /// the AE title of the peer
    pub called_ae_title: String,
    /// the maximum PDU length advertised
    pub max_pdu_length: u32,
    /// the timers applied to association activity
    pub timeouts: TimeoutProfile,
    /// TLS options; plain TCP when absent
    #[cfg(feature = "tls")]
    pub tls: Option<medicom_ul::tls::TlsClientOptions>,
}

impl Peer {
    /// Describe a peer at the given address with the given AE title.
    pub fn new(address: impl Into<String>, called_ae_title: impl Into<String>) -> Self {
        Peer {
            address: address.into(),
            calling_ae_title: "MEDICOM".to_string(),
            called_ae_title: called_ae_title.into(),
            max_pdu_length: DEFAULT_MAX_PDU,
            timeouts: TimeoutProfile::default(),
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    /// Define the calling AE title presented by this node.
    pub fn calling_ae_title(mut self, value: impl Into<String>) -> Self {
        self.calling_ae_title = value.into();
        self
    }

    /// Override the timeout profile.
    pub fn timeouts(mut self, timeouts: TimeoutProfile) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override the maximum PDU length advertised.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Secure connections to this peer with TLS.
    #[cfg(feature = "tls")]
    pub fn tls(mut self, options: medicom_ul::tls::TlsClientOptions) -> Self {
        self.tls = Some(options);
        self
    }

    /// A key identifying this peer configuration,
    /// used by the connection pool and the circuit breaker.
    pub fn key(&self) -> String {
        #[cfg(feature = "tls")]
        let tls_marker = if self.tls.is_some() { "+tls" } else { "" };
        #[cfg(not(feature = "tls"))]
        let tls_marker = "";
        format!(
            "{}@{}>{}{}",
            self.calling_ae_title, self.address, self.called_ae_title, tls_marker
        )
    }

    /// Start building the association options for this peer.
    pub fn association_options(&self) -> ClientAssociationOptions {
        let options = ClientAssociationOptions::new()
            .calling_ae_title(self.calling_ae_title.clone())
            .called_ae_title(self.called_ae_title.clone())
            .max_pdu_length(self.max_pdu_length)
            .timeouts(self.timeouts);
        #[cfg(feature = "tls")]
        let options = match &self.tls {
            Some(tls) => options.tls(tls.clone()),
            None => options,
        };
        options
    }
}
