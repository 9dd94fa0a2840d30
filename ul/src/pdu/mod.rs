//! Protocol Data Unit types of the DICOM Upper Layer (PS3.8 section 9.3).
pub mod reader;
pub mod writer;

/// The default maximum PDU size advertised by this implementation.
pub const DEFAULT_MAX_PDU: u32 = 16_384;

/// The minimum admissible maximum PDU size.
pub const MINIMUM_PDU_SIZE: u32 = 4_096;

/// The absolute maximum PDU size admitted by this implementation.
pub const MAXIMUM_PDU_SIZE: u32 = 131_072;

/// The length of the PDU header:
/// type (1), reserved (1) and length (4) bytes.
pub const PDU_HEADER_SIZE: u32 = 6;

/// A presentation context as proposed in an A-ASSOCIATE-RQ:
/// an abstract syntax with the transfer syntaxes offered for it,
/// in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationContextProposed {
    /// the presentation context id (odd)
    pub id: u8,
    /// the abstract syntax UID (SOP class)
    pub abstract_syntax: String,
    /// the proposed transfer syntax UIDs, in preference order
    pub transfer_syntaxes: Vec<String>,
}

/// The outcome of presentation context negotiation in an A-ASSOCIATE-AC.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationContextResult {
    /// the presentation context id (matching the proposal)
    pub id: u8,
    /// the negotiation outcome
    pub reason: PresentationContextResultReason,
    /// the accepted transfer syntax UID
    /// (meaningful only on acceptance)
    pub transfer_syntax: String,
}

/// The reason field of a presentation context result.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PresentationContextResultReason {
    /// acceptance
    Acceptance = 0,
    /// user rejection
    UserRejection = 1,
    /// no reason given
    NoReason = 2,
    /// the abstract syntax is not supported
    AbstractSyntaxNotSupported = 3,
    /// none of the proposed transfer syntaxes is supported
    TransferSyntaxesNotSupported = 4,
}

/// The result field of an association rejection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssociationRJResult {
    /// rejected permanently
    Permanent,
    /// rejected transiently; the request may be retried later
    Transient,
}

/// The source and reason of an association rejection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssociationRJSource {
    /// rejected by the DICOM UL service user
    ServiceUser(AssociationRJServiceUserReason),
    /// rejected by the service provider (ACSE related)
    ServiceProviderAsce(AssociationRJServiceProviderAsceReason),
    /// rejected by the service provider (presentation related)
    ServiceProviderPresentation(AssociationRJServiceProviderPresentationReason),
}

/// Service-user rejection reasons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssociationRJServiceUserReason {
    /// no reason given
    NoReasonGiven,
    /// application context name not supported
    ApplicationContextNameNotSupported,
    /// calling AE title not recognized
    CallingAETitleNotRecognized,
    /// called AE title not recognized
    CalledAETitleNotRecognized,
    /// reserved value
    Reserved(u8),
}

/// Service-provider (ACSE) rejection reasons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssociationRJServiceProviderAsceReason {
    /// no reason given
    NoReasonGiven,
    /// protocol version not supported
    ProtocolVersionNotSupported,
}

/// Service-provider (presentation) rejection reasons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssociationRJServiceProviderPresentationReason {
    /// temporary congestion
    TemporaryCongestion,
    /// local limit exceeded
    LocalLimitExceeded,
    /// reserved value
    Reserved(u8),
}

/// One Presentation Data Value of a P-DATA-TF PDU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PDataValue {
    /// the presentation context of the fragment
    pub presentation_context_id: u8,
    /// whether the fragment belongs to a command set or a data set
    pub value_type: PDataValueType,
    /// whether this is the last fragment of its stream
    pub is_last: bool,
    /// the fragment bytes
    pub data: Vec<u8>,
}

/// The kind of content carried by a PDV fragment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PDataValueType {
    /// part of a command set
    Command,
    /// part of a data set
    Data,
}

/// The source field of an A-ABORT.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AbortSource {
    /// aborted by the service user
    ServiceUser,
    /// aborted by the service provider, with a reason
    ServiceProvider(AbortServiceProviderReason),
    /// reserved value
    Reserved,
}

/// Service-provider abort reasons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AbortServiceProviderReason {
    /// reason not specified or unrecognized PDU
    ReasonNotSpecified,
    /// a PDU was received in an unexpected state
    UnexpectedPdu,
    /// reserved value
    Reserved,
    /// unrecognized PDU parameter
    UnrecognizedPduParameter,
    /// unexpected PDU parameter
    UnexpectedPduParameter,
    /// invalid PDU parameter value
    InvalidPduParameter,
}

/// The type of an asserted user identity (PS3.7 D.3.3.7).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentityType {
    /// username only
    Username,
    /// username and passcode
    UsernameAndPasscode,
    /// Kerberos service ticket
    KerberosServiceTicket,
    /// SAML assertion
    SamlAssertion,
    /// JSON web token
    Jwt,
}

impl UserIdentityType {
    /// The wire value of this identity type.
    pub fn to_u8(self) -> u8 {
        match self {
            UserIdentityType::Username => 1,
            UserIdentityType::UsernameAndPasscode => 2,
            UserIdentityType::KerberosServiceTicket => 3,
            UserIdentityType::SamlAssertion => 4,
            UserIdentityType::Jwt => 5,
        }
    }

    /// Interpret a wire value as an identity type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(UserIdentityType::Username),
            2 => Some(UserIdentityType::UsernameAndPasscode),
            3 => Some(UserIdentityType::KerberosServiceTicket),
            4 => Some(UserIdentityType::SamlAssertion),
            5 => Some(UserIdentityType::Jwt),
            _ => None,
        }
    }
}

/// A user identity negotiation request sub-item (type 0x58).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentityRequest {
    /// the kind of identity asserted
    pub identity_type: UserIdentityType,
    /// whether a positive server response is requested
    pub positive_response_requested: bool,
    /// the primary identity field (e.g. the username)
    pub primary_field: Vec<u8>,
    /// the secondary identity field (e.g. the passcode)
    pub secondary_field: Vec<u8>,
}

/// An item of the user information sub-item (type 0x50).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserVariableItem {
    /// maximum length of P-DATA-TF PDUs the sender can receive (0x51)
    MaxLength(u32),
    /// implementation class UID of the sender (0x52)
    ImplementationClassUID(String),
    /// implementation version name of the sender (0x55)
    ImplementationVersionName(String),
    /// user identity negotiation request (0x58)
    UserIdentity(UserIdentityRequest),
    /// user identity negotiation acknowledgment (0x59)
    UserIdentityAck(Vec<u8>),
    /// an unrecognized sub-item, kept verbatim
    Unknown(u8, Vec<u8>),
}

/// The payload of an A-ASSOCIATE-RQ PDU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationRQ {
    /// the protocol version bit field (bit 0 set for version 1)
    pub protocol_version: u16,
    /// the AE title of the association requester
    pub calling_ae_title: String,
    /// the AE title of the intended acceptor
    pub called_ae_title: String,
    /// the application context name
    pub application_context_name: String,
    /// the proposed presentation contexts
    pub presentation_contexts: Vec<PresentationContextProposed>,
    /// user information sub-items
    pub user_variables: Vec<UserVariableItem>,
}

/// The payload of an A-ASSOCIATE-AC PDU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationAC {
    /// the protocol version bit field
    pub protocol_version: u16,
    /// the called AE title echoed back
    pub called_ae_title: String,
    /// the calling AE title echoed back
    pub calling_ae_title: String,
    /// the application context name
    pub application_context_name: String,
    /// the presentation context negotiation results
    pub presentation_contexts: Vec<PresentationContextResult>,
    /// user information sub-items
    pub user_variables: Vec<UserVariableItem>,
}

/// The payload of an A-ASSOCIATE-RJ PDU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationRJ {
    /// whether the rejection is permanent or transient
    pub result: AssociationRJResult,
    /// who rejected the association and why
    pub source: AssociationRJSource,
}

/// A DICOM Upper Layer protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pdu {
    /// A-ASSOCIATE-RQ (type 0x01)
    AssociationRQ(AssociationRQ),
    /// A-ASSOCIATE-AC (type 0x02)
    AssociationAC(AssociationAC),
    /// A-ASSOCIATE-RJ (type 0x03)
    AssociationRJ(AssociationRJ),
    /// P-DATA-TF (type 0x04)
    PData {
        /// the presentation data values carried
        data: Vec<PDataValue>,
    },
    /// A-RELEASE-RQ (type 0x05)
    ReleaseRQ,
    /// A-RELEASE-RP (type 0x06)
    ReleaseRP,
    /// A-ABORT (type 0x07)
    AbortRQ {
        /// who aborted the association and why
        source: AbortSource,
    },
    /// a PDU of unrecognized type, kept verbatim
    Unknown {
        /// the PDU type byte
        pdu_type: u8,
        /// the raw payload
        data: Vec<u8>,
    },
}

impl Pdu {
    /// A short description of the PDU for logging.
    pub fn short_description(&self) -> &'static str {
        match self {
            Pdu::AssociationRQ { .. } => "A-ASSOCIATE-RQ",
            Pdu::AssociationAC { .. } => "A-ASSOCIATE-AC",
            Pdu::AssociationRJ { .. } => "A-ASSOCIATE-RJ",
            Pdu::PData { .. } => "P-DATA-TF",
            Pdu::ReleaseRQ => "A-RELEASE-RQ",
            Pdu::ReleaseRP => "A-RELEASE-RP",
            Pdu::AbortRQ { .. } => "A-ABORT",
            Pdu::Unknown { .. } => "unknown PDU",
        }
    }
}
