//! Error types for the dnsup system
//!
//! Three audiences, three enums: `ValidationError` is returned while
//! building adapters from configuration, `UpdateError` while talking to
//! a DNS provider, and `FetchError` while asking echo services for the
//! public address.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::IpVersion;

/// Errors detected while constructing an adapter from its settings.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Domain missing from the record settings
    #[error("domain is not set")]
    DomainNotSet,

    /// Host missing or empty
    #[error("host is not set")]
    HostNotSet,

    /// Provider refuses wildcard hosts
    #[error("wildcard host is not allowed for this provider")]
    HostWildcardNotAllowed,

    /// Key credential missing
    #[error("key is not set")]
    KeyNotSet,

    /// Key credential fails the provider's shape check
    #[error("key is malformed")]
    KeyMalformed,

    /// Token credential missing
    #[error("token is not set")]
    TokenNotSet,

    /// Token credential fails the provider's shape check
    #[error("token is malformed")]
    TokenMalformed,

    /// Secret credential missing
    #[error("secret is not set")]
    SecretNotSet,

    /// Password missing
    #[error("password is not set")]
    PasswordNotSet,

    /// Password fails the provider's shape check
    #[error("password is malformed")]
    PasswordMalformed,

    /// Username missing
    #[error("username is not set")]
    UsernameNotSet,

    /// Username exceeds the provider's length limit
    #[error("username is {0} characters long, maximum is {1}")]
    UsernameTooLong(usize, usize),

    /// Email missing
    #[error("email is not set")]
    EmailNotSet,

    /// Email fails the shape check
    #[error("email is malformed")]
    EmailMalformed,

    /// Application key missing (OVH API mode)
    #[error("application key is not set")]
    AppKeyNotSet,

    /// Application secret missing (OVH API mode)
    #[error("application secret is not set")]
    AppSecretNotSet,

    /// Consumer key missing (OVH API mode)
    #[error("consumer key is not set")]
    ConsumerKeyNotSet,

    /// Cloudflare user service key fails its shape check
    #[error("user service key is malformed")]
    UserServiceKeyMalformed,

    /// Cloudflare credentials incomplete
    #[error("credentials are not set")]
    CredentialsNotSet,

    /// Zone identifier missing
    #[error("zone identifier is not set")]
    ZoneIdentifierNotSet,

    /// Netcup customer number missing
    #[error("customer number is not set")]
    CustomerNumberNotSet,

    /// Aliyun access key id missing
    #[error("access key id is not set")]
    AccessKeyIdNotSet,

    /// Aliyun access key secret missing
    #[error("access key secret is not set")]
    AccessKeySecretNotSet,

    /// TTL required by the upstream but absent
    #[error("TTL is not set")]
    TtlNotSet,

    /// Provider cannot serve AAAA records
    #[error("IPv6 is not supported by this provider")]
    Ipv6NotSupported,

    /// OVH endpoint name not in the known set
    #[error("unknown API endpoint {0:?}")]
    UnknownEndpoint(String),

    /// Echo service name not in the built-in set and not a url: entry
    #[error("unknown echo service {0:?}")]
    UnknownEchoService(String),

    /// Echo service does not serve the requested IP family
    #[error("echo service {service:?} does not support {version}")]
    EchoVersionUnsupported {
        /// Service name or custom URL
        service: String,
        /// Requested family
        version: IpVersion,
    },

    /// Custom echo URL failed to parse
    #[error("echo service URL is malformed: {0}")]
    EchoUrlMalformed(String),

    /// Provider settings failed to deserialize
    #[error("invalid provider settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Errors returned by adapters while exchanging with a provider API.
///
/// Phase wrapper variants (`GetZoneId`, `ListRecords`, ...) keep the
/// inner error as their `#[source]` so the kind survives wrapping;
/// [`UpdateError::root`] walks back to it.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Transport-level failure from reqwest
    #[error("sending HTTP request: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON shape the provider documents
    #[error("decoding response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected HTTP status, with the flattened response body
    #[error("HTTP status {status}: {body}")]
    BadHttpStatus {
        /// Numeric status code
        status: u16,
        /// Response body flattened to a single line
        body: String,
    },

    /// Credentials rejected by the upstream
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream rejected the request shape
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Account blocked for abuse
    #[error("account blocked for abuse: {0}")]
    Abuse(String),

    /// User agent rejected by the upstream
    #[error("user agent is banned: {0}")]
    BannedUserAgent(String),

    /// Record clashes with an existing record of the other family
    #[error("conflicting record: {0}")]
    ConflictingRecord(String),

    /// Account exists but is deactivated upstream
    #[error("account is inactive: {0}")]
    AccountInactive(String),

    /// Upstream refused a private address
    #[error("private IP address sent: {0}")]
    PrivateIPSent(String),

    /// Upstream could not parse the address sent
    #[error("malformed IP address sent: {0}")]
    MalformedIPSent(String),

    /// Failure on the provider's DNS servers
    #[error("server side DNS error: {0}")]
    DnsServerSide(String),

    /// Feature not available on the account
    #[error("feature is unavailable to this user: {0}")]
    FeatureUnavailable(String),

    /// Hostname unknown to the upstream
    #[error("hostname does not exist: {0}")]
    HostnameNotExists(String),

    /// Domain exists but is not active
    #[error("domain is disabled: {0}")]
    DomainDisabled(String),

    /// Domain identifier absent from the listing response
    #[error("domain ID not found: {0}")]
    DomainIdNotFound(String),

    /// Zone absent from the listing response
    #[error("zone was not found: {0}")]
    ZoneNotFound(String),

    /// Record absent from the listing response
    #[error("record was not found: {0}")]
    RecordNotFound(String),

    /// Record exists but the upstream marks it read-only
    #[error("record is not editable: {0}")]
    RecordNotEditable(String),

    /// Login succeeded but returned an empty session identifier
    #[error("session identifier is empty")]
    SessionEmpty,

    /// Upstream rate limiting
    #[error("too many requests: {0}")]
    RateLimited(String),

    /// Upstream echoed an address that does not parse
    #[error("received IP address is malformed: {0}")]
    IpReceivedMalformed(String),

    /// Upstream echoed a different address than the one sent
    #[error("received IP address {received} mismatches sent address {sent}")]
    IpReceivedMismatch {
        /// Address sent in the request
        sent: IpAddr,
        /// Address echoed back
        received: IpAddr,
    },

    /// Response carried no usable result object
    #[error("no result received: {0}")]
    NoResultReceived(String),

    /// Response body matched no known success or failure token
    #[error("unknown response: {0}")]
    UnknownResponse(String),

    /// Response is well-formed but reports failure
    #[error("unsuccessful response: {0}")]
    Unsuccessful(String),

    /// Failure while resolving the zone identifier
    #[error("getting zone identifier: {0}")]
    GetZoneId(#[source] Box<UpdateError>),

    /// Failure while listing existing records
    #[error("listing records: {0}")]
    ListRecords(#[source] Box<UpdateError>),

    /// Failure while resolving the record identifier
    #[error("getting record identifier: {0}")]
    GetRecordId(#[source] Box<UpdateError>),

    /// Failure while creating the record
    #[error("creating record: {0}")]
    CreateRecord(#[source] Box<UpdateError>),

    /// Failure while updating the record
    #[error("updating record: {0}")]
    UpdateRecord(#[source] Box<UpdateError>),

    /// Failure while removing the stale record
    #[error("removing record: {0}")]
    RemoveRecord(#[source] Box<UpdateError>),
}

impl UpdateError {
    /// Wrap as a zone-resolution phase failure
    pub fn in_get_zone_id(self) -> Self {
        Self::GetZoneId(Box::new(self))
    }

    /// Wrap as a record-listing phase failure
    pub fn in_list_records(self) -> Self {
        Self::ListRecords(Box::new(self))
    }

    /// Wrap as a record-id resolution phase failure
    pub fn in_get_record_id(self) -> Self {
        Self::GetRecordId(Box::new(self))
    }

    /// Wrap as a record-creation phase failure
    pub fn in_create_record(self) -> Self {
        Self::CreateRecord(Box::new(self))
    }

    /// Wrap as a record-update phase failure
    pub fn in_update_record(self) -> Self {
        Self::UpdateRecord(Box::new(self))
    }

    /// Wrap as a record-removal phase failure
    pub fn in_remove_record(self) -> Self {
        Self::RemoveRecord(Box::new(self))
    }

    /// Walk through phase wrappers down to the underlying kind
    pub fn root(&self) -> &UpdateError {
        match self {
            Self::GetZoneId(inner)
            | Self::ListRecords(inner)
            | Self::GetRecordId(inner)
            | Self::CreateRecord(inner)
            | Self::UpdateRecord(inner)
            | Self::RemoveRecord(inner) => inner.root(),
            other => other,
        }
    }
}

/// Errors returned while fetching the public address from echo services.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure from reqwest
    #[error("sending HTTP request: {0}")]
    Http(#[from] reqwest::Error),

    /// Echo service replied with an unexpected status
    #[error("HTTP status {status} from {url}: {body}")]
    BadStatus {
        /// Echo service URL
        url: String,
        /// Numeric status code
        status: u16,
        /// Response body flattened to a single line
        body: String,
    },

    /// Response body contained no address literal of the wanted family
    #[error("no IP address found in response from {url}")]
    NoIpFound {
        /// Echo service URL
        url: String,
    },

    /// Response body contained several distinct candidate literals
    #[error("too many IP addresses found in response from {url}: {found:?}")]
    TooManyIps {
        /// Echo service URL
        url: String,
        /// Every literal found, in body order
        found: Vec<IpAddr>,
    },

    /// Every echo service for the family is banned
    #[error("all echo services are banned: {0}")]
    Banned(String),

    /// No echo service in the configuration serves the family
    #[error("no echo service supports {0}")]
    UnsupportedVersion(IpVersion),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_nested_phase_wrappers() {
        let err = UpdateError::Auth("bad key".into())
            .in_list_records()
            .in_get_zone_id();

        assert!(matches!(err.root(), UpdateError::Auth(_)));
        assert_eq!(
            err.to_string(),
            "getting zone identifier: listing records: authentication failed: bad key",
        );
    }

    #[test]
    fn bad_status_formats_body() {
        let err = UpdateError::BadHttpStatus {
            status: 502,
            body: "upstream gone".into(),
        };
        assert_eq!(err.to_string(), "HTTP status 502: upstream gone");
    }
}
