//! Built-in echo services
//!
//! Each named service maps to fixed URLs per address family; custom
//! entries are written `url:https://...` and may be placed in any
//! family ring since only the operator knows what they echo.

use dnsup_core::{IpVersion, ValidationError};
use url::Url;

/// One echo service entry from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoService {
    Google,
    Ifconfig,
    Ipify,
    Ipinfo,
    NoIp,
    OpenDns,
    /// Operator-supplied URL, accepted for any family
    Custom(Url),
}

impl EchoService {
    /// Parse a configuration entry, a known name or `url:<address>`.
    pub fn parse(entry: &str) -> Result<Self, ValidationError> {
        match entry {
            "google" => Ok(Self::Google),
            "ifconfig" => Ok(Self::Ifconfig),
            "ipify" => Ok(Self::Ipify),
            "ipinfo" => Ok(Self::Ipinfo),
            "noip" => Ok(Self::NoIp),
            "opendns" => Ok(Self::OpenDns),
            other => {
                if let Some(raw) = other.strip_prefix("url:") {
                    let url = Url::parse(raw)
                        .map_err(|_| ValidationError::EchoUrlMalformed(raw.to_string()))?;
                    Ok(Self::Custom(url))
                } else {
                    Err(ValidationError::UnknownEchoService(other.to_string()))
                }
            }
        }
    }

    /// URL serving the given family, if the service has one.
    pub fn url(&self, version: IpVersion) -> Option<Url> {
        let raw = match (self, version) {
            (Self::Google, _) => "https://domains.google.com/checkip",
            (Self::Ifconfig, _) => "https://ifconfig.io/ip",
            (Self::Ipify, IpVersion::V4) => "https://api.ipify.org",
            (Self::Ipify, IpVersion::V6) => "https://api6.ipify.org",
            (Self::Ipify, IpVersion::V4OrV6) => "https://api64.ipify.org",
            (Self::Ipinfo, _) => "https://ipinfo.io/ip",
            (Self::NoIp, IpVersion::V4) => "http://ip1.dynupdate.no-ip.com",
            (Self::NoIp, IpVersion::V6) => "http://ip1.dynupdate6.no-ip.com",
            (Self::NoIp, IpVersion::V4OrV6) => return None,
            (Self::OpenDns, _) => "https://diagnostic.opendns.com/myip",
            (Self::Custom(url), _) => return Some(url.clone()),
        };
        // hardcoded addresses above always parse
        Url::parse(raw).ok()
    }

    /// Configuration name of the service.
    pub fn name(&self) -> &str {
        match self {
            Self::Google => "google",
            Self::Ifconfig => "ifconfig",
            Self::Ipify => "ipify",
            Self::Ipinfo => "ipinfo",
            Self::NoIp => "noip",
            Self::OpenDns => "opendns",
            Self::Custom(url) => url.as_str(),
        }
    }

    /// Every built-in service serving the given family, the expansion
    /// of the `all` configuration entry.
    pub fn all(version: IpVersion) -> Vec<Self> {
        [
            Self::Google,
            Self::Ifconfig,
            Self::Ipify,
            Self::Ipinfo,
            Self::NoIp,
            Self::OpenDns,
        ]
        .into_iter()
        .filter(|service| service.url(version).is_some())
        .collect()
    }
}
