//! Configuration types
//!
//! Records are configured as flat JSON objects: the common fields
//! (`provider`, `domain`, `host`, `ip_version`) are typed here and
//! everything else is kept as a flattened map that each adapter
//! deserializes into its own settings struct.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// IP address family a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4 only
    #[serde(rename = "ipv4")]
    V4,
    /// IPv6 only
    #[serde(rename = "ipv6")]
    V6,
    /// Whichever family the machine has, IPv4 preferred
    #[serde(rename = "ipv4 or ipv6")]
    V4OrV6,
}

impl Default for IpVersion {
    fn default() -> Self {
        Self::V4OrV6
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
            Self::V4OrV6 => "ipv4 or ipv6",
        };
        f.write_str(s)
    }
}

impl IpVersion {
    /// Whether an address belongs to this family.
    pub fn matches(self, ip: IpAddr) -> bool {
        match self {
            Self::V4 => ip.is_ipv4(),
            Self::V6 => ip.is_ipv6(),
            Self::V4OrV6 => true,
        }
    }
}

/// DNS record type for an address, `A` or `AAAA`.
pub fn record_type(ip: IpAddr) -> &'static str {
    if ip.is_ipv4() {
        "A"
    } else {
        "AAAA"
    }
}

/// Closed set of supported providers.
///
/// Serde names are the values accepted in configuration files; adding a
/// provider means adding a variant here and an arm to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aliyun,
    Cloudflare,
    Dd24,
    DigitalOcean,
    DnsOMatic,
    DnsPod,
    Dreamhost,
    DuckDns,
    Dyn,
    Dynu,
    FreeDns,
    Gandi,
    GoDaddy,
    Google,
    He,
    Infomaniak,
    Inwx,
    Linode,
    LuaDns,
    Namecheap,
    Netcup,
    Njalla,
    NoIp,
    Ovh,
    Porkbun,
    SelfhostDe,
    Servercow,
    Spdyn,
    Strato,
}

impl ProviderKind {
    /// Configuration name, also used in log fields and display strings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aliyun => "aliyun",
            Self::Cloudflare => "cloudflare",
            Self::Dd24 => "dd24",
            Self::DigitalOcean => "digitalocean",
            Self::DnsOMatic => "dnsomatic",
            Self::DnsPod => "dnspod",
            Self::Dreamhost => "dreamhost",
            Self::DuckDns => "duckdns",
            Self::Dyn => "dyn",
            Self::Dynu => "dynu",
            Self::FreeDns => "freedns",
            Self::Gandi => "gandi",
            Self::GoDaddy => "godaddy",
            Self::Google => "google",
            Self::He => "he",
            Self::Infomaniak => "infomaniak",
            Self::Inwx => "inwx",
            Self::Linode => "linode",
            Self::LuaDns => "luadns",
            Self::Namecheap => "namecheap",
            Self::Netcup => "netcup",
            Self::Njalla => "njalla",
            Self::NoIp => "noip",
            Self::Ovh => "ovh",
            Self::Porkbun => "porkbun",
            Self::SelfhostDe => "selfhostde",
            Self::Servercow => "servercow",
            Self::Spdyn => "spdyn",
            Self::Strato => "strato",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_host() -> String {
    "@".to_string()
}

/// One managed DNS record as found in the configuration file.
///
/// Provider-specific keys (`token`, `key`, `zone_identifier`, ...) stay
/// in `settings` and are deserialized by the adapter's own factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Which adapter handles this record
    pub provider: ProviderKind,

    /// Registered domain, e.g. `example.com`
    pub domain: String,

    /// Subdomain label, `@` for the apex, `*` for a wildcard
    #[serde(default = "default_host")]
    pub host: String,

    /// Address family this record tracks
    #[serde(default)]
    pub ip_version: IpVersion,

    /// Remaining provider-specific keys, flattened
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl RecordConfig {
    /// Deserialize the flattened settings into an adapter's own struct.
    pub fn settings_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.settings.clone()))
    }
}

/// Top-level configuration file shape: `{"settings": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// All managed records
    pub settings: Vec<RecordConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_config_defaults() {
        let cfg: RecordConfig = serde_json::from_str(
            r#"{"provider": "duckdns", "domain": "duckdns.org", "token": "t"}"#,
        )
        .unwrap();

        assert_eq!(cfg.provider, ProviderKind::DuckDns);
        assert_eq!(cfg.host, "@");
        assert_eq!(cfg.ip_version, IpVersion::V4OrV6);
        assert_eq!(cfg.settings.get("token").unwrap(), "t");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = serde_json::from_str::<RecordConfig>(
            r#"{"provider": "route53", "domain": "example.com"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("route53"));
    }

    #[test]
    fn dyn_keyword_maps_to_dyn_variant() {
        let cfg: RecordConfig = serde_json::from_str(
            r#"{"provider": "dyn", "domain": "dyndns.org", "host": "www"}"#,
        )
        .unwrap();
        assert_eq!(cfg.provider, ProviderKind::Dyn);
    }

    #[test]
    fn ip_version_serde_names() {
        for (text, version) in [
            ("\"ipv4\"", IpVersion::V4),
            ("\"ipv6\"", IpVersion::V6),
            ("\"ipv4 or ipv6\"", IpVersion::V4OrV6),
        ] {
            let parsed: IpVersion = serde_json::from_str(text).unwrap();
            assert_eq!(parsed, version);
            assert_eq!(serde_json::to_string(&version).unwrap(), text);
        }
    }

    #[test]
    fn ip_version_family_match() {
        let v4: IpAddr = "203.0.113.4".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert!(IpVersion::V4.matches(v4));
        assert!(!IpVersion::V4.matches(v6));
        assert!(IpVersion::V6.matches(v6));
        assert!(IpVersion::V4OrV6.matches(v4));
        assert!(IpVersion::V4OrV6.matches(v6));

        assert_eq!(record_type(v4), "A");
        assert_eq!(record_type(v6), "AAAA");
    }
}
