//! Adapter construction.
//!
//! The match is exhaustive over [`ProviderKind`] so a new variant fails
//! to compile until it gets an arm here.

use dnsup_core::{ProviderKind, RecordConfig, Updater, ValidationError};

use crate::{
    aliyun::Aliyun, cloudflare::Cloudflare, dd24::Dd24, digitalocean::DigitalOcean,
    dnsomatic::DnsOMatic, dnspod::DnsPod, dreamhost::Dreamhost, duckdns::DuckDns, dyncom::Dyn,
    dynu::Dynu, freedns::FreeDns, gandi::Gandi, godaddy::GoDaddy, google::GoogleDomains, he::He,
    infomaniak::Infomaniak, inwx::Inwx, linode::Linode, luadns::LuaDns, namecheap::Namecheap,
    netcup::Netcup, njalla::Njalla, noip::NoIp, ovh::Ovh, porkbun::Porkbun,
    selfhostde::SelfhostDe, servercow::Servercow, spdyn::Spdyn, strato::Strato,
};

/// Build the adapter for a configured record.
pub fn new_updater(cfg: &RecordConfig) -> Result<Box<dyn Updater>, ValidationError> {
    if cfg.domain.is_empty() {
        return Err(ValidationError::DomainNotSet);
    }
    if cfg.host.is_empty() {
        return Err(ValidationError::HostNotSet);
    }
    tracing::debug!(
        provider = %cfg.provider,
        domain = %cfg.domain,
        host = %cfg.host,
        "building adapter"
    );
    Ok(match cfg.provider {
        ProviderKind::Aliyun => Box::new(Aliyun::new(cfg)?),
        ProviderKind::Cloudflare => Box::new(Cloudflare::new(cfg)?),
        ProviderKind::Dd24 => Box::new(Dd24::new(cfg)?),
        ProviderKind::DigitalOcean => Box::new(DigitalOcean::new(cfg)?),
        ProviderKind::DnsOMatic => Box::new(DnsOMatic::new(cfg)?),
        ProviderKind::DnsPod => Box::new(DnsPod::new(cfg)?),
        ProviderKind::Dreamhost => Box::new(Dreamhost::new(cfg)?),
        ProviderKind::DuckDns => Box::new(DuckDns::new(cfg)?),
        ProviderKind::Dyn => Box::new(Dyn::new(cfg)?),
        ProviderKind::Dynu => Box::new(Dynu::new(cfg)?),
        ProviderKind::FreeDns => Box::new(FreeDns::new(cfg)?),
        ProviderKind::Gandi => Box::new(Gandi::new(cfg)?),
        ProviderKind::GoDaddy => Box::new(GoDaddy::new(cfg)?),
        ProviderKind::Google => Box::new(GoogleDomains::new(cfg)?),
        ProviderKind::He => Box::new(He::new(cfg)?),
        ProviderKind::Infomaniak => Box::new(Infomaniak::new(cfg)?),
        ProviderKind::Inwx => Box::new(Inwx::new(cfg)?),
        ProviderKind::Linode => Box::new(Linode::new(cfg)?),
        ProviderKind::LuaDns => Box::new(LuaDns::new(cfg)?),
        ProviderKind::Namecheap => Box::new(Namecheap::new(cfg)?),
        ProviderKind::Netcup => Box::new(Netcup::new(cfg)?),
        ProviderKind::Njalla => Box::new(Njalla::new(cfg)?),
        ProviderKind::NoIp => Box::new(NoIp::new(cfg)?),
        ProviderKind::Ovh => Box::new(Ovh::new(cfg)?),
        ProviderKind::Porkbun => Box::new(Porkbun::new(cfg)?),
        ProviderKind::SelfhostDe => Box::new(SelfhostDe::new(cfg)?),
        ProviderKind::Servercow => Box::new(Servercow::new(cfg)?),
        ProviderKind::Spdyn => Box::new(Spdyn::new(cfg)?),
        ProviderKind::Strato => Box::new(Strato::new(cfg)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> RecordConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn builds_every_dialect() {
        let duckdns = new_updater(&record(serde_json::json!({
            "provider": "duckdns",
            "domain": "duckdns.org",
            "host": "mysub",
            "token": "00000000-0000-0000-0000-000000000000",
        })))
        .unwrap();
        assert_eq!(duckdns.domain(), "duckdns.org");

        let cloudflare = new_updater(&record(serde_json::json!({
            "provider": "cloudflare",
            "domain": "example.com",
            "host": "www",
            "zone_identifier": "zone1",
            "ttl": 600,
            "token": "cftoken",
        })))
        .unwrap();
        assert_eq!(cloudflare.host(), "www");
    }

    #[test]
    fn empty_domain_is_rejected_before_the_adapter_runs() {
        let err = new_updater(&record(serde_json::json!({
            "provider": "duckdns",
            "domain": "",
            "token": "00000000-0000-0000-0000-000000000000",
        })))
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::DomainNotSet));
    }

    #[test]
    fn settings_errors_propagate() {
        let err = new_updater(&record(serde_json::json!({
            "provider": "njalla",
            "domain": "example.com",
            "host": "www",
        })))
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::Settings(_)));
    }

    #[test]
    fn display_shows_the_provider_name() {
        let updater = new_updater(&record(serde_json::json!({
            "provider": "he",
            "domain": "example.com",
            "host": "www",
            "password": "hepass",
        })))
        .unwrap();
        let shown = updater.to_string();
        assert!(shown.contains("provider: he"), "got {shown}");
        assert!(!shown.contains("hepass"), "credentials leaked: {shown}");
    }
}
