//! DuckDNS adapter
//!
//! Single GET against `https://www.duckdns.org/update` with
//! `verbose=true` so the answer carries the address now served. The
//! body starts with `OK` on success and `KO` on bad credentials.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("hardcoded regex")
});

#[derive(Deserialize)]
struct Settings {
    token: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct DuckDns {
    domain: String,
    host: String,
    ip_version: IpVersion,
    token: String,
    provider_ip: bool,
    endpoint: Url,
}

impl DuckDns {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.token.is_empty() {
            return Err(ValidationError::TokenNotSet);
        }
        if !TOKEN_RE.is_match(&settings.token) {
            return Err(ValidationError::TokenMalformed);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            token: settings.token,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://www.duckdns.org/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for DuckDns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "duckdns", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for DuckDns {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("verbose", "true");
            query.append_pair(
                "domains",
                &build_url_query_hostname(&self.host, &self.domain),
            );
            query.append_pair("token", &self.token);
            if !self.provider_ip {
                let param = if ip.is_ipv4() { "ip" } else { "ipv6" };
                query.append_pair(param, &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }

        if body.starts_with("OK") {
            common::resolve_echo_required(ip, &body, self.provider_ip)
        } else if body.starts_with("KO") {
            Err(UpdateError::Auth(body))
        } else {
            Err(UpdateError::UnknownResponse(body))
        }
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn ip_version(&self) -> IpVersion {
        self.ip_version
    }

    fn html(&self) -> HtmlRow {
        HtmlRow {
            domain: html_domain_anchor(&self.domain),
            host: self.host.clone(),
            provider: "<a href=\"https://www.duckdns.org\">DuckDNS</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
