//! DomainDiscount24 adapter.
//!
//! The update endpoint answers prose: an empty body or one containing
//! `success` means the record is set, `authorization failed` means the
//! password is wrong.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    password: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct Dd24 {
    domain: String,
    host: String,
    ip_version: IpVersion,
    password: String,
    provider_ip: bool,
    endpoint: Url,
}

impl Dd24 {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            password: settings.password,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://dynamicdns.key-systems.net/update.php"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Dd24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "dd24", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Dd24 {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "hostname",
                &build_url_query_hostname(&self.host, &self.domain),
            );
            query.append_pair("password", &self.password);
            if self.provider_ip {
                query.append_pair("ip", "auto");
            } else {
                query.append_pair("ip", &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }

        let lowered = body.to_lowercase();
        if lowered.contains("authorization failed") {
            Err(UpdateError::Auth(body))
        } else if body.is_empty() || lowered.contains("success") {
            // no echo in the answer
            Ok(ip)
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
            provider: "<a href=\"https://www.domaindiscount24.com\">DD24</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
