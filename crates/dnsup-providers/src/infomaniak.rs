//! Infomaniak adapter.
//!
//! dyndns v2 over basic auth; failure tokens arrive in the body of a
//! 400 answer rather than a 200 one.

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
    username: String,
    password: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct Infomaniak {
    domain: String,
    host: String,
    ip_version: IpVersion,
    username: String,
    password: String,
    provider_ip: bool,
    endpoint: Url,
}

impl Infomaniak {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.username.is_empty() {
            return Err(ValidationError::UsernameNotSet);
        }
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            username: settings.username,
            password: settings.password,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://infomaniak.com/nic/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Infomaniak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "infomaniak", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Infomaniak {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "hostname",
                &build_url_query_hostname(&self.host, &self.domain),
            );
            if !self.provider_ip {
                query.append_pair("myip", &ip.to_string());
            }
        }

        let request = client.get(url).basic_auth(&self.username, Some(&self.password));
        let response = with_user_agent(request).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;

        if status == reqwest::StatusCode::BAD_REQUEST {
            return match common::classify_token(&body) {
                Some(err) => Err(err),
                None => Err(UpdateError::BadRequest(body)),
            };
        }
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }
        common::parse_good_nochg_required(&body, ip, self.provider_ip)
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
            provider: "<a href=\"https://www.infomaniak.com\">Infomaniak</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
