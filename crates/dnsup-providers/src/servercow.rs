//! Servercow adapter: one POST per update, credentials in headers.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    username: String,
    password: String,
    ttl: Option<u32>,
}

#[derive(Deserialize)]
struct Answer {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
}

pub struct Servercow {
    domain: String,
    host: String,
    ip_version: IpVersion,
    username: String,
    password: String,
    ttl: u32,
    endpoint: Url,
}

impl Servercow {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        if cfg.host == "*" {
            return Err(ValidationError::HostWildcardNotAllowed);
        }
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
            ttl: settings.ttl.unwrap_or(120),
            endpoint: common::static_url("https://api.servercow.de/dns/v1/domains"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Servercow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "servercow", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Servercow {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&self.domain);
        }
        // content name is host-relative, with "@" meaning the apex
        let name = if self.host == "@" { "" } else { self.host.as_str() };
        let body = serde_json::json!({
            "type": record_type(ip),
            "name": name,
            "content": ip.to_string(),
            "ttl": self.ttl,
        });

        let request = with_user_agent(client.post(url))
            .header("X-Auth-Username", &self.username)
            .header("X-Auth-Password", &self.password)
            .json(&body);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text).in_update_record());
        }
        let answer: Answer = serde_json::from_str(&text)?;
        if !answer.error.is_empty() {
            return Err(UpdateError::Unsuccessful(to_single_line(&answer.error)));
        }
        if answer.message != "ok" {
            return Err(UpdateError::UnknownResponse(to_single_line(&text)));
        }
        Ok(ip)
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
            provider: "<a href=\"https://servercow.de\">Servercow</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
