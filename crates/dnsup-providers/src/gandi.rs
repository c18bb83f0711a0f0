//! Gandi LiveDNS adapter: one PUT on the rrset, expecting 201 Created.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_bearer, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

const DEFAULT_TTL: u32 = 3600;

#[derive(Deserialize)]
struct Settings {
    #[serde(default)]
    personal_access_token: String,
    #[serde(default)]
    api_key: String,
    ttl: Option<u32>,
}

enum Auth {
    PersonalAccessToken(String),
    ApiKey(String),
}

pub struct Gandi {
    domain: String,
    host: String,
    ip_version: IpVersion,
    auth: Auth,
    ttl: u32,
    endpoint: Url,
}

impl Gandi {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        let auth = if !settings.personal_access_token.is_empty() {
            Auth::PersonalAccessToken(settings.personal_access_token)
        } else if !settings.api_key.is_empty() {
            Auth::ApiKey(settings.api_key)
        } else {
            return Err(ValidationError::CredentialsNotSet);
        };
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            auth,
            ttl: settings.ttl.unwrap_or(DEFAULT_TTL),
            endpoint: common::static_url("https://dns.api.gandi.net/api/v5"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Gandi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "gandi", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Gandi {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(["domains", &self.domain, "records", &self.host]);
            segments.push(record_type(ip));
        }
        let body = serde_json::json!({
            "rrset_values": [ip.to_string()],
            "rrset_ttl": self.ttl,
        });

        let request = with_user_agent(client.put(url)).json(&body);
        let request = match &self.auth {
            Auth::PersonalAccessToken(token) => with_bearer(request, token),
            Auth::ApiKey(key) => request.header("X-Api-Key", key),
        };
        let response = request.send().await?;
        let status = response.status();
        let flat = body_single_line(response).await?;
        if status != reqwest::StatusCode::CREATED {
            return Err(common::bad_status(status, &flat).in_update_record());
        }
        // the answer carries no rrset echo
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
            provider: "<a href=\"https://www.gandi.net\">Gandi</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
