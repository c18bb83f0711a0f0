//! Porkbun adapter.
//!
//! Every call is a POST with both API keys in the JSON body. Records
//! are addressed by name and type, then edited or created by id.

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
    api_key: String,
    secret_api_key: String,
    ttl: Option<u32>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    records: Vec<ListedRecord>,
}

#[derive(Deserialize)]
struct ListedRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    content: String,
}

pub struct Porkbun {
    domain: String,
    host: String,
    ip_version: IpVersion,
    api_key: String,
    secret_api_key: String,
    ttl: u32,
    endpoint: Url,
}

impl Porkbun {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.api_key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        if settings.secret_api_key.is_empty() {
            return Err(ValidationError::SecretNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            api_key: settings.api_key,
            secret_api_key: settings.secret_api_key,
            ttl: settings.ttl.unwrap_or(600),
            endpoint: common::static_url("https://porkbun.com/api/json/v3/dns"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.extend(segments);
        }
        url
    }

    async fn post(
        &self,
        client: &reqwest::Client,
        url: Url,
        mut body: serde_json::Value,
    ) -> Result<Envelope, UpdateError> {
        body["apikey"] = self.api_key.clone().into();
        body["secretapikey"] = self.secret_api_key.clone().into();
        let response = with_user_agent(client.post(url)).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let envelope: Envelope = serde_json::from_str(&text)?;
        if envelope.status != "SUCCESS" {
            return Err(UpdateError::Unsuccessful(to_single_line(&text)));
        }
        Ok(envelope)
    }
}

impl fmt::Display for Porkbun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "porkbun", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Porkbun {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let kind = record_type(ip);
        let listing = self
            .post(
                client,
                self.url(&["retrieveByNameType", &self.domain, kind, &self.host]),
                serde_json::json!({}),
            )
            .await
            .map_err(UpdateError::in_list_records)?;

        let content = serde_json::json!({
            "type": kind,
            "content": ip.to_string(),
            "ttl": self.ttl.to_string(),
        });
        match listing.records.into_iter().next() {
            Some(record) if record.content.parse::<IpAddr>() == Ok(ip) => Ok(ip),
            Some(record) => {
                self.post(client, self.url(&["edit", &self.domain, &record.id]), content)
                    .await
                    .map_err(UpdateError::in_update_record)?;
                Ok(ip)
            }
            None => {
                let mut body = content;
                body["name"] = self.host.clone().into();
                self.post(client, self.url(&["create", &self.domain]), body)
                    .await
                    .map_err(UpdateError::in_create_record)?;
                Ok(ip)
            }
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
            provider: "<a href=\"https://porkbun.com\">Porkbun</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
