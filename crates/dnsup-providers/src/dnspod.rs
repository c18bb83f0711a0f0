//! DNSPod adapter.
//!
//! Form-encoded POSTs; `Record.List` locates the record and its line,
//! `Record.Ddns` rewrites it keeping the line intact. A listing whose
//! value already equals the wanted address short-circuits the write.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::with_user_agent;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<ListedRecord>,
}

#[derive(Deserialize)]
struct ListedRecord {
    id: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    line: String,
    #[serde(default, rename = "type")]
    record_type: String,
}

#[derive(Deserialize)]
struct DdnsResponse {
    record: DdnsRecord,
}

#[derive(Deserialize)]
struct DdnsRecord {
    #[serde(default)]
    value: String,
}

pub struct DnsPod {
    domain: String,
    host: String,
    ip_version: IpVersion,
    token: String,
    endpoint: Url,
}

impl DnsPod {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.token.is_empty() {
            return Err(ValidationError::TokenNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            token: settings.token,
            endpoint: common::static_url("https://dnsapi.cn"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn action_url(&self, action: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(action);
        }
        url
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        action: &str,
        form: &[(&str, &str)],
    ) -> Result<T, UpdateError> {
        let request = with_user_agent(client.post(self.action_url(action))).form(form);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for DnsPod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "dnspod", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for DnsPod {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let record_kind = record_type(ip);
        let listing: ListResponse = self
            .post_form(
                client,
                "Record.List",
                &[
                    ("login_token", &self.token),
                    ("format", "json"),
                    ("domain", &self.domain),
                    ("length", "200"),
                    ("sub_domain", &self.host),
                    ("record_type", record_kind),
                ],
            )
            .await
            .map_err(UpdateError::in_list_records)?;

        let record = listing
            .records
            .into_iter()
            .find(|record| record.record_type == record_kind)
            .ok_or_else(|| {
                UpdateError::RecordNotFound(self.build_domain_name()).in_get_record_id()
            })?;

        if record.value.parse::<IpAddr>() == Ok(ip) {
            return Ok(ip);
        }

        let ip_text = ip.to_string();
        let response: DdnsResponse = self
            .post_form(
                client,
                "Record.Ddns",
                &[
                    ("login_token", &self.token),
                    ("format", "json"),
                    ("domain", &self.domain),
                    ("record_id", &record.id),
                    ("value", &ip_text),
                    ("record_line", &record.line),
                    ("sub_domain", &self.host),
                ],
            )
            .await
            .map_err(UpdateError::in_update_record)?;

        let received = response
            .record
            .value
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(response.record.value.clone()))?;
        common::verify_echo(ip, received)
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
            provider: "<a href=\"https://www.dnspod.cn\">DNSPod</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
