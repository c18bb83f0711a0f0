//! Dreamhost adapter.
//!
//! The API has no record rewrite, so the flow is list, add the new
//! value, then remove the stale one. Every call carries a fresh random
//! `unique_id` (hex-encoded so it is always URL-safe) and `format=json`.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{16}$").expect("hardcoded regex"));

#[derive(Deserialize)]
struct Settings {
    key: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct ListedRecord {
    #[serde(default)]
    record: String,
    #[serde(default, rename = "type")]
    record_type: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    editable: String,
}

pub struct Dreamhost {
    domain: String,
    host: String,
    ip_version: IpVersion,
    key: String,
    endpoint: Url,
}

impl Dreamhost {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        if !KEY_RE.is_match(&settings.key) {
            return Err(ValidationError::KeyMalformed);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            key: settings.key,
            endpoint: common::static_url("https://api.dreamhost.com"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn unique_id() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    async fn call(
        &self,
        client: &reqwest::Client,
        cmd: &str,
        extra: &[(&str, &str)],
    ) -> Result<ApiResponse, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &self.key);
            query.append_pair("unique_id", &Self::unique_id());
            query.append_pair("format", "json");
            query.append_pair("cmd", cmd);
            for (name, value) in extra {
                query.append_pair(name, value);
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let parsed: ApiResponse = serde_json::from_str(&text)?;
        if parsed.result != "success" {
            return Err(UpdateError::Unsuccessful(to_single_line(&text)));
        }
        Ok(parsed)
    }
}

impl fmt::Display for Dreamhost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "dreamhost", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Dreamhost {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let record_name = build_url_query_hostname(&self.host, &self.domain);
        let record_kind = record_type(ip);

        let listing = self
            .call(client, "dns-list_records", &[])
            .await
            .map_err(UpdateError::in_list_records)?;
        let records: Vec<ListedRecord> =
            serde_json::from_value(listing.data).map_err(UpdateError::from)?;
        let existing = records
            .into_iter()
            .find(|r| r.record == record_name && r.record_type == record_kind);

        if let Some(existing) = &existing {
            if existing.value.parse::<IpAddr>() == Ok(ip) {
                return Ok(ip);
            }
            if existing.editable == "0" {
                return Err(UpdateError::RecordNotEditable(record_name));
            }
        }

        let ip_text = ip.to_string();
        self.call(
            client,
            "dns-add_record",
            &[
                ("record", &record_name),
                ("type", record_kind),
                ("value", &ip_text),
            ],
        )
        .await
        .map_err(UpdateError::in_create_record)?;

        if let Some(existing) = existing {
            self.call(
                client,
                "dns-remove_record",
                &[
                    ("record", &record_name),
                    ("type", record_kind),
                    ("value", &existing.value),
                ],
            )
            .await
            .map_err(UpdateError::in_remove_record)?;
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
            provider: "<a href=\"https://www.dreamhost.com\">Dreamhost</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
