//! LuaDNS adapter.
//!
//! Basic auth with account email and token. Zone listing resolves the
//! zone id; record names come back fully qualified with a trailing dot.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{with_accept, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    email: String,
    token: String,
}

#[derive(Deserialize)]
struct Zone {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, serde::Serialize)]
struct Record {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    record_type: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    ttl: u32,
}

pub struct LuaDns {
    domain: String,
    host: String,
    ip_version: IpVersion,
    email: String,
    token: String,
    endpoint: Url,
}

impl LuaDns {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.email.is_empty() {
            return Err(ValidationError::EmailNotSet);
        }
        if !settings.email.contains('@') {
            return Err(ValidationError::EmailMalformed);
        }
        if settings.token.is_empty() {
            return Err(ValidationError::TokenNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            email: settings.email,
            token: settings.token,
            endpoint: common::static_url("https://api.luadns.com/v1"),
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        url: Url,
    ) -> Result<T, UpdateError> {
        let request = with_accept(with_user_agent(client.get(url)), "application/json")
            .basic_auth(&self.email, Some(&self.token));
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for LuaDns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "luadns", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for LuaDns {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let zones: Vec<Zone> = self
            .get_json(client, self.url(&["zones"]))
            .await
            .map_err(UpdateError::in_get_zone_id)?;
        let zone = zones
            .into_iter()
            .find(|zone| zone.name == self.domain)
            .ok_or_else(|| UpdateError::ZoneNotFound(self.domain.clone()).in_get_zone_id())?;

        let zone_segment = zone.id.to_string();
        let records: Vec<Record> = self
            .get_json(client, self.url(&["zones", &zone_segment, "records"]))
            .await
            .map_err(UpdateError::in_list_records)?;
        let wanted_name = format!(
            "{}.",
            build_url_query_hostname(&self.host, &self.domain)
        );
        let record = records
            .into_iter()
            .find(|r| r.name == wanted_name && r.record_type == record_type(ip))
            .ok_or_else(|| {
                UpdateError::RecordNotFound(self.build_domain_name()).in_get_record_id()
            })?;

        let updated = Record {
            content: ip.to_string(),
            ..record
        };
        let url = self.url(&["zones", &zone_segment, "records", &updated.id.to_string()]);
        let request = with_accept(with_user_agent(client.put(url)), "application/json")
            .basic_auth(&self.email, Some(&self.token))
            .json(&updated);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text).in_update_record());
        }
        let echoed: Record = serde_json::from_str(&text)?;
        let received = echoed
            .content
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(echoed.content.clone()))?;
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
            provider: "<a href=\"https://www.luadns.com\">LuaDNS</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
