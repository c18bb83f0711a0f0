//! Alibaba Cloud DNS adapter.
//!
//! RPC-style API where every request is signed: parameters are sorted,
//! percent-encoded into a canonical query, and authenticated with
//! HMAC-SHA1 under the access key secret.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use ring::hmac;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::with_user_agent;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    access_key_id: String,
    access_key_secret: String,
}

#[derive(Deserialize)]
struct DescribeResponse {
    #[serde(default, rename = "DomainRecords")]
    domain_records: DomainRecords,
}

#[derive(Deserialize, Default)]
struct DomainRecords {
    #[serde(default, rename = "Record")]
    record: Vec<Record>,
}

#[derive(Deserialize)]
struct Record {
    #[serde(default, rename = "RecordId")]
    record_id: String,
    #[serde(default, rename = "RR")]
    rr: String,
    #[serde(default, rename = "Value")]
    value: String,
}

pub struct Aliyun {
    domain: String,
    host: String,
    ip_version: IpVersion,
    access_key_id: String,
    access_key_secret: String,
    endpoint: Url,
}

/// RFC 3986 unreserved-set percent encoding, uppercase hex digits.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

impl Aliyun {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.access_key_id.is_empty() {
            return Err(ValidationError::AccessKeyIdNotSet);
        }
        if settings.access_key_secret.is_empty() {
            return Err(ValidationError::AccessKeySecretNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            access_key_id: settings.access_key_id,
            access_key_secret: settings.access_key_secret,
            endpoint: common::static_url("https://alidns.aliyuncs.com"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let key = format!("{}&", self.access_key_secret);
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
        BASE64.encode(hmac::sign(&key, string_to_sign.as_bytes()).as_ref())
    }

    fn signed_url(&self, action: &str, extra: &[(&str, &str)]) -> Url {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = {
            let mut bytes = [0u8; 8];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        };
        let mut params: Vec<(&str, &str)> = vec![
            ("AccessKeyId", &self.access_key_id),
            ("Action", action),
            ("Format", "JSON"),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureNonce", &nonce),
            ("SignatureVersion", "1.0"),
            ("Timestamp", &timestamp),
            ("Version", "2015-01-09"),
        ];
        params.extend(extra.iter().copied());
        params.sort_by_key(|(name, _)| *name);

        let canonical = params
            .iter()
            .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let string_to_sign = format!("GET&%2F&{}", percent_encode(&canonical));
        let signature = self.sign(&string_to_sign);

        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in &params {
                query.append_pair(name, value);
            }
            query.append_pair("Signature", &signature);
        }
        url
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        url: Url,
    ) -> Result<T, UpdateError> {
        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for Aliyun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "aliyun", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Aliyun {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let kind = record_type(ip);
        let url = self.signed_url(
            "DescribeDomainRecords",
            &[
                ("DomainName", &self.domain),
                ("RRKeyWord", &self.host),
                ("Type", kind),
            ],
        );
        let listing: DescribeResponse = self
            .call(client, url)
            .await
            .map_err(UpdateError::in_list_records)?;
        let existing = listing
            .domain_records
            .record
            .into_iter()
            .find(|record| record.rr == self.host);

        let ip_text = ip.to_string();
        match existing {
            Some(record) if record.value.parse::<IpAddr>() == Ok(ip) => Ok(ip),
            Some(record) => {
                let url = self.signed_url(
                    "UpdateDomainRecord",
                    &[
                        ("RecordId", &record.record_id),
                        ("RR", &self.host),
                        ("Type", kind),
                        ("Value", &ip_text),
                    ],
                );
                let _: serde_json::Value = self
                    .call(client, url)
                    .await
                    .map_err(UpdateError::in_update_record)?;
                Ok(ip)
            }
            None => {
                let url = self.signed_url(
                    "AddDomainRecord",
                    &[
                        ("DomainName", &self.domain),
                        ("RR", &self.host),
                        ("Type", kind),
                        ("Value", &ip_text),
                    ],
                );
                let _: serde_json::Value = self
                    .call(client, url)
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
            provider: "<a href=\"https://www.alibabacloud.com\">Aliyun</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
