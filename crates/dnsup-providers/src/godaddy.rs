//! GoDaddy adapter: replace the record set with a single PUT under
//! `sso-key` auth.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_sso_key, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

static KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]{8,14}_[A-Za-z0-9]{21,22}$").expect("hardcoded regex")
});

#[derive(Deserialize)]
struct Settings {
    key: String,
    secret: String,
}

pub struct GoDaddy {
    domain: String,
    host: String,
    ip_version: IpVersion,
    key: String,
    secret: String,
    endpoint: Url,
}

impl GoDaddy {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        if !KEY_RE.is_match(&settings.key) {
            return Err(ValidationError::KeyMalformed);
        }
        if settings.secret.is_empty() {
            return Err(ValidationError::SecretNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            key: settings.key,
            secret: settings.secret,
            endpoint: common::static_url("https://api.godaddy.com"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for GoDaddy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "godaddy", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for GoDaddy {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(["v1", "domains", &self.domain, "records"]);
            segments.push(record_type(ip));
            segments.push(&self.host);
        }
        let body = serde_json::json!([{"data": ip.to_string()}]);

        let request = with_sso_key(
            with_user_agent(client.put(url)).json(&body),
            &self.key,
            &self.secret,
        );
        let response = request.send().await?;
        let status = response.status();
        let flat = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &flat).in_update_record());
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
            provider: "<a href=\"https://www.godaddy.com\">GoDaddy</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
