//! Namecheap dynamic DNS adapter.
//!
//! The endpoint answers with an XML `interface-response` document. Only
//! IPv4 is handled upstream, so an `ipv6` record is refused outright.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

static PASSWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{32}$").expect("hardcoded regex"));

#[derive(Deserialize)]
struct Settings {
    password: String,
}

#[derive(Deserialize)]
struct InterfaceResponse {
    #[serde(default, rename = "ErrCount")]
    err_count: u32,
    #[serde(default, rename = "IP")]
    ip: String,
    #[serde(default)]
    errors: Errors,
}

#[derive(Deserialize, Default)]
struct Errors {
    #[serde(default, rename = "Err1")]
    err1: String,
}

pub struct Namecheap {
    domain: String,
    host: String,
    password: String,
    endpoint: Url,
}

impl Namecheap {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        if cfg.ip_version == IpVersion::V6 {
            return Err(ValidationError::Ipv6NotSupported);
        }
        let settings: Settings = cfg.settings_as()?;
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        if !PASSWORD_RE.is_match(&settings.password) {
            return Err(ValidationError::PasswordMalformed);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            password: settings.password,
            endpoint: common::static_url("https://dynamicdns.park-your-domain.com/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Namecheap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "namecheap", &self.domain, &self.host, IpVersion::V4)
    }
}

#[async_trait]
impl Updater for Namecheap {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("host", &self.host);
            query.append_pair("domain", &self.domain);
            query.append_pair("password", &self.password);
            if !ip.is_unspecified() {
                query.append_pair("ip", &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }

        let parsed: InterfaceResponse = quick_xml::de::from_str(&text)
            .map_err(|_| UpdateError::UnknownResponse(to_single_line(&text)))?;
        if parsed.err_count > 0 {
            return Err(UpdateError::Unsuccessful(to_single_line(&parsed.errors.err1)));
        }
        parsed
            .ip
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(parsed.ip.clone()))
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn ip_version(&self) -> IpVersion {
        IpVersion::V4
    }

    fn html(&self) -> HtmlRow {
        HtmlRow {
            domain: html_domain_anchor(&self.domain),
            host: self.host.clone(),
            provider: "<a href=\"https://www.namecheap.com\">Namecheap</a>".to_string(),
            ip_version: IpVersion::V4.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PASSWORD: &str = "0123456789abcdef0123456789abcdef";

    fn config(ip_version: &str, password: &str) -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "namecheap",
            "domain": "example.com",
            "host": "www",
            "ip_version": ip_version,
            "password": password,
        }))
        .unwrap()
    }

    #[test]
    fn ipv6_records_are_refused() {
        assert!(matches!(
            Namecheap::new(&config("ipv6", PASSWORD)),
            Err(ValidationError::Ipv6NotSupported),
        ));
    }

    #[test]
    fn password_must_be_32_hex_chars() {
        assert!(Namecheap::new(&config("ipv4", PASSWORD)).is_ok());
        assert!(matches!(
            Namecheap::new(&config("ipv4", "UPPERCASE0123456789abcdef0123456")),
            Err(ValidationError::PasswordMalformed),
        ));
    }

    #[tokio::test]
    async fn xml_success_returns_the_echoed_ip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("host", "www"))
            .and(query_param("domain", "example.com"))
            .and(query_param("ip", "203.0.113.4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<?xml version=\"1.0\"?><interface-response>\
                 <ErrCount>0</ErrCount><IP>203.0.113.4</IP>\
                 </interface-response>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Namecheap::new(&config("ipv4", PASSWORD))
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn xml_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<?xml version=\"1.0\"?><interface-response>\
                 <ErrCount>1</ErrCount><IP></IP>\
                 <errors><Err1>Domain name not found</Err1></errors>\
                 </interface-response>",
            ))
            .mount(&server)
            .await;

        let adapter = Namecheap::new(&config("ipv4", PASSWORD))
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        match err {
            UpdateError::Unsuccessful(message) => {
                assert!(message.contains("Domain name not found"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
