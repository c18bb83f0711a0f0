//! Njalla adapter.
//!
//! GET against `https://njal.la/update` answering JSON; the served
//! addresses come back under `value.A` / `value.AAAA`.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    key: String,
    #[serde(default)]
    provider_ip: bool,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Deserialize)]
struct Value {
    #[serde(rename = "A")]
    a: Option<String>,
    #[serde(rename = "AAAA")]
    aaaa: Option<String>,
}

pub struct Njalla {
    domain: String,
    host: String,
    ip_version: IpVersion,
    key: String,
    provider_ip: bool,
    endpoint: Url,
}

impl Njalla {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            key: settings.key,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://njal.la/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Njalla {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "njalla", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Njalla {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("h", &build_url_query_hostname(&self.host, &self.domain));
            query.append_pair("k", &self.key);
            if self.provider_ip {
                query.append_pair("auto", "");
            } else {
                let param = if ip.is_ipv4() { "a" } else { "aaaa" };
                query.append_pair(param, &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UpdateError::Auth(to_single_line(&text)));
        }
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }

        let parsed: Response = serde_json::from_str(&text)?;
        if !parsed.message.contains("record updated") {
            return Err(UpdateError::Unsuccessful(to_single_line(&text)));
        }
        let echoed = parsed.value.and_then(|value| {
            let raw = if ip.is_ipv4() { value.a } else { value.aaaa };
            raw.and_then(|raw| raw.parse::<IpAddr>().ok())
        });
        match echoed {
            Some(received) if self.provider_ip => Ok(received),
            Some(received) => common::verify_echo(ip, received),
            None => Ok(ip),
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
            provider: "<a href=\"https://njal.la\">Njalla</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "njalla",
            "domain": "example.com",
            "host": "www",
            "key": "njallakey",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn parses_value_a_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("h", "www.example.com"))
            .and(query_param("k", "njallakey"))
            .and(query_param("a", "203.0.113.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "record updated",
                "value": {"A": "203.0.113.4"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Njalla::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn http_401_is_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let adapter = Njalla::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Auth(_)));
    }
}
