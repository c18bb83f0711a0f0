//! FreeDNS (freedns.afraid.org) adapter.
//!
//! The token is a path segment, not a query parameter, and the answer
//! is prose: `Updated ...` on change, `... has not changed` otherwise.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    token: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct FreeDns {
    domain: String,
    host: String,
    ip_version: IpVersion,
    token: String,
    provider_ip: bool,
    endpoint: Url,
}

impl FreeDns {
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
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://freedns.afraid.org/dynamic/update.php"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for FreeDns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "freedns", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for FreeDns {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| UpdateError::BadRequest("endpoint cannot be a base".to_string()))?
            .push(&self.token);
        if !self.provider_ip {
            url.query_pairs_mut()
                .append_pair("address", &ip.to_string());
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }

        if body.starts_with("Updated") || body.contains("has not changed") {
            common::resolve_echo_required(ip, &body, self.provider_ip)
        } else {
            Err(UpdateError::Unsuccessful(body))
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
            provider: "<a href=\"https://freedns.afraid.org\">FreeDNS</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "freedns",
            "domain": "example.mooo.com",
            "token": "abc123tok",
        }))
        .unwrap()
    }

    #[test]
    fn requires_token() {
        let mut cfg = config();
        cfg.settings.insert("token".into(), "".into());
        assert!(matches!(
            FreeDns::new(&cfg),
            Err(ValidationError::TokenNotSet),
        ));
    }

    #[tokio::test]
    async fn token_rides_in_the_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dynamic/update.php/abc123tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Updated example.mooo.com to 203.0.113.4"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let adapter = FreeDns::new(&config()).unwrap().with_endpoint(
            Url::parse(&format!("{}/dynamic/update.php", server.uri())).unwrap(),
        );
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn error_prose_is_unsuccessful() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ERROR: Unable to locate this record"),
            )
            .mount(&server)
            .await;

        let adapter = FreeDns::new(&config()).unwrap().with_endpoint(
            Url::parse(&format!("{}/dynamic/update.php", server.uri())).unwrap(),
        );
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Unsuccessful(_)));
    }
}
