//! SelfHost.de adapter. The HTTP status carries most of the outcome;
//! 204 means the address did not change.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    username: String,
    password: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct SelfhostDe {
    domain: String,
    host: String,
    ip_version: IpVersion,
    username: String,
    password: String,
    provider_ip: bool,
    endpoint: Url,
}

impl SelfhostDe {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.username.is_empty() {
            return Err(ValidationError::UsernameNotSet);
        }
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            username: settings.username,
            password: settings.password,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://carol.selfhost.de/nic/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for SelfhostDe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "selfhostde", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for SelfhostDe {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "hostname",
                &build_url_query_hostname(&self.host, &self.domain),
            );
            if !self.provider_ip {
                query.append_pair("myip", &ip.to_string());
            }
        }

        let request = client.get(url).basic_auth(&self.username, Some(&self.password));
        let response = with_user_agent(request).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        match status.as_u16() {
            200 => common::parse_good_nochg(&body, ip, self.provider_ip),
            // 204 means the address did not change
            204 => Ok(ip),
            409 => Err(UpdateError::ZoneNotFound(body)),
            410 => Err(UpdateError::AccountInactive(body)),
            411 => Err(UpdateError::MalformedIPSent(ip.to_string())),
            412 => Err(UpdateError::PrivateIPSent(ip.to_string())),
            503 => Err(UpdateError::DnsServerSide(body)),
            _ => Err(common::bad_status(status, &body)),
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
            provider: "<a href=\"https://selfhost.de\">SelfHost.de</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "selfhostde",
            "domain": "example.com",
            "host": "www",
            "username": "user",
            "password": "pass",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn http_204_counts_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let adapter = SelfhostDe::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    async fn update_with_status(status: u16) -> UpdateError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let adapter = SelfhostDe::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn documented_statuses_map_to_their_kinds() {
        assert!(matches!(
            update_with_status(409).await,
            UpdateError::ZoneNotFound(_),
        ));
        assert!(matches!(
            update_with_status(410).await,
            UpdateError::AccountInactive(_),
        ));
        assert!(matches!(
            update_with_status(411).await,
            UpdateError::MalformedIPSent(_),
        ));
        assert!(matches!(
            update_with_status(412).await,
            UpdateError::PrivateIPSent(_),
        ));
        assert!(matches!(
            update_with_status(503).await,
            UpdateError::DnsServerSide(_),
        ));
    }
}
