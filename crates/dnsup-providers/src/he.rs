//! Hurricane Electric (dyn.dns.he.net) adapter.
//!
//! Credentials are the hostname itself plus a per-record password sent
//! as query parameters.

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
    password: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct He {
    domain: String,
    host: String,
    ip_version: IpVersion,
    password: String,
    provider_ip: bool,
    endpoint: Url,
}

impl He {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            password: settings.password,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://dyn.dns.he.net/nic/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for He {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "he", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for He {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let hostname = build_url_query_hostname(&self.host, &self.domain);
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("hostname", &hostname);
            query.append_pair("password", &self.password);
            if !self.provider_ip {
                query.append_pair("myip", &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }
        common::parse_good_nochg_required(&body, ip, self.provider_ip)
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
            provider: "<a href=\"https://dns.he.net\">he.net</a>".to_string(),
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
            "provider": "he",
            "domain": "example.com",
            "host": "@",
            "password": "secret",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn apex_hostname_is_the_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("hostname", "example.com"))
            .and(query_param("password", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("nochg 203.0.113.4"))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = He::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn badauth_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("badauth"))
            .mount(&server)
            .await;

        let adapter = He::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Auth(_)));
    }
}
