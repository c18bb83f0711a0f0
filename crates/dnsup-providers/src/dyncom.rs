//! Dyn (dyn.com) adapter, dyndns v2 dialect with basic auth.

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
    client_key: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct Dyn {
    domain: String,
    host: String,
    ip_version: IpVersion,
    username: String,
    client_key: String,
    provider_ip: bool,
    endpoint: Url,
}

impl Dyn {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.username.is_empty() {
            return Err(ValidationError::UsernameNotSet);
        }
        if settings.client_key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            username: settings.username,
            client_key: settings.client_key,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://members.dyndns.org/v3/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Dyn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "dyn", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Dyn {
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

        let request = client
            .get(url)
            .basic_auth(&self.username, Some(&self.client_key));
        let response = with_user_agent(request).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }
        common::parse_good_nochg(&body, ip, self.provider_ip)
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
            provider: "<a href=\"https://dyn.com\">Dyn</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "dyn",
            "domain": "dyndns.org",
            "host": "www",
            "username": "user",
            "client_key": "key",
        }))
        .unwrap()
    }

    #[test]
    fn requires_username_and_key() {
        let mut cfg = config();
        cfg.settings.insert("username".into(), "".into());
        assert!(matches!(
            Dyn::new(&cfg),
            Err(ValidationError::UsernameNotSet),
        ));

        let mut cfg = config();
        cfg.settings.insert("client_key".into(), "".into());
        assert!(matches!(Dyn::new(&cfg), Err(ValidationError::KeyNotSet)));
    }

    #[tokio::test]
    async fn sends_basic_auth_and_parses_good() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/update"))
            .and(query_param("hostname", "www.dyndns.org"))
            .and(query_param("myip", "203.0.113.4"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string("good 203.0.113.4"))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Dyn::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&format!("{}/v3/update", server.uri())).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }
}
