//! Dynu adapter, dyndns v2 dialect with query-string credentials.

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
    group: String,
    #[serde(default)]
    provider_ip: bool,
}

pub struct Dynu {
    domain: String,
    host: String,
    ip_version: IpVersion,
    username: String,
    password: String,
    group: String,
    provider_ip: bool,
    endpoint: Url,
}

impl Dynu {
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
            group: settings.group,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://api.dynu.com/nic/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Dynu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "dynu", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Dynu {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("username", &self.username);
            query.append_pair("password", &self.password);
            query.append_pair(
                "hostname",
                &build_url_query_hostname(&self.host, &self.domain),
            );
            if !self.group.is_empty() {
                query.append_pair("location", &self.group);
            }
            if !self.provider_ip {
                let param = if ip.is_ipv4() { "myip" } else { "myipv6" };
                query.append_pair(param, &ip.to_string());
            }
        }

        let response = with_user_agent(client.get(url)).send().await?;
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
            provider: "<a href=\"https://www.dynu.com\">Dynu</a>".to_string(),
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
            "provider": "dynu",
            "domain": "example.com",
            "host": "@",
            "username": "user",
            "password": "pass",
            "group": "home",
        }))
        .unwrap()
    }

    #[test]
    fn requires_credentials() {
        let mut cfg = config();
        cfg.settings.insert("password".into(), "".into());
        assert!(matches!(
            Dynu::new(&cfg),
            Err(ValidationError::PasswordNotSet),
        ));
    }

    #[tokio::test]
    async fn sends_group_as_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("location", "home"))
            .and(query_param("hostname", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("good"))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Dynu::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }
}
