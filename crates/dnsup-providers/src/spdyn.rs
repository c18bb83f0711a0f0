//! Spdyn (spdyn.de) adapter.
//!
//! Two credential shapes: a per-host token (basic auth hostname/token)
//! or a regular user and password pair.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{body_single_line, to_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

// Magic value telling the upstream to use the address it sees.
const PROVIDER_IP_SENTINEL: &str = "10.0.0.1";

#[derive(Deserialize)]
struct Settings {
    #[serde(default)]
    token: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    provider_ip: bool,
}

enum Credentials {
    Token(String),
    UserPassword { user: String, password: String },
}

pub struct Spdyn {
    domain: String,
    host: String,
    ip_version: IpVersion,
    credentials: Credentials,
    provider_ip: bool,
    endpoint: Url,
}

impl Spdyn {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        let credentials = if !settings.token.is_empty() {
            Credentials::Token(settings.token)
        } else {
            if settings.user.is_empty() {
                return Err(ValidationError::UsernameNotSet);
            }
            if settings.password.is_empty() {
                return Err(ValidationError::PasswordNotSet);
            }
            Credentials::UserPassword {
                user: settings.user,
                password: settings.password,
            }
        };
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            credentials,
            provider_ip: settings.provider_ip,
            endpoint: common::static_url("https://update.spdyn.de/nic/update"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Display for Spdyn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "spdyn", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Spdyn {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let hostname = build_url_query_hostname(&self.host, &self.domain);
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("hostname", &hostname);
            if self.provider_ip {
                query.append_pair("myip", PROVIDER_IP_SENTINEL);
            } else {
                query.append_pair("myip", &ip.to_string());
            }
        }

        let request = match &self.credentials {
            Credentials::Token(token) => client.get(url).basic_auth(&hostname, Some(token)),
            Credentials::UserPassword { user, password } => {
                client.get(url).basic_auth(user, Some(password))
            }
        };
        let response = with_user_agent(request).send().await?;
        let status = response.status();
        let body = body_single_line(response).await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &body));
        }

        if body.starts_with("!yours") {
            return Err(UpdateError::HostnameNotExists(to_single_line(&body)));
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
            provider: "<a href=\"https://spdyn.de\">Spdyn</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "spdyn",
            "domain": "spdyn.de",
            "host": "myhost",
            "token": "tok",
        }))
        .unwrap()
    }

    #[test]
    fn user_password_required_without_token() {
        let cfg: RecordConfig = serde_json::from_value(serde_json::json!({
            "provider": "spdyn",
            "domain": "spdyn.de",
            "host": "myhost",
            "user": "u",
        }))
        .unwrap();
        assert!(matches!(
            Spdyn::new(&cfg),
            Err(ValidationError::PasswordNotSet),
        ));
    }

    #[tokio::test]
    async fn provider_ip_mode_sends_the_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("myip", "10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("good 198.51.100.7"))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = token_config();
        cfg.settings.insert("provider_ip".into(), true.into());
        let adapter = Spdyn::new(&cfg)
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());

        let got = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(got, "198.51.100.7".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn yours_token_is_hostname_not_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("!yours"))
            .mount(&server)
            .await;

        let adapter = Spdyn::new(&token_config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::HostnameNotExists(_)));
    }
}
