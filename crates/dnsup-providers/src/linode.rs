//! Linode adapter.
//!
//! Listing endpoints filter through the `X-Filter` header. The flow is
//! domain id, record id, then create or update; the echoed `target` is
//! verified.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{with_bearer, with_user_agent, with_x_filter};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    token: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Domain {
    id: u64,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct Record {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    record_type: String,
    #[serde(default)]
    target: String,
}

pub struct Linode {
    domain: String,
    host: String,
    ip_version: IpVersion,
    token: String,
    endpoint: Url,
}

impl Linode {
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
            endpoint: common::static_url("https://api.linode.com/v4"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.extend(segments);
        }
        url
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UpdateError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn domain_id(&self, client: &reqwest::Client) -> Result<u64, UpdateError> {
        let filter = serde_json::json!({"domain": self.domain}).to_string();
        let request = with_x_filter(
            with_bearer(with_user_agent(client.get(self.url(&["domains"]))), &self.token),
            &filter,
        );
        let page: Page<Domain> = Self::read_json(request.send().await?).await?;
        let domain = page
            .data
            .into_iter()
            .next()
            .ok_or_else(|| UpdateError::DomainIdNotFound(self.domain.clone()))?;
        if domain.status != "active" && !domain.status.is_empty() {
            return Err(UpdateError::DomainDisabled(self.domain.clone()));
        }
        Ok(domain.id)
    }

    async fn find_record(
        &self,
        client: &reqwest::Client,
        domain_id: u64,
        ip: IpAddr,
    ) -> Result<Option<Record>, UpdateError> {
        let url = self.url(&["domains", &domain_id.to_string(), "records"]);
        let request = with_bearer(with_user_agent(client.get(url)), &self.token);
        let page: Page<Record> = Self::read_json(request.send().await?).await?;
        let name = if self.host == "@" { "" } else { self.host.as_str() };
        Ok(page
            .data
            .into_iter()
            .find(|r| r.name == name && r.record_type == record_type(ip)))
    }
}

impl fmt::Display for Linode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "linode", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Linode {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let domain_id = self
            .domain_id(client)
            .await
            .map_err(UpdateError::in_get_zone_id)?;
        let existing = self
            .find_record(client, domain_id, ip)
            .await
            .map_err(UpdateError::in_list_records)?;

        let name = if self.host == "@" { "" } else { self.host.as_str() };
        let domain_segment = domain_id.to_string();
        let record: Record = match existing {
            None => {
                let body = serde_json::json!({
                    "type": record_type(ip),
                    "name": name,
                    "target": ip.to_string(),
                });
                let url = self.url(&["domains", &domain_segment, "records"]);
                let request = with_bearer(with_user_agent(client.post(url)), &self.token)
                    .json(&body);
                Self::read_json(request.send().await?)
                    .await
                    .map_err(UpdateError::in_create_record)?
            }
            Some(existing) if existing.target.parse::<IpAddr>() == Ok(ip) => {
                return Ok(ip);
            }
            Some(existing) => {
                let body = serde_json::json!({"target": ip.to_string()});
                let url = self.url(&[
                    "domains",
                    &domain_segment,
                    "records",
                    &existing.id.to_string(),
                ]);
                let request = with_bearer(with_user_agent(client.put(url)), &self.token)
                    .json(&body);
                Self::read_json(request.send().await?)
                    .await
                    .map_err(UpdateError::in_update_record)?
            }
        };

        let received = record
            .target
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(record.target.clone()))?;
        common::verify_echo(ip, received)
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
            provider: "<a href=\"https://www.linode.com\">Linode</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "linode",
            "domain": "example.com",
            "host": "www",
            "ip_version": "ipv4",
            "token": "linodetoken",
        }))
        .unwrap()
    }

    fn adapter(server: &MockServer) -> Linode {
        Linode::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap())
    }

    async fn mount_domains(server: &MockServer, status: &str) {
        Mock::given(method("GET"))
            .and(path("/domains"))
            .and(header("X-Filter", "{\"domain\":\"example.com\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 11, "status": status}],
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn creates_the_record_when_absent() {
        let server = MockServer::start().await;
        mount_domains(&server, "active").await;
        Mock::given(method("GET"))
            .and(path("/domains/11/records"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/domains/11/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7, "name": "www", "type": "A", "target": "203.0.113.4",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter(&server)
                .update(&reqwest::Client::new(), ip)
                .await
                .unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn updates_the_record_when_stale() {
        let server = MockServer::start().await;
        mount_domains(&server, "active").await;
        Mock::given(method("GET"))
            .and(path("/domains/11/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 7, "name": "www", "type": "A", "target": "198.51.100.9"}],
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/domains/11/records/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7, "name": "www", "type": "A", "target": "203.0.113.4",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter(&server)
                .update(&reqwest::Client::new(), ip)
                .await
                .unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn disabled_domain_is_refused() {
        let server = MockServer::start().await;
        mount_domains(&server, "disabled").await;

        let err = adapter(&server)
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err.root(), UpdateError::DomainDisabled(_)));
    }
}
