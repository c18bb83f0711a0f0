//! DigitalOcean adapter: list the record by name and type, then PUT
//! the new data and verify the echo.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{with_bearer, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    domain_records: Vec<DomainRecord>,
}

#[derive(Deserialize)]
struct UpdateResponse {
    domain_record: DomainRecord,
}

#[derive(Deserialize)]
struct DomainRecord {
    id: u64,
    #[serde(default)]
    data: String,
}

pub struct DigitalOcean {
    domain: String,
    host: String,
    ip_version: IpVersion,
    token: String,
    endpoint: Url,
}

impl DigitalOcean {
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
            endpoint: common::static_url("https://api.digitalocean.com"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn records_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(["v2", "domains", &self.domain, "records"]);
        }
        url
    }

    async fn find_record_id(
        &self,
        client: &reqwest::Client,
        ip: IpAddr,
    ) -> Result<u64, UpdateError> {
        let mut url = self.records_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", &build_url_query_hostname(&self.host, &self.domain));
            query.append_pair("type", record_type(ip));
        }

        let response = with_bearer(with_user_agent(client.get(url)), &self.token)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let parsed: ListResponse = serde_json::from_str(&text)?;
        parsed
            .domain_records
            .first()
            .map(|record| record.id)
            .ok_or_else(|| UpdateError::RecordNotFound(self.build_domain_name()))
    }
}

impl fmt::Display for DigitalOcean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(
            f,
            "digitalocean",
            &self.domain,
            &self.host,
            self.ip_version,
        )
    }
}

#[async_trait]
impl Updater for DigitalOcean {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let record_id = self
            .find_record_id(client, ip)
            .await
            .map_err(UpdateError::in_get_record_id)?;

        let mut url = self.records_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&record_id.to_string());
        }
        let body = serde_json::json!({
            "type": record_type(ip),
            "name": build_url_query_hostname(&self.host, &self.domain),
            "data": ip.to_string(),
        });

        let response = with_bearer(with_user_agent(client.put(url)), &self.token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text).in_update_record());
        }
        let parsed: UpdateResponse =
            serde_json::from_str(&text).map_err(UpdateError::from)?;
        let received = parsed
            .domain_record
            .data
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(parsed.domain_record.data.clone()))?;
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
            provider: "<a href=\"https://www.digitalocean.com\">DigitalOcean</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "digitalocean",
            "domain": "example.com",
            "host": "www",
            "ip_version": "ipv4",
            "token": "dotoken",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn finds_then_puts_then_verifies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com/records"))
            .and(query_param("name", "www.example.com"))
            .and(query_param("type", "A"))
            .and(header("Authorization", "Bearer dotoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "domain_records": [{"id": 42, "data": "198.51.100.9"}],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/domains/example.com/records/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "domain_record": {"id": 42, "data": "203.0.113.4"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = DigitalOcean::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn missing_record_is_wrapped_in_get_record_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"domain_records": []})),
            )
            .mount(&server)
            .await;

        let adapter = DigitalOcean::new(&config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::GetRecordId(_)));
        assert!(matches!(err.root(), UpdateError::RecordNotFound(_)));
    }
}
