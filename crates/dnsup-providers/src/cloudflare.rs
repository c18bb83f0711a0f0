//! Cloudflare adapter.
//!
//! Listing narrows to one record (`page=1&per_page=1`) against the
//! configured zone; when the listed content already equals the wanted
//! address no write is issued. Three credential shapes are accepted:
//! an API token, a user service key, or the legacy email plus key pair.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_bearer, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("hardcoded regex"));
static USER_SERVICE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v1\.0.+$").expect("hardcoded regex"));

#[derive(Deserialize)]
struct Settings {
    zone_identifier: String,
    ttl: Option<u32>,
    #[serde(default)]
    proxied: bool,
    #[serde(default)]
    token: String,
    #[serde(default)]
    user_service_key: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    key: String,
}

enum Auth {
    Token(String),
    UserServiceKey(String),
    EmailKey { email: String, key: String },
}

#[derive(Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Record {
    id: String,
    content: String,
}

pub struct Cloudflare {
    domain: String,
    host: String,
    ip_version: IpVersion,
    zone_identifier: String,
    ttl: u32,
    proxied: bool,
    auth: Auth,
    endpoint: Url,
}

impl Cloudflare {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        if settings.zone_identifier.is_empty() {
            return Err(ValidationError::ZoneIdentifierNotSet);
        }
        let ttl = settings.ttl.ok_or(ValidationError::TtlNotSet)?;

        let auth = if !settings.token.is_empty() {
            Auth::Token(settings.token)
        } else if !settings.user_service_key.is_empty() {
            if !USER_SERVICE_KEY_RE.is_match(&settings.user_service_key) {
                return Err(ValidationError::UserServiceKeyMalformed);
            }
            Auth::UserServiceKey(settings.user_service_key)
        } else if !settings.email.is_empty() && !settings.key.is_empty() {
            if !KEY_RE.is_match(&settings.key) {
                return Err(ValidationError::KeyMalformed);
            }
            Auth::EmailKey {
                email: settings.email,
                key: settings.key,
            }
        } else {
            return Err(ValidationError::CredentialsNotSet);
        };

        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            zone_identifier: settings.zone_identifier,
            ttl,
            proxied: settings.proxied,
            auth,
            endpoint: common::static_url("https://api.cloudflare.com/client/v4"),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Token(token) => with_bearer(builder, token),
            Auth::UserServiceKey(key) => builder.header("X-Auth-User-Service-Key", key),
            Auth::EmailKey { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    fn records_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(["zones", &self.zone_identifier, "dns_records"]);
        }
        url
    }

    async fn parse(&self, response: reqwest::Response) -> Result<ApiResponse, UpdateError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let parsed: ApiResponse = serde_json::from_str(&text)?;
        if !parsed.success {
            let messages: Vec<String> = parsed
                .errors
                .iter()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .collect();
            return Err(UpdateError::Unsuccessful(to_single_line(
                &messages.join("; "),
            )));
        }
        Ok(parsed)
    }

    /// List the record, returning its id and currently served content.
    async fn find_record(
        &self,
        client: &reqwest::Client,
        ip: IpAddr,
    ) -> Result<Record, UpdateError> {
        let mut url = self.records_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", record_type(ip));
            query.append_pair("name", &build_url_query_hostname(&self.host, &self.domain));
            query.append_pair("page", "1");
            query.append_pair("per_page", "1");
        }

        let request = self.authorize(with_user_agent(client.get(url)));
        let response = request.send().await?;
        let parsed = self.parse(response).await?;
        let records: Vec<Record> = serde_json::from_value(parsed.result)?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| UpdateError::RecordNotFound(self.build_domain_name()))
    }
}

impl fmt::Display for Cloudflare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "cloudflare", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Cloudflare {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let record = self
            .find_record(client, ip)
            .await
            .map_err(UpdateError::in_list_records)?;

        // Fast path: the zone already serves the wanted address.
        if record.content.parse::<IpAddr>() == Ok(ip) {
            return Ok(ip);
        }

        let mut url = self.records_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&record.id);
        }
        let body = serde_json::json!({
            "type": record_type(ip),
            "name": build_url_query_hostname(&self.host, &self.domain),
            "content": ip.to_string(),
            "ttl": self.ttl,
            "proxied": self.proxied,
        });

        let request = self.authorize(with_user_agent(client.put(url))).json(&body);
        let response = request.send().await?;
        let parsed = self
            .parse(response)
            .await
            .map_err(UpdateError::in_update_record)?;
        let updated: Record =
            serde_json::from_value(parsed.result).map_err(UpdateError::from)?;
        let received = updated
            .content
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(updated.content.clone()))?;
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

    fn proxied(&self) -> bool {
        self.proxied
    }

    fn html(&self) -> HtmlRow {
        HtmlRow {
            domain: html_domain_anchor(&self.domain),
            host: self.host.clone(),
            provider: "<a href=\"https://www.cloudflare.com\">Cloudflare</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(extra: serde_json::Value) -> RecordConfig {
        let mut base = serde_json::json!({
            "provider": "cloudflare",
            "domain": "example.com",
            "host": "www",
            "ip_version": "ipv4",
            "zone_identifier": "zone123",
            "ttl": 300,
        });
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    fn token_config() -> RecordConfig {
        config(serde_json::json!({"token": "cftoken"}))
    }

    #[test]
    fn validation_of_credential_shapes() {
        assert!(Cloudflare::new(&token_config()).is_ok());
        assert!(Cloudflare::new(&config(
            serde_json::json!({"user_service_key": "v1.0-abcdef"})
        ))
        .is_ok());
        assert!(matches!(
            Cloudflare::new(&config(serde_json::json!({"user_service_key": "abcdef"}))),
            Err(ValidationError::UserServiceKeyMalformed),
        ));
        assert!(Cloudflare::new(&config(
            serde_json::json!({"email": "a@b.c", "key": "abc123"})
        ))
        .is_ok());
        assert!(matches!(
            Cloudflare::new(&config(serde_json::json!({"email": "a@b.c", "key": "no spaces!"}))),
            Err(ValidationError::KeyMalformed),
        ));
        assert!(matches!(
            Cloudflare::new(&config(serde_json::json!({}))),
            Err(ValidationError::CredentialsNotSet),
        ));
    }

    #[test]
    fn requires_zone_and_ttl() {
        let cfg: RecordConfig = serde_json::from_value(serde_json::json!({
            "provider": "cloudflare",
            "domain": "example.com",
            "zone_identifier": "",
            "ttl": 300,
            "token": "t",
        }))
        .unwrap();
        assert!(matches!(
            Cloudflare::new(&cfg),
            Err(ValidationError::ZoneIdentifierNotSet),
        ));

        let cfg: RecordConfig = serde_json::from_value(serde_json::json!({
            "provider": "cloudflare",
            "domain": "example.com",
            "zone_identifier": "zone123",
            "token": "t",
        }))
        .unwrap();
        assert!(matches!(Cloudflare::new(&cfg), Err(ValidationError::TtlNotSet)));
    }

    fn list_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "errors": [],
            "result": [{"id": "rec1", "content": content}],
        })
    }

    #[tokio::test]
    async fn up_to_date_record_skips_the_put() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone123/dns_records"))
            .and(query_param("type", "A"))
            .and(query_param("name", "www.example.com"))
            .and(header("Authorization", "Bearer cftoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body("203.0.113.4")))
            .expect(1)
            .mount(&server)
            .await;
        // no PUT mock mounted: a write would fail the test

        let adapter = Cloudflare::new(&token_config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn stale_record_is_put_and_echo_checked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone123/dns_records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body("198.51.100.9")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone123/dns_records/rec1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": {"id": "rec1", "content": "203.0.113.4"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Cloudflare::new(&token_config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn empty_listing_is_record_not_found_in_list_phase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": [],
            })))
            .mount(&server)
            .await;

        let adapter = Cloudflare::new(&token_config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::ListRecords(_)));
        assert!(matches!(err.root(), UpdateError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn api_errors_are_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{"code": 9109, "message": "Invalid access token"}],
                "result": null,
            })))
            .mount(&server)
            .await;

        let adapter = Cloudflare::new(&token_config())
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid access token"));
        assert!(err.to_string().contains("9109"));
    }

    #[tokio::test]
    async fn legacy_email_key_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Auth-Email", "a@b.c"))
            .and(header("X-Auth-Key", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body("203.0.113.4")))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Cloudflare::new(&config(
            serde_json::json!({"email": "a@b.c", "key": "abc123"}),
        ))
        .unwrap()
        .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        adapter.update(&reqwest::Client::new(), ip).await.unwrap();
    }
}
