//! Netcup CCP adapter.
//!
//! Single JSON-RPC style endpoint. Each update logs in for a session
//! id, reads the zone records, then writes back the changed record.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    customer_number: String,
    api_key: String,
    password: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default, rename = "longmessage")]
    long_message: String,
    #[serde(default, rename = "responsedata")]
    response_data: serde_json::Value,
}

#[derive(Deserialize)]
struct LoginData {
    #[serde(default, rename = "apisessionid")]
    session_id: String,
}

#[derive(Deserialize)]
struct RecordSet {
    #[serde(default, rename = "dnsrecords")]
    records: Vec<DnsRecord>,
}

#[derive(Deserialize, Serialize, Clone, Default)]
struct DnsRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    hostname: String,
    #[serde(default, rename = "type")]
    record_type: String,
    #[serde(default)]
    destination: String,
}

pub struct Netcup {
    domain: String,
    host: String,
    ip_version: IpVersion,
    customer_number: String,
    api_key: String,
    password: String,
    endpoint: Url,
}

impl Netcup {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        if cfg.host == "*" {
            return Err(ValidationError::HostWildcardNotAllowed);
        }
        let settings: Settings = cfg.settings_as()?;
        if settings.customer_number.is_empty() {
            return Err(ValidationError::CustomerNumberNotSet);
        }
        if settings.api_key.is_empty() {
            return Err(ValidationError::KeyNotSet);
        }
        if settings.password.is_empty() {
            return Err(ValidationError::PasswordNotSet);
        }
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            customer_number: settings.customer_number,
            api_key: settings.api_key,
            password: settings.password,
            endpoint: common::static_url(
                "https://ccp.netcup.net/run/webservice/servers/endpoint.php?JSON",
            ),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn call(
        &self,
        client: &reqwest::Client,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, UpdateError> {
        let body = serde_json::json!({"action": action, "param": params});
        let request = with_user_agent(client.post(self.endpoint.clone())).json(&body);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let envelope: Envelope = serde_json::from_str(&text)?;
        if envelope.status != "success" {
            return Err(UpdateError::Unsuccessful(to_single_line(
                &envelope.long_message,
            )));
        }
        Ok(envelope.response_data)
    }

    async fn login(&self, client: &reqwest::Client) -> Result<String, UpdateError> {
        let data = self
            .call(
                client,
                "login",
                serde_json::json!({
                    "customernumber": self.customer_number,
                    "apikey": self.api_key,
                    "apipassword": self.password,
                }),
            )
            .await?;
        let login: LoginData = serde_json::from_value(data)?;
        if login.session_id.is_empty() {
            return Err(UpdateError::SessionEmpty);
        }
        Ok(login.session_id)
    }
}

impl fmt::Display for Netcup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "netcup", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Netcup {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let session_id = self.login(client).await?;
        let session = serde_json::json!({
            "customernumber": self.customer_number,
            "apikey": self.api_key,
            "apisessionid": session_id,
            "domainname": self.domain,
        });

        let data = self
            .call(client, "infoDnsRecords", session.clone())
            .await
            .map_err(UpdateError::in_list_records)?;
        let set: RecordSet = serde_json::from_value(data)?;
        let existing = set
            .records
            .into_iter()
            .find(|r| r.hostname == self.host && r.record_type == record_type(ip));

        if let Some(existing) = &existing {
            if existing.destination.parse::<IpAddr>() == Ok(ip) {
                return Ok(ip);
            }
        }

        let record = DnsRecord {
            hostname: self.host.clone(),
            record_type: record_type(ip).to_string(),
            destination: ip.to_string(),
            ..existing.unwrap_or_default()
        };
        let mut update_params = session;
        update_params["dnsrecordset"] = serde_json::json!({"dnsrecords": [record]});
        let data = self
            .call(client, "updateDnsRecords", update_params)
            .await
            .map_err(UpdateError::in_update_record)?;

        let set: RecordSet = serde_json::from_value(data)?;
        let echoed = set
            .records
            .into_iter()
            .find(|r| r.hostname == self.host && r.record_type == record_type(ip))
            .ok_or_else(|| UpdateError::RecordNotFound(self.build_domain_name()))?;
        let received = echoed
            .destination
            .parse::<IpAddr>()
            .map_err(|_| UpdateError::IpReceivedMalformed(echoed.destination.clone()))?;
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
            provider: "<a href=\"https://www.netcup.eu\">Netcup</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(host: &str) -> RecordConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "netcup",
            "domain": "example.com",
            "host": host,
            "ip_version": "ipv4",
            "customer_number": "123456",
            "api_key": "apikey",
            "password": "apipassword",
        }))
        .unwrap()
    }

    #[test]
    fn wildcard_host_is_refused() {
        assert!(matches!(
            Netcup::new(&config("*")),
            Err(ValidationError::HostWildcardNotAllowed),
        ));
    }

    fn envelope(data: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"status": "success", "longmessage": "", "responsedata": data})
    }

    #[tokio::test]
    async fn logs_in_reads_and_writes_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"action": "login"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                serde_json::json!({"apisessionid": "session9"}),
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "action": "infoDnsRecords",
                "param": {"apisessionid": "session9"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                serde_json::json!({"dnsrecords": [
                    {"id": "4", "hostname": "www", "type": "A",
                     "destination": "198.51.100.9"},
                ]}),
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "action": "updateDnsRecords",
                "param": {"dnsrecordset": {"dnsrecords": [
                    {"id": "4", "hostname": "www", "type": "A",
                     "destination": "203.0.113.4"},
                ]}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                serde_json::json!({"dnsrecords": [
                    {"id": "4", "hostname": "www", "type": "A",
                     "destination": "203.0.113.4"},
                ]}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = Netcup::new(&config("www"))
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let ip: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(
            adapter.update(&reqwest::Client::new(), ip).await.unwrap(),
            ip
        );
    }

    #[tokio::test]
    async fn empty_session_id_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                serde_json::json!({"apisessionid": ""}),
            )))
            .mount(&server)
            .await;

        let adapter = Netcup::new(&config("www"))
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::SessionEmpty));
    }

    #[tokio::test]
    async fn failed_login_surfaces_the_long_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "longmessage": "Validation of session failed",
                "responsedata": "",
            })))
            .mount(&server)
            .await;

        let adapter = Netcup::new(&config("www"))
            .unwrap()
            .with_endpoint(Url::parse(&server.uri()).unwrap());
        let err = adapter
            .update(&reqwest::Client::new(), "203.0.113.4".parse().unwrap())
            .await
            .unwrap_err();
        match err {
            UpdateError::Unsuccessful(message) => {
                assert!(message.contains("Validation of session failed"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
