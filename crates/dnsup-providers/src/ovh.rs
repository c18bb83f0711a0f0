//! OVH adapter.
//!
//! Two modes share the struct: `dynhost` speaks the classic dynamic
//! DNS dialect with basic auth, while API mode signs each zone call
//! with SHA1 over the application secret, consumer key, method, URL,
//! body and a clock-corrected timestamp.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::Utc;
use ring::digest;
use serde::Deserialize;
use url::Url;

use dnsup_core::http::{to_single_line, with_user_agent};
use dnsup_core::names::build_url_query_hostname;
use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{record_type, IpVersion, RecordConfig, UpdateError, Updater, ValidationError};

use crate::common;

#[derive(Deserialize)]
struct Settings {
    #[serde(default)]
    mode: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    api_endpoint: String,
    #[serde(default)]
    app_key: String,
    #[serde(default)]
    app_secret: String,
    #[serde(default)]
    consumer_key: String,
}

enum Mode {
    DynHost {
        username: String,
        password: String,
    },
    Api {
        app_key: String,
        app_secret: String,
        consumer_key: String,
    },
}

pub struct Ovh {
    domain: String,
    host: String,
    ip_version: IpVersion,
    mode: Mode,
    endpoint: Url,
}

fn api_base(name: &str) -> Result<Url, ValidationError> {
    let base = match name {
        "" | "ovh-eu" => "https://eu.api.ovh.com/1.0",
        "ovh-ca" => "https://ca.api.ovh.com/1.0",
        "ovh-us" => "https://api.us.ovhcloud.com/1.0",
        "kimsufi-eu" => "https://eu.api.kimsufi.com/1.0",
        "kimsufi-ca" => "https://ca.api.kimsufi.com/1.0",
        "soyoustart-eu" => "https://eu.api.soyoustart.com/1.0",
        "soyoustart-ca" => "https://ca.api.soyoustart.com/1.0",
        other => return Err(ValidationError::UnknownEndpoint(other.to_string())),
    };
    Ok(common::static_url(base))
}

impl Ovh {
    pub fn new(cfg: &RecordConfig) -> Result<Self, ValidationError> {
        let settings: Settings = cfg.settings_as()?;
        let (mode, endpoint) = if settings.mode == "dynhost" {
            if settings.username.is_empty() {
                return Err(ValidationError::UsernameNotSet);
            }
            if settings.password.is_empty() {
                return Err(ValidationError::PasswordNotSet);
            }
            (
                Mode::DynHost {
                    username: settings.username,
                    password: settings.password,
                },
                common::static_url("https://www.ovh.com/nic/update"),
            )
        } else {
            if settings.app_key.is_empty() {
                return Err(ValidationError::AppKeyNotSet);
            }
            if settings.app_secret.is_empty() {
                return Err(ValidationError::AppSecretNotSet);
            }
            if settings.consumer_key.is_empty() {
                return Err(ValidationError::ConsumerKeyNotSet);
            }
            (
                Mode::Api {
                    app_key: settings.app_key,
                    app_secret: settings.app_secret,
                    consumer_key: settings.consumer_key,
                },
                api_base(&settings.api_endpoint)?,
            )
        };
        Ok(Self {
            domain: cfg.domain.clone(),
            host: cfg.host.clone(),
            ip_version: cfg.ip_version,
            mode,
            endpoint,
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn update_dynhost(
        &self,
        client: &reqwest::Client,
        username: &str,
        password: &str,
        ip: IpAddr,
    ) -> Result<IpAddr, UpdateError> {
        let hostname = build_url_query_hostname(&self.host, &self.domain);
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("system", "dyndns");
            query.append_pair("hostname", &hostname);
            query.append_pair("myip", &ip.to_string());
        }

        let request = with_user_agent(client.get(url)).basic_auth(username, Some(password));
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        common::parse_good_nochg(&text, ip, false)
    }

    /// Clock offset against the API, in seconds.
    async fn server_delta(&self, client: &reqwest::Client) -> Result<i64, UpdateError> {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(["auth", "time"]);
        }
        let response = with_user_agent(client.get(url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(common::bad_status(status, &text));
        }
        let server_time: i64 = text
            .trim()
            .parse()
            .map_err(|_| UpdateError::UnknownResponse(to_single_line(&text)))?;
        Ok(server_time - Utc::now().timestamp())
    }

    fn signature(
        app_secret: &str,
        consumer_key: &str,
        method: &str,
        url: &str,
        body: &str,
        timestamp: i64,
    ) -> String {
        let input =
            format!("{app_secret}+{consumer_key}+{method}+{url}+{body}+{timestamp}");
        let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, input.as_bytes());
        format!("$1${}", hex::encode(hash.as_ref()))
    }

    async fn api_call<T: serde::de::DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        method: reqwest::Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
        delta: i64,
    ) -> Result<T, UpdateError> {
        let (app_key, app_secret, consumer_key) = match &self.mode {
            Mode::Api {
                app_key,
                app_secret,
                consumer_key,
            } => (app_key, app_secret, consumer_key),
            Mode::DynHost { .. } => unreachable!("API calls only happen in API mode"),
        };

        let mut url = self.endpoint.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.extend(segments);
        }
        for (name, value) in query {
            url.query_pairs_mut().append_pair(name, value);
        }

        let body_text = match &body {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        let timestamp = Utc::now().timestamp() + delta;
        let signature = Self::signature(
            app_secret,
            consumer_key,
            method.as_str(),
            url.as_str(),
            &body_text,
            timestamp,
        );

        let mut request = with_user_agent(client.request(method, url))
            .header("X-Ovh-Application", app_key)
            .header("X-Ovh-Consumer", consumer_key)
            .header("X-Ovh-Timestamp", timestamp.to_string())
            .header("X-Ovh-Signature", signature);
        if let Some(value) = body {
            request = request.json(&value);
        }

        let response = request.send().await?;
        let status = response.status();
        let query_id = response
            .headers()
            .get("X-Ovh-Queryid")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;
        if !status.is_success() {
            let mut flat = to_single_line(&text);
            if !query_id.is_empty() {
                flat = format!("{flat} (queryid {query_id})");
            }
            return Err(common::bad_status(status, &flat));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn update_api(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        let delta = self.server_delta(client).await?;
        let sub_domain = if self.host == "@" { "" } else { self.host.as_str() };
        let kind = record_type(ip);

        let ids: Vec<u64> = self
            .api_call(
                client,
                reqwest::Method::GET,
                &["domain", "zone", &self.domain, "record"],
                &[("fieldType", kind), ("subDomain", sub_domain)],
                None,
                delta,
            )
            .await
            .map_err(UpdateError::in_list_records)?;

        if ids.is_empty() {
            let body = serde_json::json!({
                "fieldType": kind,
                "subDomain": sub_domain,
                "target": ip.to_string(),
            });
            let _: serde_json::Value = self
                .api_call(
                    client,
                    reqwest::Method::POST,
                    &["domain", "zone", &self.domain, "record"],
                    &[],
                    Some(body),
                    delta,
                )
                .await
                .map_err(UpdateError::in_create_record)?;
        } else {
            for id in ids {
                let body = serde_json::json!({"target": ip.to_string()});
                let _: serde_json::Value = self
                    .api_call(
                        client,
                        reqwest::Method::PUT,
                        &["domain", "zone", &self.domain, "record", &id.to_string()],
                        &[],
                        Some(body),
                        delta,
                    )
                    .await
                    .map_err(UpdateError::in_update_record)?;
            }
        }

        let _: serde_json::Value = self
            .api_call(
                client,
                reqwest::Method::POST,
                &["domain", "zone", &self.domain, "refresh"],
                &[],
                None,
                delta,
            )
            .await
            .map_err(UpdateError::in_update_record)?;
        Ok(ip)
    }
}

impl fmt::Display for Ovh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "ovh", &self.domain, &self.host, self.ip_version)
    }
}

#[async_trait]
impl Updater for Ovh {
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        match &self.mode {
            Mode::DynHost { username, password } => {
                self.update_dynhost(client, username, password, ip).await
            }
            Mode::Api { .. } => self.update_api(client, ip).await,
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
            provider: "<a href=\"https://www.ovh.com\">OVH</a>".to_string(),
            ip_version: self.ip_version.to_string(),
        }
    }
}
