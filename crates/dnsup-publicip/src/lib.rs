// # dnsup-publicip
//
// Observes the machine's public address by asking HTTP echo services.
//
// Three URL rings, one per address family request shape (`ipv4`,
// `ipv6`, `ipv4 or ipv6`). Each fetch walks its ring round-robin,
// skipping services banned earlier in the process lifetime. A 403 or
// 429 answer bans the URL; bans are in-memory only and reset on
// restart.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use dnsup_core::http::{body_single_line, with_user_agent};
use dnsup_core::ipextract::{extract_ipv4, extract_ipv6};
use dnsup_core::{FetchError, IpVersion, PublicIpSource, ValidationError};

mod service;

pub use service::EchoService;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Ring {
    urls: Vec<Url>,
    cursor: AtomicUsize,
}

impl Ring {
    fn new(urls: Vec<Url>) -> Self {
        Self {
            urls,
            cursor: AtomicUsize::new(0),
        }
    }
}

/// Public address fetcher over HTTP echo services.
pub struct Fetcher {
    v4: Ring,
    v6: Ring,
    either: Ring,
    banned: Mutex<HashMap<String, String>>,
    request_timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher from per-family service lists. Every service
    /// must have a URL for the ring it is placed in.
    pub fn new(
        v4: &[EchoService],
        v6: &[EchoService],
        either: &[EchoService],
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            v4: Ring::new(resolve(v4, IpVersion::V4)?),
            v6: Ring::new(resolve(v6, IpVersion::V6)?),
            either: Ring::new(resolve(either, IpVersion::V4OrV6)?),
            banned: Mutex::new(HashMap::new()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Build a fetcher using every built-in service for each family.
    pub fn all_services() -> Self {
        Self::new(
            &EchoService::all(IpVersion::V4),
            &EchoService::all(IpVersion::V6),
            &EchoService::all(IpVersion::V4OrV6),
        )
        .unwrap_or_else(|_| unreachable!("built-in services resolve for their own family"))
    }

    /// Override the per-request timeout (default 5 seconds).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn ring(&self, version: IpVersion) -> &Ring {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
            IpVersion::V4OrV6 => &self.either,
        }
    }

    fn ban(&self, url: &Url, reason: String) {
        warn!(url = %url, %reason, "banning echo service");
        let mut banned = self.banned.lock().unwrap_or_else(|e| e.into_inner());
        banned.insert(url.as_str().to_string(), reason);
    }

    fn ban_reason(&self, url: &Url) -> Option<String> {
        let banned = self.banned.lock().unwrap_or_else(|e| e.into_inner());
        banned.get(url.as_str()).cloned()
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        version: IpVersion,
    ) -> Result<IpAddr, FetchError> {
        let ring = self.ring(version);
        if ring.urls.is_empty() {
            return Err(FetchError::UnsupportedVersion(version));
        }

        for _ in 0..ring.urls.len() {
            let index = ring.cursor.fetch_add(1, Ordering::Relaxed) % ring.urls.len();
            let url = &ring.urls[index];
            if self.ban_reason(url).is_some() {
                continue;
            }

            debug!(url = %url, %version, "fetching public address");
            let request = with_user_agent(client.get(url.clone())).timeout(self.request_timeout);
            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::FORBIDDEN
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            {
                let body = body_single_line(response).await?;
                self.ban(url, format!("HTTP status {}: {body}", status.as_u16()));
                continue;
            }

            if !status.is_success() {
                let body = body_single_line(response).await?;
                return Err(FetchError::BadStatus {
                    url: url.as_str().to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let body = body_single_line(response).await?;
            return parse_body(url.as_str(), &body, version);
        }

        let reasons = {
            let banned = self.banned.lock().unwrap_or_else(|e| e.into_inner());
            let mut entries: Vec<String> = ring
                .urls
                .iter()
                .filter_map(|url| {
                    banned
                        .get(url.as_str())
                        .map(|reason| format!("{url}: {reason}"))
                })
                .collect();
            entries.sort();
            entries.join("; ")
        };
        Err(FetchError::Banned(reasons))
    }
}

fn resolve(services: &[EchoService], version: IpVersion) -> Result<Vec<Url>, ValidationError> {
    services
        .iter()
        .map(|service| {
            service
                .url(version)
                .ok_or_else(|| ValidationError::EchoVersionUnsupported {
                    service: service.name().to_string(),
                    version,
                })
        })
        .collect()
}

fn parse_body(url: &str, body: &str, version: IpVersion) -> Result<IpAddr, FetchError> {
    let mut v4: Vec<IpAddr> = extract_ipv4(body).into_iter().map(IpAddr::V4).collect();
    v4.dedup();
    let mut v6: Vec<IpAddr> = extract_ipv6(body).into_iter().map(IpAddr::V6).collect();
    v6.dedup();

    let exactly_one = |found: Vec<IpAddr>| match found.len() {
        0 => Err(FetchError::NoIpFound {
            url: url.to_string(),
        }),
        1 => Ok(found[0]),
        _ => Err(FetchError::TooManyIps {
            url: url.to_string(),
            found,
        }),
    };

    match version {
        IpVersion::V4 => exactly_one(v4),
        IpVersion::V6 => exactly_one(v6),
        IpVersion::V4OrV6 => {
            if v4.len() == 1 {
                Ok(v4[0])
            } else if v6.len() == 1 {
                Ok(v6[0])
            } else if v4.is_empty() && v6.is_empty() {
                Err(FetchError::NoIpFound {
                    url: url.to_string(),
                })
            } else {
                let mut found = v4;
                found.extend(v6);
                Err(FetchError::TooManyIps {
                    url: url.to_string(),
                    found,
                })
            }
        }
    }
}

#[async_trait]
impl PublicIpSource for Fetcher {
    async fn public_ip(
        &self,
        client: &reqwest::Client,
        version: IpVersion,
    ) -> Result<IpAddr, FetchError> {
        self.fetch(client, version).await
    }
}
