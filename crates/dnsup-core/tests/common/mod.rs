//! Shared test doubles for the update pipeline contract tests.

use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dnsup_core::traits::{format_updater, html_domain_anchor, HtmlRow};
use dnsup_core::{FetchError, IpVersion, PublicIpSource, UpdateError, Updater};

/// Source whose observed address can be swapped between ticks.
pub struct ScriptedSource {
    current: Mutex<IpAddr>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(initial: IpAddr) -> Self {
        Self {
            current: Mutex::new(initial),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, ip: IpAddr) {
        *self.current.lock().unwrap() = ip;
    }

    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetches)
    }
}

#[async_trait]
impl PublicIpSource for ScriptedSource {
    async fn public_ip(
        &self,
        _client: &reqwest::Client,
        _version: IpVersion,
    ) -> Result<IpAddr, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(*self.current.lock().unwrap())
    }
}

/// Adapter double counting upstream write attempts.
pub struct RecordingUpdater {
    writes: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingUpdater {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            writes: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.writes)
    }
}

impl fmt::Display for RecordingUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_updater(f, "recording", "example.com", "www", IpVersion::V4OrV6)
    }
}

#[async_trait]
impl Updater for RecordingUpdater {
    async fn update(&self, _client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(UpdateError::DnsServerSide("upstream melted".into()))
        } else {
            Ok(ip)
        }
    }

    fn domain(&self) -> &str {
        "example.com"
    }

    fn host(&self) -> &str {
        "www"
    }

    fn ip_version(&self) -> IpVersion {
        IpVersion::V4OrV6
    }

    fn html(&self) -> HtmlRow {
        HtmlRow {
            domain: html_domain_anchor("example.com"),
            host: "www".into(),
            provider: "recording".into(),
            ip_version: IpVersion::V4OrV6.to_string(),
        }
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn v4(s: &str) -> IpAddr {
    s.parse().unwrap()
}
