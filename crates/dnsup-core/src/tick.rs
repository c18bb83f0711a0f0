//! Per-record update tick
//!
//! One tick runs the fixed pipeline fetch, compare, update. It makes at
//! most one upstream write attempt; retry, backoff and scheduling stay
//! with the caller. Outcomes are returned and, when an observer channel
//! is attached, emitted with a lossy `try_send` so a slow observer
//! never stalls the loop.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::traits::{PublicIpSource, Updater};

/// What a tick concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcomeKind {
    /// The provider now serves the new address
    Updated,
    /// The observed address matches the last one pushed, nothing sent
    UpToDate,
    /// The tick failed, with the flattened error message
    Failed(String),
}

/// Outcome of one tick, also sent to the observer channel.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Registered domain of the record
    pub domain: String,
    /// Host label of the record
    pub host: String,
    /// Conclusion of the tick
    pub kind: TickOutcomeKind,
    /// Address involved, when one was observed
    pub ip: Option<IpAddr>,
    /// When the tick concluded
    pub timestamp: DateTime<Utc>,
}

/// Drives one record through its update ticks.
///
/// The adapter is immutable; the only mutable state is the last address
/// successfully pushed upstream, used for the up-to-date fast path.
pub struct RecordTicker {
    updater: Box<dyn Updater>,
    last_observed_ip: Option<IpAddr>,
    events: Option<mpsc::Sender<TickOutcome>>,
}

impl RecordTicker {
    /// Wrap an adapter with no previous address known.
    pub fn new(updater: Box<dyn Updater>) -> Self {
        Self {
            updater,
            last_observed_ip: None,
            events: None,
        }
    }

    /// Attach an outcome observer channel.
    pub fn with_events(mut self, events: mpsc::Sender<TickOutcome>) -> Self {
        self.events = Some(events);
        self
    }

    /// Seed the last pushed address, e.g. from persisted state.
    pub fn with_last_observed_ip(mut self, ip: IpAddr) -> Self {
        self.last_observed_ip = Some(ip);
        self
    }

    /// Last address successfully pushed upstream, if any.
    pub fn last_observed_ip(&self) -> Option<IpAddr> {
        self.last_observed_ip
    }

    /// The wrapped adapter.
    pub fn updater(&self) -> &dyn Updater {
        self.updater.as_ref()
    }

    /// Run one tick: observe the public address, compare it with the
    /// last pushed one, and push it upstream when they differ. The
    /// whole tick is bounded by `deadline`.
    pub async fn tick(
        &mut self,
        client: &reqwest::Client,
        source: &dyn PublicIpSource,
        deadline: Duration,
    ) -> TickOutcome {
        let kind = match tokio::time::timeout(deadline, self.run(client, source)).await {
            Ok(kind) => kind,
            Err(_) => TickOutcomeKind::Failed(format!(
                "deadline of {deadline:?} exceeded",
            )),
        };

        let outcome = TickOutcome {
            domain: self.updater.domain().to_string(),
            host: self.updater.host().to_string(),
            kind,
            ip: self.last_observed_ip,
            timestamp: Utc::now(),
        };
        self.emit(outcome.clone());
        outcome
    }

    async fn run(
        &mut self,
        client: &reqwest::Client,
        source: &dyn PublicIpSource,
    ) -> TickOutcomeKind {
        let version = self.updater.ip_version();

        let ip = match source.public_ip(client, version).await {
            Ok(ip) => ip,
            Err(err) => {
                warn!(domain = %self.updater.domain(), host = %self.updater.host(),
                      "public address fetch failed: {err}");
                return TickOutcomeKind::Failed(err.to_string());
            }
        };

        if !version.matches(ip) {
            return TickOutcomeKind::Failed(format!(
                "observed address {ip} does not belong to family {version}"
            ));
        }

        if self.last_observed_ip == Some(ip) {
            debug!(domain = %self.updater.domain(), host = %self.updater.host(),
                   %ip, "address unchanged");
            return TickOutcomeKind::UpToDate;
        }

        match self.updater.update(client, ip).await {
            Ok(served) => {
                info!(domain = %self.updater.domain(), host = %self.updater.host(),
                      %served, "record updated");
                self.last_observed_ip = Some(served);
                TickOutcomeKind::Updated
            }
            Err(err) => {
                warn!(domain = %self.updater.domain(), host = %self.updater.host(),
                      "update failed: {err}");
                TickOutcomeKind::Failed(err.to_string())
            }
        }
    }

    fn emit(&self, outcome: TickOutcome) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.try_send(outcome) {
            warn!("dropping tick outcome event: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IpVersion;
    use crate::error::{FetchError, UpdateError};
    use crate::traits::{format_updater, html_domain_anchor, HtmlRow};
    use async_trait::async_trait;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedSource(IpAddr);

    #[async_trait]
    impl PublicIpSource for FixedSource {
        async fn public_ip(
            &self,
            _client: &reqwest::Client,
            _version: IpVersion,
        ) -> Result<IpAddr, FetchError> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PublicIpSource for FailingSource {
        async fn public_ip(
            &self,
            _client: &reqwest::Client,
            version: IpVersion,
        ) -> Result<IpAddr, FetchError> {
            Err(FetchError::UnsupportedVersion(version))
        }
    }

    struct CountingUpdater {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingUpdater {
        fn new(fail: bool) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail,
            }
        }

        fn call_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl fmt::Display for CountingUpdater {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            format_updater(f, "test", "example.com", "@", IpVersion::V4)
        }
    }

    #[async_trait]
    impl Updater for CountingUpdater {
        async fn update(
            &self,
            _client: &reqwest::Client,
            ip: IpAddr,
        ) -> Result<IpAddr, UpdateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(UpdateError::Auth("nope".into()))
            } else {
                Ok(ip)
            }
        }

        fn domain(&self) -> &str {
            "example.com"
        }

        fn host(&self) -> &str {
            "@"
        }

        fn ip_version(&self) -> IpVersion {
            IpVersion::V4
        }

        fn html(&self) -> HtmlRow {
            HtmlRow {
                domain: html_domain_anchor("example.com"),
                host: "@".into(),
                provider: "test".into(),
                ip_version: "ipv4".into(),
            }
        }
    }

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn first_tick_updates_second_is_up_to_date() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let mut ticker = RecordTicker::new(Box::new(CountingUpdater::new(false)));
        let source = FixedSource(ip);

        let first = ticker
            .tick(&client(), &source, Duration::from_secs(5))
            .await;
        assert_eq!(first.kind, TickOutcomeKind::Updated);
        assert_eq!(ticker.last_observed_ip(), Some(ip));

        let second = ticker
            .tick(&client(), &source, Duration::from_secs(5))
            .await;
        assert_eq!(second.kind, TickOutcomeKind::UpToDate);
    }

    #[tokio::test]
    async fn up_to_date_makes_no_upstream_call() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let updater = CountingUpdater::new(false);
        let calls = updater.call_counter();
        let mut ticker = RecordTicker::new(Box::new(updater)).with_last_observed_ip(ip);
        let source = FixedSource(ip);

        let outcome = ticker
            .tick(&client(), &source, Duration::from_secs(5))
            .await;
        assert_eq!(outcome.kind, TickOutcomeKind::UpToDate);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_update_keeps_last_observed_ip() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let mut ticker = RecordTicker::new(Box::new(CountingUpdater::new(true)));
        let source = FixedSource(ip);

        let outcome = ticker
            .tick(&client(), &source, Duration::from_secs(5))
            .await;
        assert!(matches!(outcome.kind, TickOutcomeKind::Failed(_)));
        assert_eq!(ticker.last_observed_ip(), None);
    }

    #[tokio::test]
    async fn fetch_failure_skips_update() {
        let updater = CountingUpdater::new(false);
        let calls = updater.call_counter();
        let mut ticker = RecordTicker::new(Box::new(updater));

        let outcome = ticker
            .tick(&client(), &FailingSource, Duration::from_secs(5))
            .await;
        match outcome.kind {
            TickOutcomeKind::Failed(msg) => assert!(msg.contains("no echo service")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_family_is_rejected_before_update() {
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        let updater = CountingUpdater::new(false);
        let mut ticker = RecordTicker::new(Box::new(updater));
        let source = FixedSource(v6);

        let outcome = ticker
            .tick(&client(), &source, Duration::from_secs(5))
            .await;
        match outcome.kind {
            TickOutcomeKind::Failed(msg) => assert!(msg.contains("family")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn outcomes_are_emitted_to_observer() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let mut ticker = RecordTicker::new(Box::new(CountingUpdater::new(false))).with_events(tx);

        ticker
            .tick(&client(), &FixedSource(ip), Duration::from_secs(5))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TickOutcomeKind::Updated);
        assert_eq!(event.ip, Some(ip));
        assert_eq!(event.domain, "example.com");
    }

    #[tokio::test]
    async fn full_observer_channel_does_not_block() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send(TickOutcome {
            domain: "filler".into(),
            host: "@".into(),
            kind: TickOutcomeKind::UpToDate,
            ip: None,
            timestamp: Utc::now(),
        })
        .unwrap();

        let mut ticker = RecordTicker::new(Box::new(CountingUpdater::new(false))).with_events(tx);
        let outcome = ticker
            .tick(&client(), &FixedSource(ip), Duration::from_secs(5))
            .await;
        assert_eq!(outcome.kind, TickOutcomeKind::Updated);
    }
}
