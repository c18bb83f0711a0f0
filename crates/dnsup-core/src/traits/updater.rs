// # Updater Trait
//
// The uniform contract every DNS provider adapter implements. Adapters
// are immutable after construction, never retain an HTTP client, and
// perform exactly one logical upstream exchange per `update` call; the
// caller owns retry, backoff and deadlines.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::config::IpVersion;
use crate::error::UpdateError;
use crate::names;

/// One table row describing an adapter, for status pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlRow {
    /// Domain cell, usually an anchor to the domain itself
    pub domain: String,
    /// Host label cell
    pub host: String,
    /// Provider cell, usually an anchor to the provider's site
    pub provider: String,
    /// IP family cell
    pub ip_version: String,
}

/// DNS provider adapter contract.
///
/// `update` pushes `ip` upstream and returns the address the provider
/// now serves. When the provider echoes an address back, the adapter
/// compares it with the one sent and fails with
/// [`UpdateError::IpReceivedMismatch`] on disagreement; in provider-ip
/// mode the echoed address is returned as-is.
///
/// Implementations must be `Send + Sync` and safe to call from
/// concurrent tasks, which follows from their immutability. Cancelling
/// the returned future aborts the in-flight request.
#[async_trait]
pub trait Updater: fmt::Display + Send + Sync {
    /// Push `ip` to the provider and return the address now served.
    async fn update(&self, client: &reqwest::Client, ip: IpAddr) -> Result<IpAddr, UpdateError>;

    /// Registered domain this adapter manages.
    fn domain(&self) -> &str;

    /// Host label, `@` for the apex, `*` for a wildcard.
    fn host(&self) -> &str;

    /// Address family this adapter accepts.
    fn ip_version(&self) -> IpVersion;

    /// Whether the record hides the address behind the provider's proxy.
    fn proxied(&self) -> bool {
        false
    }

    /// Display name of the full record, wildcard shown as `any`.
    fn build_domain_name(&self) -> String {
        names::build_domain_name(self.host(), self.domain())
    }

    /// Status page row for this adapter.
    fn html(&self) -> HtmlRow;
}

/// Shared `Display` body for adapters:
/// `[domain: D | host: H | provider: P | ip: V]`.
pub fn format_updater(
    f: &mut fmt::Formatter<'_>,
    provider: &str,
    domain: &str,
    host: &str,
    ip_version: IpVersion,
) -> fmt::Result {
    write!(
        f,
        "[domain: {domain} | host: {host} | provider: {provider} | ip: {ip_version}]"
    )
}

/// Domain cell content for [`HtmlRow`].
pub fn html_domain_anchor(domain: &str) -> String {
    format!("<a href=\"https://{domain}\">{domain}</a>")
}
