// # Public IP Source Trait
//
// Anything that can observe the machine's public address. The HTTP
// echo-service implementation lives in the `dnsup-publicip` crate.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::config::IpVersion;
use crate::error::FetchError;

/// Source of the machine's current public address.
///
/// For `IpVersion::V4OrV6` the source returns whichever family it can
/// observe, preferring IPv4. Implementations must be `Send + Sync`;
/// cancelling the returned future aborts any in-flight request.
#[async_trait]
pub trait PublicIpSource: Send + Sync {
    /// Observe the current public address of the given family.
    async fn public_ip(
        &self,
        client: &reqwest::Client,
        version: IpVersion,
    ) -> Result<IpAddr, FetchError>;
}
