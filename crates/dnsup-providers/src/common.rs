//! Helpers shared across adapters
//!
//! The dyndns v2 dialect spans many upstreams and answers with a short
//! token body; `classify_token` maps the shared vocabulary to error
//! kinds and `parse_good_nochg` handles the success path. REST
//! upstreams share the non-2xx status mapping in `bad_status`.

use std::net::IpAddr;

use dnsup_core::http::to_single_line;
use dnsup_core::ipextract::extract_first;
use dnsup_core::UpdateError;

/// Map a dyndns v2 failure token to its error kind. Returns `None` for
/// bodies that are not a known failure token.
pub(crate) fn classify_token(body: &str) -> Option<UpdateError> {
    let body = body.trim();
    let flat = to_single_line(body);
    if body.starts_with("badauth") {
        Some(UpdateError::Auth(flat))
    } else if body.starts_with("badagent") {
        Some(UpdateError::BannedUserAgent(flat))
    } else if body.starts_with("abuse") || body.starts_with("numhost") {
        Some(UpdateError::Abuse(flat))
    } else if body.starts_with("911") || body.starts_with("dnserr") {
        Some(UpdateError::DnsServerSide(flat))
    } else if body.starts_with("!donator") {
        Some(UpdateError::FeatureUnavailable(flat))
    } else if body.starts_with("notfqdn") || body.starts_with("nohost") || body.starts_with("fatal")
    {
        Some(UpdateError::HostnameNotExists(flat))
    } else if body.starts_with("conflict") {
        // Covers both "conflict A" and "conflict AAAA".
        Some(UpdateError::ConflictingRecord(flat))
    } else if body.starts_with("badrequest") {
        Some(UpdateError::BadRequest(flat))
    } else {
        None
    }
}

/// Handle a dyndns v2 success body: `good` or `nochg`, usually followed
/// by the address now served. A missing echo falls back to the sent
/// address; a disagreeing echo is an error unless the adapter runs in
/// provider-ip mode, where the upstream decides the address.
pub(crate) fn parse_good_nochg(
    body: &str,
    sent: IpAddr,
    provider_ip: bool,
) -> Result<IpAddr, UpdateError> {
    parse_success_token(body, sent, provider_ip, false)
}

/// Like [`parse_good_nochg`] for upstreams documented to always echo
/// the address: a success token without any literal is
/// `NoResultReceived` instead of falling back to the sent address.
pub(crate) fn parse_good_nochg_required(
    body: &str,
    sent: IpAddr,
    provider_ip: bool,
) -> Result<IpAddr, UpdateError> {
    parse_success_token(body, sent, provider_ip, true)
}

fn parse_success_token(
    body: &str,
    sent: IpAddr,
    provider_ip: bool,
    echo_required: bool,
) -> Result<IpAddr, UpdateError> {
    let trimmed = body.trim();
    if !trimmed.starts_with("good") && !trimmed.starts_with("nochg") {
        return match classify_token(trimmed) {
            Some(err) => Err(err),
            None => Err(UpdateError::UnknownResponse(to_single_line(trimmed))),
        };
    }
    if echo_required {
        resolve_echo_required(sent, trimmed, provider_ip)
    } else {
        resolve_echo(sent, trimmed, provider_ip)
    }
}

/// Compare the upstream's echoed address with the one sent.
pub(crate) fn verify_echo(sent: IpAddr, received: IpAddr) -> Result<IpAddr, UpdateError> {
    if received == sent {
        Ok(received)
    } else {
        Err(UpdateError::IpReceivedMismatch { sent, received })
    }
}

/// Parse an echoed address out of free text. Without provider-ip mode
/// the echo must match the sent address; with it, the echo wins. Text
/// without any literal falls back to the sent address.
pub(crate) fn resolve_echo(
    sent: IpAddr,
    text: &str,
    provider_ip: bool,
) -> Result<IpAddr, UpdateError> {
    match extract_first(text) {
        Some(received) if provider_ip => Ok(received),
        Some(received) => verify_echo(sent, received),
        None => Ok(sent),
    }
}

/// Like [`resolve_echo`] but text without any literal is
/// `NoResultReceived` rather than falling back to the sent address.
pub(crate) fn resolve_echo_required(
    sent: IpAddr,
    text: &str,
    provider_ip: bool,
) -> Result<IpAddr, UpdateError> {
    match extract_first(text) {
        Some(received) if provider_ip => Ok(received),
        Some(received) => verify_echo(sent, received),
        None => Err(UpdateError::NoResultReceived(to_single_line(text))),
    }
}

/// Parse a hardcoded URL known to be well-formed.
pub(crate) fn static_url(raw: &str) -> url::Url {
    url::Url::parse(raw).expect("hardcoded URL")
}

/// Map an unexpected HTTP status and its flattened body to an error
/// kind: 401/403 mean bad credentials and 429 rate limiting.
pub(crate) fn bad_status(status: reqwest::StatusCode, body: &str) -> UpdateError {
    let flat = to_single_line(body);
    match status.as_u16() {
        401 | 403 => UpdateError::Auth(flat),
        429 => UpdateError::RateLimited(flat),
        status => UpdateError::BadHttpStatus { status, body: flat },
    }
}
