//! HTTP exchange helpers shared by all adapters
//!
//! Header setters take and return a `reqwest::RequestBuilder` so they
//! chain at call sites. Response bodies destined for error messages go
//! through [`to_single_line`] so multi-line upstream output never
//! mangles log lines.

use reqwest::RequestBuilder;

/// User-Agent sent on every outbound request.
pub const USER_AGENT: &str = "DDNS-Updater quentin.mcgaw@gmail.com";

/// Set the fixed User-Agent header.
pub fn with_user_agent(builder: RequestBuilder) -> RequestBuilder {
    builder.header(reqwest::header::USER_AGENT, USER_AGENT)
}

/// Set `Content-Type`.
pub fn with_content_type(builder: RequestBuilder, value: &str) -> RequestBuilder {
    builder.header(reqwest::header::CONTENT_TYPE, value)
}

/// Set `Accept`.
pub fn with_accept(builder: RequestBuilder, value: &str) -> RequestBuilder {
    builder.header(reqwest::header::ACCEPT, value)
}

/// Set `Authorization: Bearer <token>`.
pub fn with_bearer(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
}

/// Set GoDaddy's `Authorization: sso-key <key>:<secret>`.
pub fn with_sso_key(builder: RequestBuilder, key: &str, secret: &str) -> RequestBuilder {
    builder.header(
        reqwest::header::AUTHORIZATION,
        format!("sso-key {key}:{secret}"),
    )
}

/// Set Linode's `X-Filter` listing filter.
pub fn with_x_filter(builder: RequestBuilder, filter: &str) -> RequestBuilder {
    builder.header("X-Filter", filter.to_string())
}

/// Flatten a response body to one line: CR and LF become spaces and
/// runs of spaces collapse to one. Applying it twice changes nothing.
pub fn to_single_line(body: &str) -> String {
    let mut out = body.trim().replace(['\r', '\n'], " ");
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out
}

/// Read a response body fully and flatten it for inclusion in an error
/// message.
pub async fn body_single_line(response: reqwest::Response) -> Result<String, reqwest::Error> {
    let text = response.text().await?;
    Ok(to_single_line(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattening_removes_line_breaks() {
        assert_eq!(to_single_line("a\r\nb\nc"), "a b c");
    }

    #[test]
    fn flattening_collapses_space_runs() {
        assert_eq!(to_single_line("a    b\n\n\n   c"), "a b c");
    }

    #[test]
    fn flattening_is_idempotent() {
        let bodies = [
            "  leading and trailing  ",
            "a\r\n\r\nb",
            "already flat",
            "x\n \n \n y",
            "",
        ];
        for body in bodies {
            let once = to_single_line(body);
            assert_eq!(to_single_line(&once), once, "body {body:?}");
        }
    }
}
