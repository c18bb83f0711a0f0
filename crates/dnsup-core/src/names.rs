//! Domain name composition
//!
//! Hosts use `@` for the apex and `*` for a wildcard. Display strings
//! and URL query parameters compose them differently, hence the two
//! functions.

/// Human-readable record name: `@` is the domain itself, `*` shows as
/// `any.<domain>`, anything else is `<host>.<domain>`.
pub fn build_domain_name(host: &str, domain: &str) -> String {
    match host {
        "@" => domain.to_string(),
        "*" => format!("any.{domain}"),
        _ => format!("{host}.{domain}"),
    }
}

/// Record name as sent in URL queries: `@` is the domain itself and `*`
/// is kept verbatim, so upstreams that accept wildcards receive
/// `*.<domain>`.
pub fn build_url_query_hostname(host: &str, domain: &str) -> String {
    match host {
        "@" => domain.to_string(),
        _ => format!("{host}.{domain}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_name_composition() {
        assert_eq!(build_domain_name("@", "example.com"), "example.com");
        assert_eq!(build_domain_name("*", "example.com"), "any.example.com");
        assert_eq!(build_domain_name("www", "example.com"), "www.example.com");
    }

    #[test]
    fn url_query_hostname_keeps_wildcard() {
        assert_eq!(build_url_query_hostname("@", "example.com"), "example.com");
        assert_eq!(build_url_query_hostname("*", "example.com"), "*.example.com");
        assert_eq!(
            build_url_query_hostname("www", "example.com"),
            "www.example.com"
        );
    }
}
