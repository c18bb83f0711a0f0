//! Core trait definitions
//!
//! Two seams: [`Updater`] is implemented once per DNS provider, and
//! [`PublicIpSource`] by anything that can observe the machine's public
//! address.

mod ip_source;
mod updater;

pub use ip_source::PublicIpSource;
pub use updater::{format_updater, html_domain_anchor, HtmlRow, Updater};
