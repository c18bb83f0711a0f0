//! DNS provider adapters.
//!
//! Each module implements [`dnsup_core::Updater`] for one upstream API.
//! Construction goes through [`new_updater`], which picks the module
//! from the record's provider kind and validates its settings.

mod common;
mod dispatch;

mod aliyun;
mod cloudflare;
mod dd24;
mod digitalocean;
mod dnsomatic;
mod dnspod;
mod dreamhost;
mod duckdns;
mod dyncom;
mod dynu;
mod freedns;
mod gandi;
mod godaddy;
mod google;
mod he;
mod infomaniak;
mod inwx;
mod linode;
mod luadns;
mod namecheap;
mod netcup;
mod njalla;
mod noip;
mod ovh;
mod porkbun;
mod selfhostde;
mod servercow;
mod spdyn;
mod strato;

pub use dispatch::new_updater;
