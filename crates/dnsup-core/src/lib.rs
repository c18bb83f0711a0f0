// # dnsup-core
//
// Core library for the dnsup dynamic DNS agent.
//
// ## Architecture Overview
//
// - **Updater**: Trait every DNS provider adapter implements
// - **PublicIpSource**: Trait for observing the machine's public address
// - **RecordTicker**: Per-record fetch/compare/update state machine
// - **Error taxonomy**: Validation, update and fetch errors kept apart
// - **Helpers**: HTTP headers, body flattening, name composition and
//   IP literal extraction shared by adapters
//
// ## Design Principles
//
// 1. Adapters are immutable after construction and never retain a client
// 2. One upstream write attempt per tick; retry policy lives with the caller
// 3. Error kinds survive phase wrapping so callers classify by matching
// 4. The provider set is a closed world fixed at compile time

pub mod config;
pub mod error;
pub mod http;
pub mod ipextract;
pub mod names;
pub mod tick;
pub mod traits;

// Re-export core types for convenience
pub use config::{record_type, Config, IpVersion, ProviderKind, RecordConfig};
pub use error::{FetchError, UpdateError, ValidationError};
pub use tick::{RecordTicker, TickOutcome, TickOutcomeKind};
pub use traits::{HtmlRow, PublicIpSource, Updater};
