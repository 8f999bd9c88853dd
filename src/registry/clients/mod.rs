//! Upstream registry clients.
//!
//! Each client wraps exactly one upstream service behind a
//! [`ResilientClient`](crate::registry::client::ResilientClient) and exposes
//! domain-shaped calls. Every call resolves to `Option` — absence is a
//! normal outcome when an upstream is down, rate limited or has no record.

mod checko;
mod dadata;
mod nalog;

pub use checko::CheckoClient;
pub use dadata::DadataClient;
pub use nalog::NalogClient;
