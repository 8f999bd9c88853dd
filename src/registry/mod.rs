//! Resilient external-data access layer.
//!
//! Turns unreliable, rate-limited, pay-per-call upstream registries into a
//! dependable internal lookup service:
//!
//! - [`rate_limit`] bounds outbound and per-caller request rates;
//! - [`client`] wraps each upstream with bounded retry and a circuit
//!   breaker ([`breaker`], [`retry`]);
//! - [`cache`] avoids re-querying unchanged registry records;
//! - [`aggregator`] composes the sources into one coherent record.
//!
//! Every component is an explicit instance owned by the [`Aggregator`]
//! value constructed at process start — there are no module-level
//! singletons.

pub mod aggregator;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod clients;
pub mod error;
pub mod rate_limit;
pub mod reference;
pub mod retry;
pub mod sections;
pub mod transport;

pub use aggregator::{Aggregator, EntityKind, MergedCard, Query};
pub use sections::{Section, SectionData};

use serde::{Deserialize, Serialize};

/// Identifies which upstream supplied a piece of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Checko — the primary truth
    Checko,
    /// DaData — gap-filling enrichment
    Dadata,
}
