//! The remote site's contract: URL shapes, embedded data payloads, structural page schemas, and
//! one extractor per entity kind.
//!
//! Everything under this module is pure with respect to the network — extractors receive pages
//! through the shared [`FetchGate`](crate::fetch::FetchGate) and all parsing is testable against
//! fixture HTML.

pub mod extract;
pub mod payload;
pub mod schema;
pub mod urls;
pub mod when;

pub use schema::SchemaGuard;
