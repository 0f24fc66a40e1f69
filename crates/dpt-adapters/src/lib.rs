//! Source adapters: payload decoding, schema harmonization and memoized fetching.

pub mod decode;
pub mod fetcher;
pub mod harmonize;
pub mod sample;

pub use decode::{decode_payload, decode_upload, DecodeError, PayloadFormat, WRAPPER_KEYS};
pub use fetcher::{FetchCause, FetchError, SourceFetcher, SourceKey, FETCH_CACHE_TTL};
pub use harmonize::{synthetic_permit_id, SchemaHarmonizer};
pub use sample::sample_permits;

pub const CRATE_NAME: &str = "dpt-adapters";
