//! Archival pipelines for Dutch public-transit data (BISON TMI8).
//!
//! Two cores: [`kv1`] parses, indexes and links the KV1 "Dienstregeling"
//! timetable exchange format; [`kv6`] ingests realtime KV6 vehicle-position
//! pushes and writes them out as chunked Parquet archives. [`augment`] joins
//! the two. The rest is plumbing those cores share: time semantics,
//! sidecar metadata, the metrics seam and the push-URL contract.

pub mod augment;
pub mod kv1;
pub mod kv6;
pub mod metrics;
pub mod sidecar;
pub mod spliturl;
pub mod time;
