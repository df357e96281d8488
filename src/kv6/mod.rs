//! Core B: the KV6 realtime vehicle-position ingest pipeline.
//!
//! Payloads come in through [`ingest::PayloadSource`], are parsed by
//! [`parser`] into validated [`model::Kv6Record`]s, buffered in an
//! [`ingest::ChunkSpool`] and written out by [`parquet`] as Zstd Parquet
//! chunks with sidecar metadata.

pub mod ingest;
pub mod model;
pub mod parquet;
pub mod parser;

pub use ingest::{ChunkSpool, PayloadSource};
pub use model::{FieldSet, Kv6Field, Kv6Record, Kv6RecordType, VvTmPushInfo};
pub use parquet::MAX_CHUNK;
