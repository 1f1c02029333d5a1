//! # `opkv`
//!
//! `opkv` is an embeddable, typed key-value engine (the "Operator") layered
//! over a pluggable log-structured merge (LSM) byte store. For each key it
//! stores a strongly typed value (a [`DataFrame`](dataframe::DataFrame)) and
//! exposes high-level, atomic read-modify-write operations: integer/float
//! arithmetic, string manipulation, arbitrary-precision integer and decimal
//! math, bitmap set algebra, and composite collections (list, set, map,
//! time-series, bloom filter) that decompose into many underlying
//! key-value records sharing a prefix.
//!
//! ## Layout
//!
//! - [`store`] — the ByteStore collaborator: an ordered key→value byte map
//!   with point get/set/delete and prefix range scan. Two implementations
//!   ship: [`store::memory::MemoryStore`] (in-process, non-persistent) and
//!   [`store::disk::DiskStore`] (an LSM engine — memtable, write-ahead log,
//!   flushed SSTables — generalized from an embedded storage engine).
//! - [`keycodec`] — deterministic byte encoding of composite-key paths
//!   (`list:<name>:item:<i64 be>` and friends).
//! - [`dataframe`] — the `DataFrame` tagged union and its binary codec.
//! - [`locks`] — the striped reader-writer lock table serializing
//!   per-key read-modify-write sections.
//! - [`ttl`] — the in-process TTL index and its background sweep thread.
//! - [`operator`] — the public API surface: [`operator::Operator`] composes
//!   the four pieces above into `Set`/`Get`/`Add`/`Push*`/`MapSet`/... .
//! - [`config`] — open-time configuration ([`config::OpenOptions`]).
//! - [`error`] — the shared [`error::OperatorError`] taxonomy.
//! - [`mesh`] — trait-only surface for an optional messaging/cluster
//!   collaborator (pub/sub, streams, KV/object buckets, distributed locks).
//!   Not wired into the `Operator`; out of CORE scope.
//!
//! ## Example
//!
//! ```no_run
//! use opkv::config::OpenOptions;
//! use opkv::operator::Operator;
//!
//! let op = Operator::open(OpenOptions::new()).unwrap();
//! op.set_int(b"views", 0).unwrap();
//! assert_eq!(op.inc_int(b"views").unwrap(), 1);
//!
//! op.push_right("queue", opkv::dataframe::DataFrame::Str("job-1".into())).unwrap();
//! ```

#![allow(dead_code)]

pub mod config;
pub mod dataframe;
pub mod error;
pub mod keycodec;
pub mod locks;
pub mod mesh;
pub mod operator;
pub mod store;
pub mod ttl;
