//! Client for latency-analyzer congestion records.
//!
//! The device streams length-delimited protobuf records over TCP: an
//! unsigned varint length prefix, then that many payload bytes. The
//! [`LanzClient`] keeps a connection up, decodes records into the
//! caller's channel, and reconnects with backoff on any disconnect until
//! stopped.

pub mod client;
pub mod frame;
pub mod proto;

pub use client::{LanzClient, LanzOptions};
pub use proto::LanzRecord;
