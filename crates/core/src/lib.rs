#![deny(missing_docs)]
//! The spotcheck checker engine.
//!
//! A spotcheck station periodically obtains a batch of
//! (content id, storage provider) check assignments, deterministically
//! self-selects the subset that belongs to its own station identity,
//! fetches each content block from the assigned provider, verifies the
//! bytes against the content id, and reports one outcome record per
//! check.
//!
//! Module layout, leaves first:
//!
//! - [multiaddr] converts a provider multiaddr into an HTTP url.
//! - [sampler] ranks assignments by xor distance to the station key.
//! - [car] decodes and verifies a single-block content archive.
//! - [pacing] computes the delay between checks.
//! - [tasker] owns the on-demand queue and the round cursor.
//! - [engine] executes one check end to end.
//! - [worker] is the serial loop tying it all together.
//!
//! The remaining modules are the production implementations of the
//! spotcheck_api collaborator traits.

pub mod car;
pub mod config;
pub mod engine;
pub mod graphsync_transport;
pub mod http_transport;
pub mod ipni;
pub mod metrics;
pub mod miner_info;
pub mod multiaddr;
pub mod pacing;
pub mod report;
pub mod round_client;
pub mod sampler;
pub mod tasker;
pub mod worker;

#[cfg(test)]
mod test_utils;
