#![deny(missing_docs)]
//! Spotcheck API contains checker module traits and the basic types
//! required to define the api of those traits.
//!
//! If you want to run a checker node itself, please see the
//! spotcheck_core and spotcheck_node crates.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

mod error;
pub use error::*;

mod timestamp;
pub use timestamp::*;

pub mod cid;
pub use cid::ContentId;

mod task;
pub use task::*;

pub mod outcome;
pub use outcome::{IndexerResult, Measurement, OutcomeCode, OutcomeRecord};

pub mod transport;
pub use transport::*;

pub mod round;
pub use round::*;

pub mod index;
pub use index::*;

pub mod identity;
pub use identity::*;

pub mod report;
pub use report::*;

pub mod metrics;
pub use metrics::*;
