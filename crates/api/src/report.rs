//! Measurement reporting types.

use crate::{BoxFut, Measurement, ScResult};
use std::sync::Arc;

/// Trait for submitting completed measurements.
pub trait MeasurementReporter: 'static + Send + Sync + std::fmt::Debug {
    /// Submit one measurement, returning the id the server assigned.
    fn submit(&self, measurement: &Measurement)
        -> BoxFut<'_, ScResult<u64>>;
}

/// Trait-object [MeasurementReporter].
pub type DynMeasurementReporter = Arc<dyn MeasurementReporter>;
