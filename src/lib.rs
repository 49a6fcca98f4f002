//! polarscan – angle × frequency aggregation of electromagnetic emission
//! surveys.
//!
//! Ingests per-angle measurement files (signal/noise sweeps, or filename-
//! encoded containment radii), unifies their frequency grids, imputes
//! missing readings from the observed noise floor, and reduces repeated
//! measurement campaigns to means with expanded uncertainty intervals. The
//! results feed a polar plotting layer through the
//! [`presentation::Normalizer`] contract; rendering itself lives outside
//! this crate.

pub mod data;
pub mod error;
pub mod presentation;

pub use data::aggregate::{
    EmptyFilePolicy, MeasurementAggregator, RepeatedLevelAggregator, ScanConfig,
    SingleLevelAggregator,
};
pub use data::containment::{RepeatedContainmentAggregator, SingleContainmentAggregator};
pub use data::model::{AggregatedMatrix, ContainmentTable};
pub use error::{Result, ScanError};
