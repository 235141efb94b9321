//! Longitudinal view math utilities.

pub mod math;

pub use math::buckets::*;
