//! Core math modules.

pub mod buckets;
