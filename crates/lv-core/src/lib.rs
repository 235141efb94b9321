//! Longitudinal view core.
//!
//! Turns date-partitioned telemetry blobs into one row per client, with
//! every histogram vectorized across the client's ping history:
//!
//! - [`plan`]: size-bounded partition groups over a storage listing
//! - [`decode`]: framed protobuf blobs to pings
//! - [`session`]: per-client, time-ordered ping histories
//! - [`vectorize`]: fixed-shape histogram series
//! - [`build`]: one output row per session
//! - [`store`]: object storage collaborators
//! - [`pipeline`]: the job driver

pub mod build;
pub mod cli;
pub mod decode;
pub mod exit_codes;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod session;
pub mod store;
pub mod vectorize;

pub use build::{BuildError, RecordBuilder};
pub use exit_codes::ExitCode;
pub use pipeline::{output_prefix, run_longitudinal, JobInputs, JobStats, STREAM_NAME};
pub use plan::{plan_partitions, ObjectDescriptor, PartitionGroup};
pub use session::{assemble_sessions, AssemblyStats, ClientSession};
pub use store::{LocalStore, ObjectStore, StoreError};
