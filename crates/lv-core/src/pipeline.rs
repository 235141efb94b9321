//! Longitudinal job driver.
//!
//! Stages, with a hard boundary after decoding since a client's pings can
//! come from any partition group:
//!
//! 1. refuse to run if the output partition is already populated
//! 2. list the date range and plan partition groups
//! 3. decode every group in parallel
//! 4. assemble client sessions across all groups
//! 5. shard sessions by client id; each shard builds rows and writes its
//!    own Parquet files, uploading them as they close

use crate::build::RecordBuilder;
use crate::decode::FrameReader;
use crate::plan::{plan_partitions, ObjectDescriptor, PartitionGroup};
use crate::session::{assemble_sessions, ClientSession};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use lv_common::{Error, Ping, Result};
use lv_config::{DateRange, HistogramRegistry, JobConfig, StreamSource};
use lv_telemetry::{longitudinal_schema, BatchedWriter, RowLayout, WriterConfig};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// The only output stream this job produces.
pub const STREAM_NAME: &str = "longitudinal";

/// Output prefix for a date range: `longitudinal/v<to>/`.
pub fn output_prefix(range: &DateRange) -> String {
    format!("{STREAM_NAME}/{}/", range.version_label())
}

/// Summary of one job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_prefix: String,
    pub objects: usize,
    pub groups: usize,
    pub corrupt_blobs: usize,
    pub pings: usize,
    pub pings_without_client: usize,
    pub sessions: usize,
    pub unsortable_sessions: usize,
    pub failed_clients: usize,
    pub rows: usize,
    pub files: Vec<String>,
}

/// Everything a job run reads from.
pub struct JobInputs<'a> {
    pub config: &'a JobConfig,
    pub registry: &'a HistogramRegistry,
    pub source: &'a StreamSource,
    pub range: DateRange,
    pub input: &'a dyn ObjectStore,
    pub output: &'a dyn ObjectStore,
}

#[derive(Debug, Default)]
struct DecodedGroup {
    pings: Vec<Ping>,
    corrupt_blobs: usize,
}

#[derive(Debug, Default)]
struct ShardOutcome {
    rows: usize,
    failed_clients: usize,
    files: Vec<String>,
}

/// Run the longitudinal job end to end.
pub fn run_longitudinal(job: &JobInputs<'_>) -> Result<JobStats> {
    let job_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let prefix = output_prefix(&job.range);

    if job.output.exists(&prefix)? {
        warn!(prefix = %prefix, "output partition already populated, aborting");
        return Err(Error::OutputExists { prefix });
    }

    let schema = longitudinal_schema(job.registry)?;
    let layout = RowLayout::new(schema);

    let mut objects: Vec<ObjectDescriptor> = Vec::new();
    for day_prefix in job.source.day_prefixes(&job.range) {
        objects.extend(job.input.list(&day_prefix)?);
    }
    let object_count = objects.len();
    let groups = plan_partitions(objects, job.config.partition_threshold_bytes);
    for group in groups
        .iter()
        .filter(|g| g.is_oversized(job.config.partition_threshold_bytes))
    {
        warn!(
            key = %group.objects[0].key,
            bytes = group.size_bytes,
            "object exceeds partition threshold, processing alone"
        );
    }
    info!(
        job_id = %job_id,
        objects = object_count,
        groups = groups.len(),
        prefix = %prefix,
        "partitions planned"
    );

    let pool = build_pool(job.config.workers)?;
    let decoded: Vec<DecodedGroup> = in_pool(pool.as_ref(), || {
        groups
            .par_iter()
            .map(|group| decode_group(job.input, group))
            .collect::<Result<Vec<_>>>()
    })?;
    let corrupt_blobs = decoded.iter().map(|g| g.corrupt_blobs).sum();

    let (sessions, assembly) = assemble_sessions(decoded.into_iter().flat_map(|g| g.pings));
    info!(
        pings = assembly.pings,
        sessions = assembly.sessions,
        unsortable = assembly.unsortable_sessions,
        "sessions assembled"
    );

    let shard_count = groups.len().max(1);
    let mut shards: Vec<Vec<ClientSession>> = (0..shard_count).map(|_| Vec::new()).collect();
    for session in sessions {
        let shard = session.client_id.shard(shard_count);
        shards[shard].push(session);
    }

    let staging_root = job
        .config
        .staging_root
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let builder = RecordBuilder::new(job.registry, &layout);
    let outcomes: Vec<ShardOutcome> = in_pool(pool.as_ref(), || {
        shards
            .into_par_iter()
            .filter(|shard| !shard.is_empty())
            .map(|shard| write_shard(job, &builder, &layout, &prefix, &staging_root, shard))
            .collect::<Result<Vec<_>>>()
    })?;

    let stats = JobStats {
        job_id,
        started_at,
        finished_at: Utc::now(),
        output_prefix: prefix,
        objects: object_count,
        groups: groups.len(),
        corrupt_blobs,
        pings: assembly.pings,
        pings_without_client: assembly.pings_without_client,
        sessions: assembly.sessions,
        unsortable_sessions: assembly.unsortable_sessions,
        failed_clients: outcomes.iter().map(|o| o.failed_clients).sum(),
        rows: outcomes.iter().map(|o| o.rows).sum(),
        files: outcomes.into_iter().flat_map(|o| o.files).collect(),
    };
    info!(
        job_id = %stats.job_id,
        rows = stats.rows,
        files = stats.files.len(),
        failed_clients = stats.failed_clients,
        "longitudinal job finished"
    );
    Ok(stats)
}

fn build_pool(workers: usize) -> Result<Option<ThreadPool>> {
    if workers == 0 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map(Some)
        .map_err(|e| Error::Config(format!("cannot start {workers} workers: {e}")))
}

fn in_pool<T: Send>(pool: Option<&ThreadPool>, work: impl FnOnce() -> T + Send) -> T {
    match pool {
        Some(pool) => pool.install(work),
        None => work(),
    }
}

/// Decode every object of one group. A missing or unreadable object fails
/// the group; a malformed frame only ends its blob.
fn decode_group(input: &dyn ObjectStore, group: &PartitionGroup) -> Result<DecodedGroup> {
    let mut decoded = DecodedGroup::default();
    for object in &group.objects {
        let mut frames = FrameReader::new(object.key.as_str(), input.fetch(&object.key)?);
        decoded.pings.extend(frames.by_ref());
        if let Some(e) = frames.take_error() {
            return Err(Error::Decode {
                key: object.key.clone(),
                reason: e.to_string(),
            });
        }
        if frames.is_corrupt() {
            decoded.corrupt_blobs += 1;
        }
    }
    debug!(objects = group.len(), pings = decoded.pings.len(), "group decoded");
    Ok(decoded)
}

fn write_shard(
    job: &JobInputs<'_>,
    builder: &RecordBuilder<'_>,
    layout: &RowLayout,
    prefix: &str,
    staging_root: &Path,
    sessions: Vec<ClientSession>,
) -> Result<ShardOutcome> {
    // Removed on drop, including when a write or upload below fails.
    std::fs::create_dir_all(staging_root)?;
    let staging = tempfile::Builder::new()
        .prefix("longitudinal-")
        .tempdir_in(staging_root)?;
    let mut writer = BatchedWriter::new(
        layout.schema().clone(),
        WriterConfig::new(staging.path())
            .with_max_file_bytes(job.config.max_file_bytes)
            .with_batch_rows(job.config.batch_rows),
    );
    let mut outcome = ShardOutcome::default();

    for session in &sessions {
        match builder.build(session) {
            Ok(row) => {
                outcome.rows += 1;
                if let Some(file) = writer.push(row)? {
                    outcome.files.push(job.output.upload(&file.path, prefix)?);
                }
            }
            Err(e) => {
                outcome.failed_clients += 1;
                warn!(client_id = %session.client_id, error = %e, "discarding client");
            }
        }
    }
    if let Some(file) = writer.finish()? {
        outcome.files.push(job.output.upload(&file.path, prefix)?);
    }

    if let Err(e) = staging.close() {
        debug!(error = %e, "staging directory not removed");
    }
    Ok(outcome)
}
