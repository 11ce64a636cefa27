//! Globally locked persistence of aggregated observation data.
//!
//! The writer is the one component shared across nodes, and it is
//! deliberately *not* an actor: a single mailbox would serialize reduction
//! and volume commits against each other, and the two output classes must
//! be able to proceed concurrently. Instead each class has its own
//! `tokio::sync::Mutex`, scoped to exactly the read-modify-write it
//! protects. The guards are RAII, so release is guaranteed on every exit
//! path, and a commit never touches the other class's lock.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::observation::{ArrayComponentId, ObservationId, TensorData};

/// On-disk form of one output class: folded tensor data per observation,
/// keyed by the observation's fixed-order file key (hash, then value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedAggregates {
    pub observations: BTreeMap<String, TensorData>,
}

impl PersistedAggregates {
    fn merge(&mut self, observation: ObservationId, data: &TensorData) {
        self.observations
            .entry(observation.file_key())
            .or_default()
            .merge(data);
    }
}

/// Volume-side state owned by the volume lock: the pending buffer and the
/// record of which volume-producing components have contributed to it.
#[derive(Debug, Default)]
struct VolumePending {
    contributed: BTreeSet<ArrayComponentId>,
    buffer: Vec<(ObservationId, TensorData)>,
}

/// Buffers aggregated tensor data and commits it to durable storage.
///
/// Two calls to the same commit operation are serialized; a reduction
/// commit and a volume commit may proceed concurrently.
pub struct ObserverWriter {
    reduction_path: PathBuf,
    volume_path: PathBuf,
    reduction_lock: Mutex<()>,
    volume_lock: Mutex<VolumePending>,
}

impl ObserverWriter {
    /// Create the writer with empty pending state and both locks free.
    pub fn initialize(output_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;
        Ok(Arc::new(Self {
            reduction_path: output_dir.join("reductions.json"),
            volume_path: output_dir.join("volumes.json"),
            reduction_lock: Mutex::new(()),
            volume_lock: Mutex::new(VolumePending::default()),
        }))
    }

    pub fn reduction_path(&self) -> &Path {
        &self.reduction_path
    }

    pub fn volume_path(&self) -> &Path {
        &self.volume_path
    }

    /// Commit one folded reduction aggregate.
    ///
    /// Holds the reduction-file lock for the full read-modify-write and
    /// never acquires the volume lock.
    pub async fn commit_reduction(
        &self,
        observation: ObservationId,
        data: TensorData,
    ) -> Result<()> {
        let _guard = self.reduction_lock.lock().await;
        let mut persisted = load(&self.reduction_path)?;
        persisted.merge(observation, &data);
        store(&self.reduction_path, &persisted)?;
        debug!(observation = %observation, "Committed reduction data");
        Ok(())
    }

    /// Commit one folded volume aggregate from the given contributors.
    ///
    /// Holds the volume-file lock for the full read-modify-write and never
    /// acquires the reduction lock. The pending buffer and contributor
    /// record survive a failed write, so the commit can be retried.
    pub async fn commit_volume(
        &self,
        observation: ObservationId,
        contributors: Vec<ArrayComponentId>,
        data: TensorData,
    ) -> Result<()> {
        let mut pending = self.volume_lock.lock().await;
        pending.contributed.extend(contributors);
        pending.buffer.push((observation, data));
        trace!(
            observation = %observation,
            buffered = pending.buffer.len(),
            contributors = pending.contributed.len(),
            "Buffered volume data"
        );

        let mut persisted = load(&self.volume_path)?;
        for (buffered_observation, buffered_data) in &pending.buffer {
            persisted.merge(*buffered_observation, buffered_data);
        }
        store(&self.volume_path, &persisted)?;

        let flushed = pending.buffer.len();
        pending.buffer.clear();
        pending.contributed.clear();
        debug!(observation = %observation, flushed, "Committed volume data");
        Ok(())
    }

    /// Read the persisted reduction aggregates, under the reduction lock.
    pub async fn read_reductions(&self) -> Result<PersistedAggregates> {
        let _guard = self.reduction_lock.lock().await;
        load(&self.reduction_path)
    }

    /// Read the persisted volume aggregates, under the volume lock.
    pub async fn read_volumes(&self) -> Result<PersistedAggregates> {
        let _guard = self.volume_lock.lock().await;
        load(&self.volume_path)
    }
}

fn load(path: &Path) -> Result<PersistedAggregates> {
    if !path.exists() {
        return Ok(PersistedAggregates::default());
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn store(path: &Path, aggregates: &PersistedAggregates) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(aggregates)?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_output_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "observer-writer-{}-{}",
            tag,
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn reduction_commit_accumulates_across_calls() {
        let dir = temp_output_dir("accumulate");
        let _ = std::fs::remove_dir_all(&dir);
        let writer = ObserverWriter::initialize(&dir).unwrap();

        let observation = ObservationId::from_raw(1, 0.5);
        let mut data = TensorData::new();
        data.insert("norm", vec![2.0]);

        writer.commit_reduction(observation, data.clone()).await.unwrap();
        writer.commit_reduction(observation, data).await.unwrap();

        let persisted = writer.read_reductions().await.unwrap();
        assert_eq!(
            persisted.observations[&observation.file_key()].components()["norm"],
            vec![4.0]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn classes_write_to_independent_files() {
        let dir = temp_output_dir("independent");
        let _ = std::fs::remove_dir_all(&dir);
        let writer = ObserverWriter::initialize(&dir).unwrap();

        let observation = ObservationId::from_raw(2, 1.0);
        let mut data = TensorData::new();
        data.insert("u", vec![1.0, 2.0]);

        writer
            .commit_volume(observation, Vec::new(), data.clone())
            .await
            .unwrap();
        assert!(writer.volume_path().exists());
        assert!(!writer.reduction_path().exists());

        writer.commit_reduction(observation, data).await.unwrap();
        assert!(writer.reduction_path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
