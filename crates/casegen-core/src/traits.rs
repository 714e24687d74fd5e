//! Core traits for casegen.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{AnalysisEnvelope, AnalysisStart, MediaAsset, Result};

/// Storage for uploaded recordings and their analysis state.
///
/// Durable persistence belongs to the surrounding application; the pipeline
/// only drives the status machine through this seam.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Store a newly uploaded asset.
    async fn insert(&self, asset: MediaAsset) -> Result<MediaAsset>;

    /// Get an asset by ID.
    async fn get(&self, id: Uuid) -> Result<MediaAsset>;

    /// List assets owned by a user (all assets when `owner_id` is None).
    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<MediaAsset>>;

    /// Atomically move an asset into `analyzing` (see [`MediaAsset::begin_analysis`]).
    async fn begin_analysis(&self, id: Uuid, force: bool) -> Result<(AnalysisStart, MediaAsset)>;

    /// Store the result of `job_id` and mark the asset completed.
    /// Fails with `Error::Superseded` when another job owns the asset.
    async fn complete(&self, id: Uuid, job_id: Uuid, envelope: AnalysisEnvelope) -> Result<()>;

    /// Mark the asset failed with the message of `job_id`.
    /// Fails with `Error::Superseded` when another job owns the asset.
    async fn fail(&self, id: Uuid, job_id: Uuid, error: &str) -> Result<()>;
}
