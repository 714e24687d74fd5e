//! In-memory [`MediaRepository`] implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{AnalysisEnvelope, AnalysisStart, Error, MediaAsset, MediaRepository, Result};

/// Process-local asset store. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct InMemoryMediaRepository {
    assets: Arc<RwLock<HashMap<Uuid, MediaAsset>>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assets.
    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Media {}", id))
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn insert(&self, asset: MediaAsset) -> Result<MediaAsset> {
        let mut assets = self.assets.write().await;
        if assets.contains_key(&asset.id) {
            return Err(Error::Conflict(format!("Media {} already exists", asset.id)));
        }
        debug!(media_id = %asset.id, filename = %asset.filename, "Stored media asset");
        assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn get(&self, id: Uuid) -> Result<MediaAsset> {
        self.assets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<MediaAsset>> {
        let assets = self.assets.read().await;
        let mut out: Vec<MediaAsset> = assets
            .values()
            .filter(|a| owner_id.is_none() || a.owner_id.as_deref() == owner_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.created_at);
        Ok(out)
    }

    async fn begin_analysis(&self, id: Uuid, force: bool) -> Result<(AnalysisStart, MediaAsset)> {
        let mut assets = self.assets.write().await;
        let asset = assets.get_mut(&id).ok_or_else(|| not_found(id))?;
        let start = asset.begin_analysis(force)?;
        Ok((start, asset.clone()))
    }

    async fn complete(&self, id: Uuid, job_id: Uuid, envelope: AnalysisEnvelope) -> Result<()> {
        let mut assets = self.assets.write().await;
        let asset = assets.get_mut(&id).ok_or_else(|| not_found(id))?;
        asset.complete(job_id, envelope)
    }

    async fn fail(&self, id: Uuid, job_id: Uuid, error: &str) -> Result<()> {
        let mut assets = self.assets.write().await;
        let asset = assets.get_mut(&id).ok_or_else(|| not_found(id))?;
        asset.fail(job_id, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalysisResult, MediaStatus};
    use std::path::PathBuf;

    fn asset(owner: &str) -> MediaAsset {
        MediaAsset::new(PathBuf::from("/tmp/a.mp4"), "a.mp4", 1, Some(owner.to_string()))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = InMemoryMediaRepository::new();
        let a = repo.insert(asset("u1")).await.unwrap();
        let fetched = repo.get(a.id).await.unwrap();
        assert_eq!(fetched.filename, "a.mp4");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryMediaRepository::new();
        let err = repo.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let repo = InMemoryMediaRepository::new();
        repo.insert(asset("u1")).await.unwrap();
        repo.insert(asset("u2")).await.unwrap();
        assert_eq!(repo.list(Some("u1")).await.unwrap().len(), 1);
        assert_eq!(repo.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_flow() {
        let repo = InMemoryMediaRepository::new();
        let a = repo.insert(asset("u1")).await.unwrap();

        let (start, snapshot) = repo.begin_analysis(a.id, false).await.unwrap();
        assert_eq!(start, AnalysisStart::Started);
        assert_eq!(snapshot.status, MediaStatus::Analyzing);
        let job_id = snapshot.current_job.unwrap();

        let envelope = crate::AnalysisEnvelope::new(AnalysisResult::default(), "test", None);
        repo.complete(a.id, job_id, envelope).await.unwrap();
        let stored = repo.get(a.id).await.unwrap();
        assert_eq!(stored.status, MediaStatus::Completed);
        assert!(stored.current_job.is_none());

        let (start, _) = repo.begin_analysis(a.id, false).await.unwrap();
        assert_eq!(start, AnalysisStart::AlreadyCompleted);
    }

    #[tokio::test]
    async fn test_fail_flow() {
        let repo = InMemoryMediaRepository::new();
        let a = repo.insert(asset("u1")).await.unwrap();
        let (_, snapshot) = repo.begin_analysis(a.id, false).await.unwrap();
        repo.fail(a.id, snapshot.current_job.unwrap(), "permission denied")
            .await
            .unwrap();

        let stored = repo.get(a.id).await.unwrap();
        assert_eq!(stored.status, MediaStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("permission denied"));
    }

    #[tokio::test]
    async fn test_forced_restart_supersedes_running_job() {
        let repo = InMemoryMediaRepository::new();
        let a = repo.insert(asset("u1")).await.unwrap();

        let (_, first) = repo.begin_analysis(a.id, false).await.unwrap();
        let (start, second) = repo.begin_analysis(a.id, true).await.unwrap();
        assert_eq!(start, AnalysisStart::Started);
        let (stale, current) = (first.current_job.unwrap(), second.current_job.unwrap());
        assert_ne!(stale, current);

        let envelope = |strategy: &str| crate::AnalysisEnvelope::new(AnalysisResult::default(), strategy, None);
        let err = repo.complete(a.id, stale, envelope("stale")).await.unwrap_err();
        assert!(matches!(err, Error::Superseded(_)));
        let err = repo.fail(a.id, stale, "late failure").await.unwrap_err();
        assert!(matches!(err, Error::Superseded(_)));
        assert_eq!(repo.get(a.id).await.unwrap().status, MediaStatus::Analyzing);

        repo.complete(a.id, current, envelope("current")).await.unwrap();
        let stored = repo.get(a.id).await.unwrap();
        assert_eq!(stored.status, MediaStatus::Completed);
        assert_eq!(stored.result.unwrap().strategy, "current");

        // Once completed, a late outcome from the stale job changes nothing.
        assert!(repo.fail(a.id, stale, "late failure").await.is_err());
        assert_eq!(repo.get(a.id).await.unwrap().status, MediaStatus::Completed);
    }
}
