//! Ingestion orchestrator: parse, normalize, extract credits, store blobs,
//! then commit the catalog transaction. A file that fails after its blobs
//! were stored gets them deleted again; a failed file never aborts the rest
//! of its batch.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{CatalogDb, IngestedTrack, NewTrackFile};
use crate::credits::{extract_credits, CreditEntry};
use crate::normalize::{normalize, NormalizedTrack};
use crate::storage::{StorageBackend, StorageCategory};
use crate::tags::TagReader;

/// One file received from the upload endpoint.
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestSuccess {
    pub id: i64,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub tracks: Vec<IngestSuccess>,
    pub failures: Vec<IngestFailure>,
}

#[derive(Clone)]
pub struct Ingestor {
    db: CatalogDb,
    storage: Arc<dyn StorageBackend>,
    tags: Arc<dyn TagReader>,
}

impl Ingestor {
    pub fn new(db: CatalogDb, storage: Arc<dyn StorageBackend>, tags: Arc<dyn TagReader>) -> Self {
        Self { db, storage, tags }
    }

    /// Processes files sequentially in input order. Results keep that order:
    /// successes and failures each list files as they arrived.
    pub async fn ingest_batch(&self, files: Vec<UploadedFile>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for file in files {
            let file_name = file.file_name.clone();
            match self.ingest_one(file).await {
                Ok(success) => {
                    tracing::info!(file = %file_name, track_id = success.id, "ingested track");
                    outcome.tracks.push(success);
                }
                Err(err) => {
                    tracing::warn!(file = %file_name, error = %format!("{err:#}"), "file ingestion failed");
                    outcome.failures.push(IngestFailure { file_name, error: format!("{err:#}") });
                }
            }
        }
        outcome
    }

    async fn ingest_one(&self, file: UploadedFile) -> Result<IngestSuccess> {
        let parsed = self.tags.parse(&file.bytes, &file.file_name)?;
        let track = normalize(&parsed, &file.file_name);
        let credits = extract_credits(&parsed);
        let file_size = file.bytes.len() as i64;

        let audio_locator = self
            .storage
            .upload(&file.bytes, &file.file_name, StorageCategory::Tracks)
            .await?;

        let mut cover_locator: Option<String> = None;
        match self
            .commit_file(&track, &credits, &audio_locator, &mut cover_locator, file_size)
            .await
        {
            Ok(ingested) => Ok(IngestSuccess {
                id: ingested.id,
                title: ingested.title,
                artists: track.artists,
                album: track.album,
            }),
            Err(err) => {
                tracing::error!(
                    file = %file.file_name,
                    error = %format!("{err:#}"),
                    "ingest failed after upload, removing stored blobs"
                );
                self.remove_blob(&audio_locator).await;
                if let Some(cover) = &cover_locator {
                    self.remove_blob(cover).await;
                }
                Err(err)
            }
        }
    }

    /// The part of the pipeline whose failure requires blob compensation:
    /// cover upload plus the catalog transaction.
    async fn commit_file(
        &self,
        track: &NormalizedTrack,
        credits: &[CreditEntry],
        audio_locator: &str,
        cover_locator: &mut Option<String>,
        file_size: i64,
    ) -> Result<IngestedTrack> {
        if let Some(cover) = &track.cover {
            let locator = self
                .storage
                .upload(&cover.data, &cover.file_name, StorageCategory::Covers)
                .await?;
            *cover_locator = Some(locator);
        }
        self.db.ingest_file(&NewTrackFile {
            track,
            file_path: audio_locator,
            cover_path: cover_locator.as_deref(),
            file_size,
            credits,
        })
    }

    /// Cleanup failures are logged with the locator but never override the
    /// error that triggered the compensation.
    async fn remove_blob(&self, locator: &str) {
        if let Err(cleanup_err) = self.storage.delete(locator).await {
            tracing::warn!(
                locator = %locator,
                error = %format!("{cleanup_err:#}"),
                "compensating storage delete failed"
            );
        }
    }
}
