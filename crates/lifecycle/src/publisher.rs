//! Best-effort media upload followed by a single post.

use std::time::Duration;

use domain::PhotoUpload;
use futures_util::future::join_all;

use crate::error::MediaHostError;
use crate::services::media_host::{MediaHost, MediaRef};

/// Result of uploading one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(MediaRef),
    Failed { filename: String, reason: String },
}

/// Per-image outcomes of one upload batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadBatch {
    /// References of the images that made it to the host.
    pub fn successes(&self) -> Vec<MediaRef> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                UploadOutcome::Uploaded(media) => Some(*media),
                UploadOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Failed { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// A post that was accepted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub post_id: i64,
    pub attachments: Vec<MediaRef>,

    /// Images dropped because their upload failed.
    pub failed_uploads: usize,
}

/// Uploads images and publishes a post that references the ones that
/// succeeded.
pub struct MediaPublisher<H: MediaHost> {
    host: H,
    upload_timeout: Duration,
    publish_timeout: Duration,
}

impl<H: MediaHost> MediaPublisher<H> {
    /// Default bound on each upload and on the publish call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(host: H, timeout: Duration) -> Self {
        Self {
            host,
            upload_timeout: timeout,
            publish_timeout: timeout,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Uploads every image concurrently. Failures are recorded per image and
    /// never abort the batch.
    #[tracing::instrument(skip(self, images), fields(images = images.len()))]
    pub async fn upload_all(&self, group_id: i64, images: &[PhotoUpload]) -> UploadBatch {
        let results = join_all(images.iter().map(|image| self.upload_one(group_id, image))).await;

        let outcomes = images
            .iter()
            .zip(results)
            .map(|(image, result)| match result {
                Ok(media) => {
                    metrics::counter!("media_uploads_total", "outcome" => "uploaded").increment(1);
                    UploadOutcome::Uploaded(media)
                }
                Err(e) => {
                    metrics::counter!("media_uploads_total", "outcome" => "failed").increment(1);
                    tracing::warn!(filename = %image.filename, error = %e, "photo upload failed, skipping");
                    UploadOutcome::Failed {
                        filename: image.filename.clone(),
                        reason: e.to_string(),
                    }
                }
            })
            .collect();

        UploadBatch { outcomes }
    }

    async fn upload_one(&self, group_id: i64, image: &PhotoUpload) -> Result<MediaRef, MediaHostError> {
        let upload = async {
            let target = self.host.upload_target(group_id).await?;
            self.host.upload(&target, group_id, image).await
        };
        tokio::time::timeout(self.upload_timeout, upload)
            .await
            .map_err(|_| MediaHostError::Timeout(self.upload_timeout))?
    }

    /// Uploads `images` best-effort, then publishes `text` with whatever
    /// uploaded. Only the publish call itself can fail the operation.
    #[tracing::instrument(skip(self, text, images), fields(images = images.len()))]
    pub async fn upload_and_publish(
        &self,
        text: &str,
        group_id: i64,
        images: &[PhotoUpload],
    ) -> Result<PublishedPost, MediaHostError> {
        let batch = self.upload_all(group_id, images).await;
        let attachments = batch.successes();

        let post_id = tokio::time::timeout(
            self.publish_timeout,
            self.host.publish(group_id, text, &attachments),
        )
        .await
        .map_err(|_| MediaHostError::Timeout(self.publish_timeout))??;

        tracing::info!(
            post_id,
            attached = attachments.len(),
            failed = batch.failure_count(),
            "post published"
        );

        Ok(PublishedPost {
            post_id,
            attachments,
            failed_uploads: batch.failure_count(),
        })
    }
}
