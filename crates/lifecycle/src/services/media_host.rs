//! Media host trait and in-memory implementation.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::PhotoUpload;

use crate::error::MediaHostError;

/// Where to send image bytes for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
}

/// A hosted image that a post can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRef {
    pub owner_id: i64,
    pub id: i64,
}

impl fmt::Display for MediaRef {
    /// Attachment form used by `wall.post`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "photo{}_{}", self.owner_id, self.id)
    }
}

/// Hosts images and publishes posts to a community wall.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Acquires a target for a single upload.
    async fn upload_target(&self, group_id: i64) -> Result<UploadTarget, MediaHostError>;

    /// Sends image bytes to `target` and saves them as a wall photo.
    async fn upload(
        &self,
        target: &UploadTarget,
        group_id: i64,
        image: &PhotoUpload,
    ) -> Result<MediaRef, MediaHostError>;

    /// Publishes a post on behalf of the community and returns its id.
    async fn publish(
        &self,
        group_id: i64,
        message: &str,
        attachments: &[MediaRef],
    ) -> Result<i64, MediaHostError>;
}

#[async_trait]
impl<T: MediaHost + ?Sized> MediaHost for Arc<T> {
    async fn upload_target(&self, group_id: i64) -> Result<UploadTarget, MediaHostError> {
        (**self).upload_target(group_id).await
    }

    async fn upload(
        &self,
        target: &UploadTarget,
        group_id: i64,
        image: &PhotoUpload,
    ) -> Result<MediaRef, MediaHostError> {
        (**self).upload(target, group_id, image).await
    }

    async fn publish(
        &self,
        group_id: i64,
        message: &str,
        attachments: &[MediaRef],
    ) -> Result<i64, MediaHostError> {
        (**self).publish(group_id, message, attachments).await
    }
}

/// A post recorded by [`InMemoryMediaHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedPost {
    pub post_id: i64,
    pub group_id: i64,
    pub message: String,
    pub attachments: Vec<String>,
}

#[derive(Debug, Default)]
struct InMemoryMediaHostState {
    failing_uploads: HashSet<String>,
    fail_publish: bool,
    upload_delay: Option<Duration>,
    upload_attempts: usize,
    publish_attempts: usize,
    next_photo_id: i64,
    posts: Vec<HostedPost>,
}

/// In-memory media host for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaHost {
    state: Arc<RwLock<InMemoryMediaHostState>>,
}

impl InMemoryMediaHost {
    /// Creates a new in-memory media host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes uploads of the file named `filename` fail.
    pub fn fail_upload_of(&self, filename: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .failing_uploads
            .insert(filename.into());
    }

    /// Configures the host to reject posts.
    pub fn set_fail_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_publish = fail;
    }

    /// Delays every upload by `delay`.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.state.write().unwrap().upload_delay = Some(delay);
    }

    /// Returns the number of upload attempts.
    pub fn upload_attempts(&self) -> usize {
        self.state.read().unwrap().upload_attempts
    }

    /// Returns the number of publish attempts, including rejected ones.
    pub fn publish_attempts(&self) -> usize {
        self.state.read().unwrap().publish_attempts
    }

    /// Returns every accepted post, oldest first.
    pub fn posts(&self) -> Vec<HostedPost> {
        self.state.read().unwrap().posts.clone()
    }

    /// Returns the number of external calls of any kind.
    pub fn call_count(&self) -> usize {
        let state = self.state.read().unwrap();
        state.upload_attempts + state.publish_attempts
    }
}

#[async_trait]
impl MediaHost for InMemoryMediaHost {
    async fn upload_target(&self, group_id: i64) -> Result<UploadTarget, MediaHostError> {
        Ok(UploadTarget {
            upload_url: format!("memory://upload/{}", group_id.unsigned_abs()),
        })
    }

    async fn upload(
        &self,
        _target: &UploadTarget,
        group_id: i64,
        image: &PhotoUpload,
    ) -> Result<MediaRef, MediaHostError> {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.upload_attempts += 1;
            state.upload_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.failing_uploads.contains(&image.filename) {
            return Err(MediaHostError::Api {
                code: 129,
                message: format!("Invalid photo: {}", image.filename),
            });
        }
        state.next_photo_id += 1;
        Ok(MediaRef {
            owner_id: -group_id.abs(),
            id: state.next_photo_id,
        })
    }

    async fn publish(
        &self,
        group_id: i64,
        message: &str,
        attachments: &[MediaRef],
    ) -> Result<i64, MediaHostError> {
        let mut state = self.state.write().unwrap();
        state.publish_attempts += 1;
        if state.fail_publish {
            return Err(MediaHostError::Api {
                code: 214,
                message: "Access to adding post denied".to_string(),
            });
        }

        let post_id = state.posts.len() as i64 + 1;
        state.posts.push(HostedPost {
            post_id,
            group_id,
            message: message.to_string(),
            attachments: attachments.iter().map(MediaRef::to_string).collect(),
        });
        Ok(post_id)
    }
}
