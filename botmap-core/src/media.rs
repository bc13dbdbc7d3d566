//! Media artifact retrieval boundary.

use async_trait::async_trait;

use crate::error::MediaError;
use crate::update::{MediaHandle, MediaRef};

/// Retrieves the artifact behind a provider media reference.
///
/// Fetch failures are never fatal: callers degrade to "no media" and log.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<MediaHandle, MediaError>;
}
