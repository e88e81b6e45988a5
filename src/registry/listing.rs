use anyhow::Result;
use async_trait::async_trait;

use crate::registry::models::ImageRecord;

/// Provider-specific image enumeration.
///
/// Implementations own pagination and response parsing for their registry API
/// and return the complete, materialized list of images in `namespace`.
#[async_trait]
pub trait ImageLister: Send + Sync {
    async fn list_images(
        &self,
        username: &str,
        password: &str,
        namespace: &str,
    ) -> Result<Vec<ImageRecord>>;
}
