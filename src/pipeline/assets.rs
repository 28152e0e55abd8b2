//! Asset extraction and upload seams.
//!
//! When a cloud provider is selected the orchestrator runs two steps before
//! generation: pull figures out of the PDF, then push them to the cloud host.
//! Neither is implemented for real yet. The defaults ([`PlaceholderExtractor`],
//! [`PlaceholderUploader`]) wait a fixed duration and produce nothing, which
//! keeps the user-visible step sequence intact. Real cloud clients implement
//! the same traits and are injected through
//! [`crate::orchestrator::Orchestrator::with_assets`].

use crate::config::CloudConfig;
use crate::error::BackendError;
use crate::request::PdfPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sequential image file name used in `\includegraphics` references.
///
/// `index` is 1-based: `1 → "image_01.png"`, `12 → "image_12.png"`.
pub fn sequential_image_name(index: usize) -> String {
    format!("image_{:02}.png", index)
}

/// A figure pulled out of the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAsset {
    /// Sequential name, see [`sequential_image_name`].
    pub file_name: String,
    /// 1-based page the figure was found on.
    pub page: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// A figure reachable at a public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub file_name: String,
    pub url: String,
}

/// Pulls figures out of a PDF.
#[async_trait]
pub trait AssetExtractor: Send + Sync {
    async fn extract(&self, payload: &PdfPayload) -> Result<Vec<ExtractedAsset>, BackendError>;
}

/// Publishes extracted figures to the configured cloud host.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(
        &self,
        assets: &[ExtractedAsset],
        cloud: &CloudConfig,
    ) -> Result<Vec<UploadedAsset>, BackendError>;
}

/// Fixed-duration stand-in for real extraction. Finds nothing.
#[derive(Debug, Clone)]
pub struct PlaceholderExtractor {
    delay: Duration,
}

impl PlaceholderExtractor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AssetExtractor for PlaceholderExtractor {
    async fn extract(&self, payload: &PdfPayload) -> Result<Vec<ExtractedAsset>, BackendError> {
        debug!("Placeholder extraction for '{}' ({:?})", payload.name(), self.delay);
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

/// Fixed-duration stand-in for a real cloud upload.
///
/// Reports every asset it is given as published under the configured prefix,
/// without transferring anything.
#[derive(Debug, Clone)]
pub struct PlaceholderUploader {
    delay: Duration,
}

impl PlaceholderUploader {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AssetUploader for PlaceholderUploader {
    async fn upload(
        &self,
        assets: &[ExtractedAsset],
        cloud: &CloudConfig,
    ) -> Result<Vec<UploadedAsset>, BackendError> {
        debug!(
            "Placeholder upload of {} assets to {} ({:?})",
            assets.len(),
            cloud.provider.display_name(),
            self.delay
        );
        tokio::time::sleep(self.delay).await;
        let prefix = cloud.image_url_prefix().unwrap_or("");
        Ok(assets
            .iter()
            .map(|a| UploadedAsset {
                file_name: a.file_name.clone(),
                url: format!("{}/{}", prefix, a.file_name),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudProvider;
    use crate::pipeline::input::accept_upload;

    #[test]
    fn sequential_names_are_zero_padded() {
        assert_eq!(sequential_image_name(1), "image_01.png");
        assert_eq!(sequential_image_name(9), "image_09.png");
        assert_eq!(sequential_image_name(10), "image_10.png");
        assert_eq!(sequential_image_name(123), "image_123.png");
    }

    #[tokio::test]
    async fn placeholder_extractor_finds_nothing() {
        let p = accept_upload("a.pdf", "application/pdf", b"%PDF".to_vec()).unwrap();
        let found = PlaceholderExtractor::new(Duration::ZERO).extract(&p).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn placeholder_uploader_roots_urls_at_prefix() {
        let cloud = CloudConfig::new(CloudProvider::GoogleDrive, "https://example.com/imgs/");
        let assets = vec![ExtractedAsset {
            file_name: sequential_image_name(1),
            page: 1,
            data: vec![1, 2, 3],
        }];
        let up = PlaceholderUploader::new(Duration::ZERO)
            .upload(&assets, &cloud)
            .await
            .unwrap();
        assert_eq!(up[0].url, "https://example.com/imgs/image_01.png");
    }
}
