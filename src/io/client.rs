use crate::io::artifacts::{ArtifactId, ArtifactStore};
use crate::io::multipart::decode_response;
use crate::io::provider::{AccessToken, ImageryProvider};
use crate::types::{ImageryRequestSpec, Metadata, RawImagery, SarResult};
use std::sync::Arc;

/// Authenticates against the provider, fetches imagery, decodes the reply
/// and persists the raw image.
#[derive(Clone)]
pub struct ImageryClient {
    provider: Arc<dyn ImageryProvider>,
    store: ArtifactStore,
}

impl ImageryClient {
    pub fn new(provider: Arc<dyn ImageryProvider>, store: ArtifactStore) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Obtain a bearer token; no retry
    pub fn authenticate(&self) -> SarResult<AccessToken> {
        self.provider.authenticate()
    }

    /// Fetch and decode imagery for `spec`, writing the raw image under `id`
    pub fn fetch_imagery(
        &self,
        spec: &ImageryRequestSpec,
        token: &AccessToken,
        id: &ArtifactId,
    ) -> SarResult<(RawImagery, Option<Metadata>)> {
        let response = self.provider.fetch_imagery(spec, token)?;
        let decoded = decode_response(&response.content_type, &response.body)?;

        self.store.write_raw(id, &decoded.image)?;
        let raw = match RawImagery::from_encoded(&decoded.image) {
            Ok(raw) => raw,
            Err(e) => {
                // Only decodable images are kept
                if let Err(cleanup) = self.store.remove_raw(id) {
                    log::warn!("Failed to remove undecodable raw image {}: {}", id, cleanup);
                }
                return Err(e);
            }
        };

        log::info!(
            "Decoded {}x{} raster{}",
            raw.width(),
            raw.height(),
            if decoded.metadata.is_some() { " with metadata" } else { "" }
        );
        Ok((raw, decoded.metadata))
    }
}
