//! I/O modules for talking to the imagery provider and persisting images

pub mod provider;
pub mod multipart;
pub mod artifacts;
pub mod client;

pub use provider::{AccessToken, ImageryProvider, ProviderResponse, SentinelHubProvider};
pub use multipart::{decode_response, DecodedResponse};
pub use artifacts::{ArtifactId, ArtifactStore};
pub use client::ImageryClient;
