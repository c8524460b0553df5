//! sarprep: Sentinel-1 acquisition and model preprocessing
//!
//! Given a latitude/longitude, this library derives a Web Mercator query box
//! and a one-year time window, fetches a single-band radar image from the
//! provider, enhances it (histogram equalization, median denoise, CLAHE) and
//! turns it into a `(1, 1, 256, 256)` tensor scaled to `[-1, 1]`.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod server;

// Re-export main types and functions for easier access
pub use types::{
    GeoPoint, BoundingBox, Crs, TimeWindow, Polarization, ImageryRequestSpec,
    RawImagery, EnhancedImagery, Metadata, ModelTensor, SarError, SarResult
};

pub use config::{PipelineConfig, ProviderConfig};
pub use io::{ImageryClient, ImageryProvider, SentinelHubProvider, ArtifactStore, ArtifactId};
pub use crate::core::{PipelineOrchestrator, PipelineResult, PipelineFailure, PipelineStage};
