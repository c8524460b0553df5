//! Core acquisition and preprocessing stages

pub mod projection;
pub mod time_window;
pub mod enhance;
pub mod normalize;
pub mod pipeline;

// Re-export main types
pub use projection::{CoordinateProjector, lon_lat_to_mercator, mercator_to_lon_lat};
pub use time_window::{TimeWindowSelector, LOOKBACK_DAYS};
pub use enhance::{EnhancementPipeline, EnhancementParams, Clahe, equalize_histogram, median_filter};
pub use normalize::{TensorNormalizer, resize_bilinear, normalize_value, denormalize_value};
pub use pipeline::{PipelineOrchestrator, PipelineStage, PipelineFailure, PipelineResult};
