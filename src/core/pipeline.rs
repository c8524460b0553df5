use crate::config::PipelineConfig;
use crate::core::enhance::EnhancementPipeline;
use crate::core::normalize::TensorNormalizer;
use crate::core::projection::CoordinateProjector;
use crate::core::time_window::TimeWindowSelector;
use crate::io::{ArtifactId, ArtifactStore, ImageryClient, ImageryProvider};
use crate::types::{
    BoundingBox, Crs, GeoPoint, ImageryRequestSpec, Metadata, ModelTensor, SarError, SarResult,
    TimeWindow,
};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Progress of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Authenticated,
    Fetched,
    Enhanced,
    Normalized,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::Authenticated => "authenticated",
            PipelineStage::Fetched => "fetched",
            PipelineStage::Enhanced => "enhanced",
            PipelineStage::Normalized => "normalized",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal failure: the last stage reached and what went wrong after it
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed at stage '{stage}': {cause}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub cause: SarError,
}

impl PipelineFailure {
    fn at(stage: PipelineStage) -> impl FnOnce(SarError) -> Self {
        move |cause| Self { stage, cause }
    }
}

/// Everything a successful run hands back
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub artifact_id: ArtifactId,
    /// Persisted enhanced PNG
    pub enhanced_image_path: PathBuf,
    pub tensor: ModelTensor,
    pub tensor_shape: [usize; 4],
    /// Provider metadata, passed through unvalidated
    pub metadata: Option<Metadata>,
    pub bbox: BoundingBox,
    pub time_window: TimeWindow,
}

/// Runs projection, acquisition, enhancement and normalization for one point
pub struct PipelineOrchestrator {
    client: ImageryClient,
    enhancer: EnhancementPipeline,
    normalizer: TensorNormalizer,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Create an orchestrator, opening the artifact directory
    pub fn new(provider: Arc<dyn ImageryProvider>, config: PipelineConfig) -> SarResult<Self> {
        let store = ArtifactStore::new(&config.artifact_dir)?;
        Ok(Self {
            client: ImageryClient::new(provider, store),
            enhancer: EnhancementPipeline::new(),
            normalizer: TensorNormalizer::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        self.client.store()
    }

    /// Projected query region and time window for `point`
    pub fn build_request(&self, point: &GeoPoint, now: DateTime<Utc>) -> SarResult<ImageryRequestSpec> {
        let geographic = BoundingBox::around(point, self.config.margin_degrees)?;
        let bbox = CoordinateProjector::project(&geographic, Crs::Wgs84, Crs::WebMercator)?;
        let time_window = TimeWindowSelector::window(&now, Duration::days(self.config.lookback_days))?;

        if self.config.output_width == 0 || self.config.output_height == 0 {
            return Err(SarError::Config(format!(
                "output size must be positive, got {}x{}",
                self.config.output_width, self.config.output_height
            )));
        }

        log::info!(
            "Searching {} data from {} to {}",
            self.config.band,
            time_window.from.date_naive(),
            time_window.to.date_naive()
        );

        Ok(ImageryRequestSpec {
            bbox,
            time_window,
            output_width: self.config.output_width,
            output_height: self.config.output_height,
            band: self.config.band,
        })
    }

    /// Run the pipeline with the current time as acquisition instant
    pub fn run(&self, point: &GeoPoint) -> Result<PipelineResult, PipelineFailure> {
        self.run_at(point, Utc::now())
    }

    /// Run the pipeline; any failure short-circuits and nothing partial is returned
    pub fn run_at(&self, point: &GeoPoint, now: DateTime<Utc>) -> Result<PipelineResult, PipelineFailure> {
        let mut stage = PipelineStage::Start;
        log::info!("Pipeline start for ({}, {})", point.latitude, point.longitude);

        let spec = self.build_request(point, now).map_err(PipelineFailure::at(stage))?;

        let token = self.client.authenticate().map_err(PipelineFailure::at(stage))?;
        stage = PipelineStage::Authenticated;
        log::info!("Pipeline stage: {}", stage);

        let artifact_id = ArtifactId::new();
        let (raw, metadata) = self
            .client
            .fetch_imagery(&spec, &token, &artifact_id)
            .map_err(PipelineFailure::at(stage))?;
        stage = PipelineStage::Fetched;
        log::info!("Pipeline stage: {}", stage);

        let enhanced = self.enhancer.enhance(&raw).map_err(PipelineFailure::at(stage))?;
        drop(raw);
        let enhanced_image_path = self
            .client
            .store()
            .write_enhanced(&artifact_id, &enhanced)
            .map_err(PipelineFailure::at(stage))?;
        stage = PipelineStage::Enhanced;
        log::info!("Pipeline stage: {}", stage);

        let tensor = self.normalizer.normalize(&enhanced).map_err(PipelineFailure::at(stage))?;
        stage = PipelineStage::Normalized;
        log::info!("Pipeline stage: {}, tensor shape {:?}", stage, tensor.shape());

        let result = PipelineResult {
            artifact_id,
            enhanced_image_path,
            tensor_shape: tensor.shape(),
            tensor,
            metadata,
            bbox: spec.bbox,
            time_window: spec.time_window,
        };

        stage = PipelineStage::Done;
        log::info!("Pipeline stage: {} (image {})", stage, result.artifact_id);
        Ok(result)
    }
}
