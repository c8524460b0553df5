use chrono::{DateTime, SecondsFormat, Utc};
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

/// Single-channel 8-bit raster (rows x cols)
pub type IntensityGrid = Array2<u8>;

/// Geographic point supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting non-finite or out-of-range coordinates.
    ///
    /// A coordinate of exactly `0.0` is valid (equator / prime meridian).
    pub fn new(latitude: f64, longitude: f64) -> SarResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(SarError::Validation(format!(
                "latitude must be within [-90, 90], got {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(SarError::Validation(format!(
                "longitude must be within [-180, 180], got {}",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Coordinate reference systems understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// WGS84 geographic, degrees (EPSG:4326)
    Wgs84,
    /// Web Mercator, meters (EPSG:3857)
    WebMercator,
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
        }
    }

    /// OGC URI used by the provider to identify the CRS
    pub fn uri(&self) -> String {
        format!("http://www.opengis.net/def/crs/EPSG/0/{}", self.epsg())
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Axis-aligned query region tagged with its CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub crs: Crs,
}

impl BoundingBox {
    /// Create a bounding box, enforcing `min < max` on both axes
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> SarResult<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(SarError::Validation(format!(
                "degenerate bounding box [{}, {}, {}, {}] in {}",
                min_x, min_y, max_x, max_y, crs
            )));
        }
        Ok(Self { min_x, min_y, max_x, max_y, crs })
    }

    /// Geographic box extending `margin` degrees on each side of `point`
    pub fn around(point: &GeoPoint, margin: f64) -> SarResult<Self> {
        if margin.is_nan() || margin <= 0.0 {
            return Err(SarError::Validation(format!(
                "bounding box margin must be positive, got {}",
                margin
            )));
        }
        Self::new(
            point.longitude - margin,
            point.latitude - margin,
            point.longitude + margin,
            point.latitude + margin,
            Crs::Wgs84,
        )
    }

    /// `[min_x, min_y, max_x, max_y]`, the order the provider expects
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Acquisition time interval, `from < to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// RFC 3339 rendering with an explicit `+00:00` offset
    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.to - self.from
    }
}

/// Polarization channels of Sentinel-1 GRD products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl std::str::FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(SarError::Config(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Everything the provider needs for one imagery query
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryRequestSpec {
    /// Query region, in a projected CRS
    pub bbox: BoundingBox,
    pub time_window: TimeWindow,
    pub output_width: u32,
    pub output_height: u32,
    pub band: Polarization,
}

/// Raster decoded from the provider response
#[derive(Debug, Clone, PartialEq)]
pub struct RawImagery {
    pub pixels: IntensityGrid,
}

impl RawImagery {
    /// Decode an encoded image (PNG, ...) into a single-channel raster
    pub fn from_encoded(bytes: &[u8]) -> SarResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| SarError::ImageLoad(format!("failed to decode raster: {}", e)))?;
        let gray = decoded.to_luma8();
        let (width, height) = gray.dimensions();
        let pixels = Array2::from_shape_vec((height as usize, width as usize), gray.into_raw())
            .map_err(|e| SarError::ImageLoad(format!("failed to reshape raster: {}", e)))?;
        if pixels.is_empty() {
            return Err(SarError::ImageLoad("decoded raster is empty".to_string()));
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }
}

/// Output of the enhancement chain; never shares a buffer with its input
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedImagery {
    pub pixels: IntensityGrid,
}

impl EnhancedImagery {
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Encode as an 8-bit grayscale PNG
    pub fn to_png(&self) -> SarResult<Vec<u8>> {
        let (height, width) = self.pixels.dim();
        let raw: Vec<u8> = self.pixels.iter().copied().collect();
        let gray = image::GrayImage::from_raw(width as u32, height as u32, raw)
            .ok_or_else(|| SarError::ImageLoad("raster buffer does not match its dimensions".to_string()))?;

        let mut encoded = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut encoded, image::ImageOutputFormat::Png)
            .map_err(|e| SarError::ImageLoad(format!("failed to encode PNG: {}", e)))?;
        Ok(encoded.into_inner())
    }
}

/// Provider metadata, kept as an uninterpreted text blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub String);

impl Metadata {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Model input tensor, shape (1, 1, H, W), values in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTensor {
    pub values: Array4<f32>,
}

impl ModelTensor {
    pub fn shape(&self) -> [usize; 4] {
        let (n, c, h, w) = self.values.dim();
        [n, c, h, w]
    }
}

/// Error types for acquisition and preprocessing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Imagery request rejected with HTTP {status}")]
    Request { status: u16, body: String },

    #[error("Provider call timed out: {0}")]
    Timeout(String),

    #[error("Provider unreachable: {0}")]
    Transport(String),

    #[error("Unrecognized response framing: {0}")]
    Decode(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SarError {
    /// HTTP status reported to callers of the endpoint
    pub fn status_code(&self) -> u16 {
        match self {
            SarError::Validation(_) | SarError::Projection(_) => 400,
            SarError::Auth(_)
            | SarError::Request { .. }
            | SarError::Decode(_)
            | SarError::Transport(_) => 502,
            SarError::Timeout(_) => 504,
            SarError::ImageLoad(_) | SarError::Io(_) | SarError::Config(_) => 500,
        }
    }
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_coordinates_are_valid() {
        let point = GeoPoint::new(0.0, 0.0).unwrap();
        assert_eq!(point.latitude, 0.0);
        assert_eq!(point.longitude, 0.0);
    }

    #[test]
    fn test_out_of_range_point_rejected() {
        assert!(matches!(GeoPoint::new(90.5, 0.0), Err(SarError::Validation(_))));
        assert!(matches!(GeoPoint::new(10.0, -180.1), Err(SarError::Validation(_))));
        assert!(matches!(GeoPoint::new(f64::NAN, 1.0), Err(SarError::Validation(_))));
    }

    #[test]
    fn test_bbox_around_point() {
        let point = GeoPoint::new(37.7749, -122.4194).unwrap();
        let bbox = BoundingBox::around(&point, 0.05).unwrap();

        assert_eq!(bbox.crs, Crs::Wgs84);
        approx::assert_abs_diff_eq!(bbox.min_x, -122.4694, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(bbox.min_y, 37.7249, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(bbox.max_x, -122.3694, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(bbox.max_y, 37.8249, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_bbox_rejected() {
        assert!(BoundingBox::new(1.0, 0.0, 1.0, 2.0, Crs::Wgs84).is_err());
        assert!(BoundingBox::new(0.0, 3.0, 1.0, 2.0, Crs::Wgs84).is_err());
    }

    #[test]
    fn test_crs_uri() {
        assert_eq!(Crs::WebMercator.uri(), "http://www.opengis.net/def/crs/EPSG/0/3857");
        assert_eq!(format!("{}", Crs::Wgs84), "EPSG:4326");
    }

    #[test]
    fn test_polarization_parse() {
        assert_eq!("vh".parse::<Polarization>().unwrap(), Polarization::VH);
        assert!("XX".parse::<Polarization>().is_err());
    }

    #[test]
    fn test_enhanced_png_decodes_back() {
        let pixels = Array2::from_shape_fn((4, 6), |(i, j)| (i * 40 + j) as u8);
        let enhanced = EnhancedImagery { pixels: pixels.clone() };
        let png = enhanced.to_png().unwrap();

        let raw = RawImagery::from_encoded(&png).unwrap();
        assert_eq!(raw.width(), 6);
        assert_eq!(raw.height(), 4);
        assert_eq!(raw.pixels, pixels);
    }

    #[test]
    fn test_garbage_bytes_fail_to_load() {
        let result = RawImagery::from_encoded(b"definitely not a png");
        assert!(matches!(result, Err(SarError::ImageLoad(_))));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(SarError::Validation("x".into()).status_code(), 400);
        assert_eq!(SarError::Timeout("x".into()).status_code(), 504);
        assert_eq!(SarError::Request { status: 400, body: String::new() }.status_code(), 502);
    }
}
