use crate::config::ProviderConfig;
use crate::types::{ImageryRequestSpec, Polarization, SarError, SarResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

/// Bearer credential issued by the authorization endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Undecoded reply of the processing endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Remote imagery provider
///
/// This is the only network boundary of the pipeline; tests swap in a
/// scripted implementation.
pub trait ImageryProvider: Send + Sync {
    /// Exchange client credentials for a token
    fn authenticate(&self) -> SarResult<AccessToken>;

    /// Submit one imagery query
    fn fetch_imagery(&self, spec: &ImageryRequestSpec, token: &AccessToken) -> SarResult<ProviderResponse>;
}

/// Process API request body
#[derive(Debug, Serialize)]
pub struct ProcessRequest {
    pub input: ProcessInput,
    pub evalscript: String,
    pub responses: Vec<ResponseSpec>,
    pub output: OutputSize,
}

#[derive(Debug, Serialize)]
pub struct ProcessInput {
    pub bounds: Bounds,
    pub data: Vec<DataSource>,
}

#[derive(Debug, Serialize)]
pub struct Bounds {
    pub bbox: [f64; 4],
    pub properties: BoundsProperties,
}

#[derive(Debug, Serialize)]
pub struct BoundsProperties {
    pub crs: String,
}

#[derive(Debug, Serialize)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub collection: String,
    #[serde(rename = "dataFilter")]
    pub data_filter: DataFilter,
}

#[derive(Debug, Serialize)]
pub struct DataFilter {
    #[serde(rename = "timeRange")]
    pub time_range: TimeRange,
}

#[derive(Debug, Serialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseSpec {
    pub identifier: String,
    pub format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub media_type: String,
}

#[derive(Debug, Serialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Sentinel-1 GRD collection identifier
pub const S1_GRD_COLLECTION: &str = "S1GRD";

/// Evaluation script emitting `band` as the single output channel
pub fn evalscript(band: Polarization) -> String {
    format!(
        r#"//VERSION=3
function setup() {{
    return {{
        input: ["{band}"],
        output: {{ bands: 1 }}
    }};
}}

function evaluatePixel(sample) {{
    return [sample.{band}];
}}
"#,
        band = band
    )
}

impl ProcessRequest {
    /// Body for `spec`: an image part plus a JSON metadata part
    pub fn from_spec(spec: &ImageryRequestSpec) -> Self {
        Self {
            input: ProcessInput {
                bounds: Bounds {
                    bbox: spec.bbox.to_array(),
                    properties: BoundsProperties { crs: spec.bbox.crs.uri() },
                },
                data: vec![DataSource {
                    collection: S1_GRD_COLLECTION.to_string(),
                    data_filter: DataFilter {
                        time_range: TimeRange {
                            from: spec.time_window.from_rfc3339(),
                            to: spec.time_window.to_rfc3339(),
                        },
                    },
                }],
            },
            evalscript: evalscript(spec.band),
            responses: vec![
                ResponseSpec {
                    identifier: "default".to_string(),
                    format: ResponseFormat { media_type: "image/png".to_string() },
                },
                ResponseSpec {
                    identifier: "userdata".to_string(),
                    format: ResponseFormat { media_type: "application/json".to_string() },
                },
            ],
            output: OutputSize {
                width: spec.output_width,
                height: spec.output_height,
            },
        }
    }
}

/// Sentinel Hub OAuth + Process API client (blocking)
pub struct SentinelHubProvider {
    config: ProviderConfig,
    client: reqwest::blocking::Client,
}

impl SentinelHubProvider {
    pub fn new(config: ProviderConfig) -> SarResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("sarprep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SarError::Config(format!("Failed to create HTTP client: {}", e)))?;

        log::debug!("Provider configuration: {:?}", config);
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

fn transport_error(context: &str, e: reqwest::Error) -> SarError {
    if e.is_timeout() {
        SarError::Timeout(format!("{}: {}", context, e))
    } else {
        SarError::Transport(format!("{}: {}", context, e))
    }
}

impl ImageryProvider for SentinelHubProvider {
    fn authenticate(&self) -> SarResult<AccessToken> {
        log::info!("Requesting access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.config.auth_url)
            .form(&params)
            .send()
            .map_err(|e| transport_error("token request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| transport_error("failed to read token response", e))?;

        if !status.is_success() {
            return Err(SarError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SarError::Auth(format!("token response is not valid JSON: {}", e)))?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                log::info!("Access token obtained");
                Ok(AccessToken(token))
            }
            _ => Err(SarError::Auth("token response has no access_token".to_string())),
        }
    }

    fn fetch_imagery(&self, spec: &ImageryRequestSpec, token: &AccessToken) -> SarResult<ProviderResponse> {
        log::info!(
            "Requesting {} imagery for {:?} ({} to {})",
            spec.band,
            spec.bbox.to_array(),
            spec.time_window.from_rfc3339(),
            spec.time_window.to_rfc3339()
        );

        let request = ProcessRequest::from_spec(spec);
        let response = self
            .client
            .post(&self.config.process_url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "multipart/mixed")
            .json(&request)
            .send()
            .map_err(|e| transport_error("imagery request failed", e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !status.is_success() {
            // A stalled rejection body is still a timeout
            let body = response
                .text()
                .map_err(|e| transport_error("failed to read rejection body", e))?;
            log::warn!("Imagery request rejected with HTTP {}", status.as_u16());
            return Err(SarError::Request {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .map_err(|e| transport_error("failed to read imagery response", e))?;
        log::info!("Received {} bytes ({})", body.len(), content_type);

        Ok(ProviderResponse {
            content_type,
            body: body.to_vec(),
        })
    }
}
