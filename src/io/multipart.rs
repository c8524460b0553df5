//! Decoding of single-part and multi-part imagery responses.

use crate::types::{Metadata, SarError, SarResult};
use regex::Regex;
use std::sync::OnceLock;

/// Image bytes and optional metadata pulled out of a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    /// Encoded image exactly as the provider sent it
    pub image: Vec<u8>,
    pub metadata: Option<Metadata>,
}

/// One body part of a multi-part document
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    /// Value of the part's `Content-Type` header, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// Split a response into image and metadata according to its content type
pub fn decode_response(content_type: &str, body: &[u8]) -> SarResult<DecodedResponse> {
    let media_type = content_type.to_ascii_lowercase();

    if media_type.starts_with("multipart/") {
        let boundary = extract_boundary(content_type)?;
        let parts = parse_multipart(body, &boundary)?;
        log::debug!("Multi-part response with {} parts", parts.len());
        return attribute_parts(parts);
    }

    if media_type.starts_with("image/") {
        log::debug!("Single-part {} response, {} bytes", content_type, body.len());
        return Ok(DecodedResponse {
            image: body.to_vec(),
            metadata: None,
        });
    }

    Err(SarError::Decode(format!(
        "unsupported response content type '{}'",
        content_type
    )))
}

fn attribute_parts(parts: Vec<Part>) -> SarResult<DecodedResponse> {
    let mut image = None;
    let mut metadata = None;

    for part in parts {
        let part_type = part.content_type().unwrap_or("").to_ascii_lowercase();

        if part_type.starts_with("image/") {
            if image.is_some() {
                log::warn!("Ignoring additional image part ({})", part_type);
                continue;
            }
            image = Some(part.body);
        } else if part_type.contains("json") {
            let text = String::from_utf8(part.body)
                .map_err(|e| SarError::Decode(format!("metadata part is not UTF-8: {}", e)))?;
            metadata = Some(Metadata(text));
        } else {
            log::warn!("Skipping part with unexpected content type '{}'", part_type);
        }
    }

    let image = image.ok_or_else(|| {
        SarError::Decode("multi-part response contains no image part".to_string())
    })?;
    Ok(DecodedResponse { image, metadata })
}

fn boundary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)boundary\s*=\s*(?:"([^"]+)"|([^;\s]+))"#).expect("valid boundary pattern")
    })
}

/// Boundary parameter of a `multipart/*` content type
pub fn extract_boundary(content_type: &str) -> SarResult<String> {
    boundary_pattern()
        .captures(content_type)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            SarError::Decode(format!("multi-part content type without boundary: '{}'", content_type))
        })
}

/// Split a multi-part body on `boundary`
///
/// Preamble and epilogue are discarded. Line breaks may be CRLF or bare LF.
pub fn parse_multipart(body: &[u8], boundary: &str) -> SarResult<Vec<Part>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut next_delimiter = b"\n".to_vec();
    next_delimiter.extend_from_slice(&delimiter);

    let mut pos = if body.starts_with(&delimiter) {
        0
    } else {
        find(body, &next_delimiter, 0)
            .map(|i| i + 1)
            .ok_or_else(|| SarError::Decode("multi-part body has no opening boundary".to_string()))?
    };

    let mut parts = Vec::new();
    loop {
        pos += delimiter.len();
        let rest = &body[pos..];
        if rest.is_empty() || rest.starts_with(b"--") {
            break;
        }

        // Transport padding up to the end of the delimiter line
        let line_end = find(body, b"\n", pos)
            .ok_or_else(|| SarError::Decode("truncated multi-part delimiter line".to_string()))?;
        let (headers, content_start) = read_headers(body, line_end + 1)?;

        let content_end = find(body, &next_delimiter, content_start)
            .ok_or_else(|| SarError::Decode("unterminated multi-part body part".to_string()))?;
        let mut content = &body[content_start..content_end];
        if content.last() == Some(&b'\r') {
            content = &content[..content.len() - 1];
        }

        parts.push(Part {
            headers,
            body: content.to_vec(),
        });
        pos = content_end + 1;
    }

    if parts.is_empty() {
        return Err(SarError::Decode("multi-part body has no parts".to_string()));
    }
    Ok(parts)
}

/// Read header lines up to the blank separator line
fn read_headers(body: &[u8], mut pos: usize) -> SarResult<(Vec<(String, String)>, usize)> {
    let mut headers = Vec::new();
    loop {
        let line_end = find(body, b"\n", pos)
            .ok_or_else(|| SarError::Decode("unterminated multi-part headers".to_string()))?;
        let line = String::from_utf8_lossy(&body[pos..line_end]);
        let line = line.trim_end_matches('\r');
        pos = line_end + 1;

        if line.is_empty() {
            return Ok((headers, pos));
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
            None => {
                return Err(SarError::Decode(format!("malformed part header '{}'", line)));
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}
