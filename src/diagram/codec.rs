//! Decoding of diagrams.net page payloads.
//!
//! A saved page looks like `<mxfile><diagram ...>PAYLOAD</diagram></mxfile>`
//! where `PAYLOAD` is base64 of raw deflate of the percent-encoded
//! `<mxGraphModel>` document. Editable SVG exports carry the whole `mxfile`
//! HTML-escaped in the root element's `content` attribute.

use std::io::Read;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use flate2::read::DeflateDecoder;
use regex::Regex;
use thiserror::Error;

/// Largest inflated page payload accepted.
pub const MAX_INFLATED_BYTES: usize = 50 * 1024 * 1024;

/// Errors while decoding a page payload.
#[derive(Error, Debug)]
pub enum CodecError {
    /// No `<diagram>` element was found.
    #[error("no <diagram> element found")]
    NoDiagram,

    /// The `<diagram>` element is empty.
    #[error("<diagram> element is empty")]
    EmptyPayload,

    /// The payload is not valid base64.
    #[error("payload is not valid base64")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not valid raw deflate data.
    #[error("payload is not valid deflate data")]
    Inflate(#[source] std::io::Error),

    /// The payload inflates past the size limit.
    #[error("inflated payload exceeds {limit} bytes")]
    TooLarge {
        /// Limit in bytes.
        limit: usize,
    },

    /// The inflated or percent-decoded payload is not UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn diagram_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<diagram[^>]*>(.*?)</diagram>").expect("valid regex"))
}

fn svg_content_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"content="([^"]+)""#).expect("valid regex"))
}

/// Extracts the `mxfile` document embedded in an editable SVG.
#[must_use]
pub fn extract_mxfile_from_svg(svg: &str) -> Option<String> {
    let captures = svg_content_regex().captures(svg)?;
    Some(unescape_html(&captures[1]))
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}

/// Decodes the first page of an `mxfile` document into `<mxGraphModel>` XML.
///
/// Pages stored uncompressed are returned as they are.
///
/// # Errors
///
/// Returns an error if no page is present or the payload is corrupt.
pub fn decode_diagram(mxfile: &str) -> Result<String, CodecError> {
    decode_diagram_with_limit(mxfile, MAX_INFLATED_BYTES)
}

fn decode_diagram_with_limit(mxfile: &str, limit: usize) -> Result<String, CodecError> {
    let captures = diagram_regex()
        .captures(mxfile)
        .ok_or(CodecError::NoDiagram)?;
    let payload = captures[1].trim();

    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    if payload.contains('<') {
        return Ok(payload.to_string());
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = BASE64_STANDARD.decode(compact)?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(CodecError::Inflate)?;
    if inflated.len() > limit {
        return Err(CodecError::TooLarge { limit });
    }

    let encoded = String::from_utf8(inflated)?;
    Ok(urlencoding::decode(&encoded)?.into_owned())
}

/// Best-effort decoding of whatever markup the plugin returned.
///
/// Accepts raw `<mxGraphModel>`, an `mxfile` document, or an editable SVG.
/// Returns `None` when nothing decodable is found.
#[must_use]
pub fn decode_any(markup: &str) -> Option<String> {
    let trimmed = markup.trim();
    if trimmed.starts_with("<mxGraphModel") {
        return Some(trimmed.to_string());
    }

    let mxfile = if trimmed.contains("<svg") {
        extract_mxfile_from_svg(trimmed)?
    } else if trimmed.contains("<diagram") {
        trimmed.to_string()
    } else {
        return None;
    };

    match decode_diagram(&mxfile) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::debug!(error = %e, "Could not decode diagram content");
            None
        }
    }
}
