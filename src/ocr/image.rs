// src/ocr/image.rs
//! Image payloads as clients send them: raw bytes, a `data:` URL, or bare base64.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::ocr::OcrError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Encoded raster bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// `data:image/png;base64,....`
    DataUrl(String),
    /// Base64 without the data-URL header.
    Base64(String),
}

impl ImageInput {
    /// Classify a string field from a JSON request.
    pub fn from_text(s: &str) -> Self {
        let t = s.trim();
        if t.starts_with("data:") {
            ImageInput::DataUrl(t.to_string())
        } else {
            ImageInput::Base64(t.to_string())
        }
    }

    /// Decode to raw bytes. No size limits beyond non-empty.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OcrError> {
        let bytes = match self {
            ImageInput::Bytes(b) => b.clone(),
            ImageInput::DataUrl(s) => {
                let (header, payload) = s
                    .split_once(',')
                    .ok_or_else(|| OcrError::InvalidImage("data url without payload".into()))?;
                if !header.ends_with(";base64") {
                    return Err(OcrError::InvalidImage(
                        "only base64 data urls are supported".into(),
                    ));
                }
                decode_b64(payload)?
            }
            ImageInput::Base64(s) => decode_b64(s)?,
        };
        if bytes.is_empty() {
            return Err(OcrError::InvalidImage("empty image".into()));
        }
        Ok(bytes)
    }
}

fn decode_b64(s: &str) -> Result<Vec<u8>, OcrError> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| OcrError::InvalidImage(format!("bad base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url() {
        let img = ImageInput::from_text("data:image/png;base64,aGVsbG8=");
        assert!(matches!(img, ImageInput::DataUrl(_)));
        assert_eq!(img.to_bytes().unwrap(), b"hello");
    }

    #[test]
    fn decodes_bare_base64_with_line_breaks() {
        let img = ImageInput::from_text("aGVs\nbG8=");
        assert_eq!(img.to_bytes().unwrap(), b"hello");
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(ImageInput::from_text("data:image/png,raw").to_bytes().is_err());
        assert!(ImageInput::from_text("data:image/png;base64").to_bytes().is_err());
        assert!(ImageInput::from_text("!!!").to_bytes().is_err());
        assert!(ImageInput::Bytes(Vec::new()).to_bytes().is_err());
    }
}
