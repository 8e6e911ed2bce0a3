//! Decoding of transport-encoded images into in-memory pixel grids.

use crate::analysis::AnalysisError;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use tracing::debug;

/// Decode a data-URI-style string (`<metadata>,<base64 payload>`) into a
/// color image.
///
/// The metadata prefix up to the first comma is discarded. A missing comma,
/// malformed base64, and bytes that do not parse as an image are all the
/// same failure: the caller cannot tell them apart and treats each as a
/// generic analysis failure.
pub fn decode_image(data: &str) -> Result<DynamicImage, AnalysisError> {
    let payload = match data.split_once(',') {
        Some((_prefix, payload)) => payload,
        None => {
            debug!("encoded image has no metadata separator");
            return Err(AnalysisError::DecodeFailed);
        }
    };

    let bytes = general_purpose::STANDARD.decode(payload).map_err(|e| {
        debug!("base64 decode failed: {e}");
        AnalysisError::DecodeFailed
    })?;

    image::load_from_memory(&bytes).map_err(|e| {
        debug!("image decode failed: {e}");
        AnalysisError::DecodeFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> String {
        let img = RgbImage::new(width, height);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn decodes_valid_payload_with_matching_dimensions() {
        let frame = decode_image(&encoded_png(4, 3)).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn rejects_missing_separator() {
        let err = decode_image("bm90IGFuIGltYWdl").unwrap_err();
        assert!(matches!(err, AnalysisError::DecodeFailed));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode_image("data:image/png;base64,@@not-base64@@").unwrap_err();
        assert!(matches!(err, AnalysisError::DecodeFailed));
    }

    #[test]
    fn rejects_undecodable_image_bytes() {
        let payload = general_purpose::STANDARD.encode(b"not an image at all");
        let err = decode_image(&format!("data:image/png;base64,{payload}")).unwrap_err();
        assert!(matches!(err, AnalysisError::DecodeFailed));
    }

    #[test]
    fn prefix_content_is_ignored() {
        let encoded = encoded_png(2, 2);
        let payload = encoded.split_once(',').unwrap().1;
        let frame = decode_image(&format!("whatever;junk,{payload}")).unwrap();
        assert_eq!(frame.width(), 2);
    }
}
