//! Thumbnail validation for measurement documents

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Shape of an `image` field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageShape {
    /// Empty-string sentinel: no thumbnail yet
    Empty,
    /// Base64 raster image with a known header
    Raster(RasterFormat),
    /// Inline SVG document
    Svg,
    /// Anything else
    Invalid,
}

/// Raster formats recognised by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// `\x89PNG\r\n\x1a\n`
    Png,
    /// `\xff\xd8\xff`
    Jpeg,
    /// `GIF87a` / `GIF89a`
    Gif,
}

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";

/// Classify an image payload
pub fn classify(image: &str) -> ImageShape {
    let trimmed = image.trim();
    if trimmed.is_empty() {
        return ImageShape::Empty;
    }
    if is_svg(trimmed) {
        return ImageShape::Svg;
    }
    let payload = match trimmed.split_once(";base64,") {
        Some((header, data)) if header.starts_with("data:image/") => data,
        Some(_) => return ImageShape::Invalid,
        None => trimmed,
    };
    let Ok(bytes) = STANDARD.decode(payload) else {
        return ImageShape::Invalid;
    };
    match raster_format(&bytes) {
        Some(format) => ImageShape::Raster(format),
        None => ImageShape::Invalid,
    }
}

fn is_svg(text: &str) -> bool {
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn raster_format(bytes: &[u8]) -> Option<RasterFormat> {
    if bytes.starts_with(PNG_MAGIC) {
        Some(RasterFormat::Png)
    } else if bytes.starts_with(JPEG_MAGIC) {
        Some(RasterFormat::Jpeg)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(RasterFormat::Gif)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn raster_payloads() {
        let png = [PNG_MAGIC, &b"rest"[..]].concat();
        assert_eq!(classify(&encode(&png)), ImageShape::Raster(RasterFormat::Png));
        let jpeg = format!("data:image/jpg;base64,{}", encode(b"\xff\xd8\xff\xe0data"));
        assert_eq!(classify(&jpeg), ImageShape::Raster(RasterFormat::Jpeg));
        assert_eq!(classify(&encode(b"GIF89a..")), ImageShape::Raster(RasterFormat::Gif));
    }

    #[test]
    fn svg_payloads() {
        assert_eq!(classify("<svg xmlns='http://www.w3.org/2000/svg'></svg>"), ImageShape::Svg);
        assert_eq!(classify("<?xml version='1.0'?>\n<svg></svg>"), ImageShape::Svg);
        assert_eq!(classify("<?xml version='1.0'?><html/>"), ImageShape::Invalid);
    }

    #[test]
    fn empty_and_garbage() {
        assert_eq!(classify(""), ImageShape::Empty);
        assert_eq!(classify("not an image"), ImageShape::Invalid);
        assert_eq!(classify(&encode(b"plain text")), ImageShape::Invalid);
        assert_eq!(classify("data:text/plain;base64,AAAA"), ImageShape::Invalid);
    }
}
