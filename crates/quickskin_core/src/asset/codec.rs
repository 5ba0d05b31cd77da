//! Image encode/decode service.

use image::{DynamicImage, ImageFormat};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Cursor;

/// Encode/decode failure. Decode failures are downgraded to "absent" by the
/// cache; encode failures reject the write.
#[derive(Debug)]
pub enum AssetCodecError {
    Decode(image::ImageError),
    Encode(image::ImageError),
    /// Zero-length blob.
    Empty,
}

impl Display for AssetCodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "cannot decode image asset: {err}"),
            Self::Encode(err) => write!(f, "cannot encode image asset: {err}"),
            Self::Empty => write!(f, "image asset is empty"),
        }
    }
}

impl Error for AssetCodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Empty => None,
        }
    }
}

/// Converts between stored bytes and displayable images.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, AssetCodecError>;
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, AssetCodecError>;
}

/// Stores PNG; decodes any format compiled into `image`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, AssetCodecError> {
        if bytes.is_empty() {
            return Err(AssetCodecError::Empty);
        }
        image::load_from_memory(bytes).map_err(AssetCodecError::Decode)
    }

    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, AssetCodecError> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(AssetCodecError::Encode)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetCodecError, ImageCodec, PngCodec};
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn png_codec_preserves_pixels() {
        let mut pixels = RgbaImage::new(3, 2);
        pixels.put_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let image = DynamicImage::ImageRgba8(pixels);

        let bytes = PngCodec.encode(&image).unwrap();
        let decoded = PngCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.to_rgba8(), image.to_rgba8());
    }

    #[test]
    fn garbage_and_empty_input_fail_to_decode() {
        assert!(matches!(
            PngCodec.decode(b"not an image"),
            Err(AssetCodecError::Decode(_))
        ));
        assert!(matches!(PngCodec.decode(&[]), Err(AssetCodecError::Empty)));
    }
}
