use image::{ImageError, ImageFormat};

use crate::error::ValidationError;

/// Check that `bytes` hold a complete image in a format we can decode.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, ValidationError> {
    let format = image::guess_format(bytes)
        .map_err(|e| ValidationError::UnrecognizedFormat(e.to_string()))?;

    image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
        ImageError::Unsupported(_) => ValidationError::UnrecognizedFormat(e.to_string()),
        other => ValidationError::Corrupt(other.to_string()),
    })?;

    Ok(format)
}

#[cfg(test)]
pub(crate) fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
