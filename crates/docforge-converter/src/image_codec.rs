//! In-process image re-encoding.
//!
//! JPEG is re-encoded at the configured quality and PNG at maximum
//! compression; every other format the `image` crate can write is
//! re-encoded with its default settings. The format is taken from the
//! file content, not the extension.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};

/// Image compression codec.
pub struct ImageCodec;

impl ImageCodec {
    /// Re-encode `input` into `output` in the same format.
    pub fn compress(input: &Path, output: &Path, quality: u8) -> Result<ImageFormat, ImageError> {
        let reader = ImageReader::open(input)?.with_guessed_format()?;
        let format = reader.format().ok_or_else(|| {
            ImageError::Unsupported(image::error::UnsupportedError::from_format_and_kind(
                image::error::ImageFormatHint::PathExtension(input.to_path_buf()),
                image::error::UnsupportedErrorKind::Format(
                    image::error::ImageFormatHint::Unknown,
                ),
            ))
        })?;
        let img = reader.decode()?;

        let mut writer = BufWriter::new(File::create(output)?);
        match format {
            ImageFormat::Jpeg => {
                let img = if img.color().has_alpha() {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                } else {
                    img
                };
                let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
                img.write_with_encoder(encoder)?;
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut writer,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)?;
            }
            other => img.write_to(&mut writer, other)?,
        }
        writer.flush()?;

        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        })
    }

    #[test]
    fn test_jpeg_reencoded_as_jpeg() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = temp.path().join("in.jpg");
        let output = temp.path().join("out.jpg");
        gradient(64, 64).save(&input).expect("save");

        let format = ImageCodec::compress(&input, &output, 30).expect("compress");
        assert_eq!(format, ImageFormat::Jpeg);

        let decoded = image::open(&output).expect("decode output");
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_png_with_alpha_stays_png() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = temp.path().join("in.png");
        let output = temp.path().join("out.png");
        RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 128]))
            .save(&input)
            .expect("save");

        let format = ImageCodec::compress(&input, &output, 80).expect("compress");
        assert_eq!(format, ImageFormat::Png);
        assert!(image::open(&output).expect("decode").color().has_alpha());
    }

    #[test]
    fn test_format_detected_from_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let png_path = temp.path().join("tmp.png");
        gradient(8, 8).save(&png_path).expect("save");
        let misnamed = temp.path().join("actually-png.jpg");
        std::fs::rename(&png_path, &misnamed).expect("rename");

        let output = temp.path().join("out.jpg");
        let format = ImageCodec::compress(&misnamed, &output, 80).expect("compress");
        assert_eq!(format, ImageFormat::Png);
    }

    #[test]
    fn test_non_image_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = temp.path().join("notes.png");
        std::fs::write(&input, b"definitely not an image").expect("write");
        let output = temp.path().join("out.png");

        assert!(ImageCodec::compress(&input, &output, 80).is_err());
    }
}
